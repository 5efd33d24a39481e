//! State evaluators
//!
//! An evaluator watches one named facet event and maps it to a token list.
//! It reports a change only when the new list differs (order-sensitively)
//! from its previous list, except on its very first evaluation, which is
//! always reported.

use facetkit_types::Token;
use serde_json::Value;
use std::collections::BTreeMap;

pub const DIRTY_CHANGED: &str = "dirty_changed";
pub const SELECT_CHANGED: &str = "select_changed";
pub const POST_LOAD: &str = "post_load";

pub const DIRTY: &str = "dirty";
pub const ITEM_SELECTED: &str = "item-selected";
pub const SELF_SERVICE: &str = "self-service";
pub const READ_ONLY: &str = "read-only";
pub const DIRECT: &str = "direct";

/// Configuration attributes of a facet, consulted by attribute evaluators
pub type Attributes = BTreeMap<String, Value>;

/// An event raised by a facet
#[derive(Debug, Clone, PartialEq)]
pub enum FacetEvent {
    /// Unsaved local edits appeared or disappeared
    DirtyChanged(bool),
    /// The view's multi-select changed; carries the selected keys
    SelectChanged(Vec<String>),
    /// A load completed
    PostLoad,
    /// Any other named event with an arbitrary payload
    Custom { name: String, payload: Value },
}

impl FacetEvent {
    pub fn name(&self) -> &str {
        match self {
            FacetEvent::DirtyChanged(_) => DIRTY_CHANGED,
            FacetEvent::SelectChanged(_) => SELECT_CHANGED,
            FacetEvent::PostLoad => POST_LOAD,
            FacetEvent::Custom { name, .. } => name,
        }
    }

    /// Truthiness of the payload, for evaluators bound to custom events
    fn flag(&self) -> bool {
        match self {
            FacetEvent::DirtyChanged(dirty) => *dirty,
            FacetEvent::SelectChanged(selected) => !selected.is_empty(),
            FacetEvent::PostLoad => false,
            FacetEvent::Custom { payload, .. } => match payload {
                Value::Null => false,
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
                Value::String(s) => !s.is_empty(),
                Value::Array(_) | Value::Object(_) => true,
            },
        }
    }

    fn has_selection(&self) -> bool {
        match self {
            FacetEvent::SelectChanged(selected) => !selected.is_empty(),
            FacetEvent::Custom {
                payload: Value::Array(items),
                ..
            } => !items.is_empty(),
            _ => false,
        }
    }
}

/// What an evaluator may read while evaluating
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub attributes: &'a Attributes,
}

/// Shared bookkeeping for every evaluator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatorBase {
    pub name: String,
    pub event: String,
    tokens: Vec<Token>,
    first_pass: bool,
}

impl EvaluatorBase {
    pub fn new(name: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            event: event.into(),
            tokens: Vec::new(),
            first_pass: true,
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn first_pass(&self) -> bool {
        self.first_pass
    }

    /// Store the new tokens; returns them if they count as a change
    pub fn notify_on_change(&mut self, tokens: Vec<Token>) -> Option<Vec<Token>> {
        let changed = self.first_pass || tokens != self.tokens;
        self.tokens = tokens;
        if !changed {
            return None;
        }
        self.first_pass = false;
        tracing::debug!(evaluator = %self.name, tokens = ?self.tokens, "evaluator state changed");
        Some(self.tokens.clone())
    }
}

/// A named token producer bound to one facet event
pub trait StateEvaluator: Send {
    fn base(&self) -> &EvaluatorBase;

    fn base_mut(&mut self) -> &mut EvaluatorBase;

    /// Compute the token list for an event
    fn evaluate(&self, event: &FacetEvent, ctx: &EvalContext<'_>) -> Vec<Token>;

    fn name(&self) -> &str {
        &self.base().name
    }

    fn event(&self) -> &str {
        &self.base().event
    }

    fn tokens(&self) -> &[Token] {
        self.base().tokens()
    }

    /// Recompute on an event; `Some` carries the new tokens when they changed
    fn on_event(&mut self, event: &FacetEvent, ctx: &EvalContext<'_>) -> Option<Vec<Token>> {
        let tokens = self.evaluate(event, ctx);
        self.base_mut().notify_on_change(tokens)
    }
}

/// Emits `dirty` while the facet has unsaved changes
#[derive(Debug, Clone)]
pub struct DirtyEvaluator {
    base: EvaluatorBase,
}

impl DirtyEvaluator {
    pub fn new(name: Option<String>, event: Option<String>) -> Self {
        Self {
            base: EvaluatorBase::new(
                name.unwrap_or_else(|| "dirty_state_evaluator".into()),
                event.unwrap_or_else(|| DIRTY_CHANGED.into()),
            ),
        }
    }
}

impl Default for DirtyEvaluator {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl StateEvaluator for DirtyEvaluator {
    fn base(&self) -> &EvaluatorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EvaluatorBase {
        &mut self.base
    }

    fn evaluate(&self, event: &FacetEvent, _ctx: &EvalContext<'_>) -> Vec<Token> {
        if event.flag() {
            vec![Token::from(DIRTY)]
        } else {
            Vec::new()
        }
    }
}

/// Emits `item-selected` while the view's selection is non-empty
#[derive(Debug, Clone)]
pub struct SelectedEvaluator {
    base: EvaluatorBase,
}

impl SelectedEvaluator {
    pub fn new(name: Option<String>, event: Option<String>) -> Self {
        Self {
            base: EvaluatorBase::new(
                name.unwrap_or_else(|| "selected_state_evaluator".into()),
                event.unwrap_or_else(|| SELECT_CHANGED.into()),
            ),
        }
    }
}

impl Default for SelectedEvaluator {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl StateEvaluator for SelectedEvaluator {
    fn base(&self) -> &EvaluatorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EvaluatorBase {
        &mut self.base
    }

    fn evaluate(&self, event: &FacetEvent, _ctx: &EvalContext<'_>) -> Vec<Token> {
        if event.has_selection() {
            vec![Token::from(ITEM_SELECTED)]
        } else {
            Vec::new()
        }
    }
}

/// Emits `self-service` when the session runs in self-service mode
#[derive(Debug, Clone)]
pub struct SelfServiceEvaluator {
    base: EvaluatorBase,
    self_service: bool,
}

impl SelfServiceEvaluator {
    pub fn new(name: Option<String>, event: Option<String>, self_service: bool) -> Self {
        Self {
            base: EvaluatorBase::new(
                name.unwrap_or_else(|| "self_service_state_evaluator".into()),
                event.unwrap_or_else(|| POST_LOAD.into()),
            ),
            self_service,
        }
    }
}

impl StateEvaluator for SelfServiceEvaluator {
    fn base(&self) -> &EvaluatorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EvaluatorBase {
        &mut self.base
    }

    fn evaluate(&self, _event: &FacetEvent, _ctx: &EvalContext<'_>) -> Vec<Token> {
        if self.self_service {
            vec![Token::from(SELF_SERVICE)]
        } else {
            Vec::new()
        }
    }
}

/// Emits `state_value` when a facet attribute equals `value`
#[derive(Debug, Clone)]
pub struct FacetAttrEvaluator {
    base: EvaluatorBase,
    attribute: String,
    value: Value,
    state_value: Token,
}

impl FacetAttrEvaluator {
    pub fn new(
        name: Option<String>,
        event: Option<String>,
        attribute: impl Into<String>,
        value: Value,
        state_value: impl Into<Token>,
    ) -> Self {
        Self {
            base: EvaluatorBase::new(
                name.unwrap_or_else(|| "facet_attr_se".into()),
                event.unwrap_or_else(|| POST_LOAD.into()),
            ),
            attribute: attribute.into(),
            value,
            state_value: state_value.into(),
        }
    }

    /// `read-only` when the `read_only` attribute is `true`
    pub fn read_only(name: Option<String>, event: Option<String>) -> Self {
        Self::new(
            Some(name.unwrap_or_else(|| "read_only_se".into())),
            event,
            "read_only",
            Value::Bool(true),
            READ_ONLY,
        )
    }

    /// `direct` when the `association_type` attribute is `"direct"`
    pub fn association_type(name: Option<String>, event: Option<String>) -> Self {
        Self::new(
            Some(name.unwrap_or_else(|| "association_type_se".into())),
            event,
            "association_type",
            Value::String(DIRECT.into()),
            DIRECT,
        )
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }
}

impl StateEvaluator for FacetAttrEvaluator {
    fn base(&self) -> &EvaluatorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EvaluatorBase {
        &mut self.base
    }

    fn evaluate(&self, _event: &FacetEvent, ctx: &EvalContext<'_>) -> Vec<Token> {
        if ctx.attributes.get(&self.attribute) == Some(&self.value) {
            vec![self.state_value.clone()]
        } else {
            Vec::new()
        }
    }
}
