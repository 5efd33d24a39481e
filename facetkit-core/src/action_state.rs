//! Action-state aggregation
//!
//! [`ActionState`] owns the facet's evaluators, keeps each evaluator's latest
//! token list under its name (in registration order) and republishes the
//! merged list whenever one of them changes. The merged list is a plain
//! concatenation: duplicates across evaluators are kept.

use crate::condition::eval_cond;
use crate::evaluator::{EvalContext, FacetEvent, StateEvaluator};
use crate::signal::{Signal, SubscriptionId};
use facetkit_types::Token;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// One summary rule; the first satisfied rule decides the summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCondition {
    #[serde(default)]
    pub pos: Vec<Token>,
    #[serde(default)]
    pub neg: Vec<Token>,
    #[serde(deserialize_with = "one_or_many")]
    pub state: Vec<Token>,
    #[serde(default)]
    pub description: String,
}

impl SummaryCondition {
    pub fn new(pos: Vec<Token>, neg: Vec<Token>, state: Vec<Token>, description: impl Into<String>) -> Self {
        Self {
            pos,
            neg,
            state,
            description: description.into(),
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<Token>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Token),
        Many(Vec<Token>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(token) => vec![token],
        OneOrMany::Many(tokens) => tokens,
    })
}

/// Header status derived from the merged tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Status classes
    pub state: Vec<Token>,
    pub description: String,
}

/// The facet's evaluator collection and merged token state
pub struct ActionState {
    evaluators: Vec<Box<dyn StateEvaluator>>,
    state: IndexMap<String, Vec<Token>>,
    summary_conditions: Vec<SummaryCondition>,
    changed: Signal<Vec<Token>>,
}

impl ActionState {
    pub fn new(summary_conditions: Vec<SummaryCondition>) -> Self {
        Self {
            evaluators: Vec::new(),
            state: IndexMap::new(),
            summary_conditions,
            changed: Signal::new(),
        }
    }

    /// Register an evaluator; it is bound to its event for its whole life
    pub fn add_evaluator(&mut self, evaluator: Box<dyn StateEvaluator>) {
        self.state.entry(evaluator.name().to_string()).or_default();
        self.evaluators.push(evaluator);
    }

    pub fn with_evaluator(mut self, evaluator: Box<dyn StateEvaluator>) -> Self {
        self.add_evaluator(evaluator);
        self
    }

    pub fn evaluators(&self) -> impl Iterator<Item = &dyn StateEvaluator> {
        self.evaluators.iter().map(|e| e.as_ref())
    }

    pub fn summary_conditions(&self) -> &[SummaryCondition] {
        &self.summary_conditions
    }

    /// Feed an event to every evaluator bound to it
    ///
    /// Returns the merged token list published after each evaluator change,
    /// in order; empty when nothing changed.
    pub fn dispatch(&mut self, event: &FacetEvent, ctx: &EvalContext<'_>) -> Vec<Vec<Token>> {
        let mut published = Vec::new();

        for evaluator in self.evaluators.iter_mut() {
            if evaluator.event() != event.name() {
                continue;
            }
            if let Some(tokens) = evaluator.on_event(event, ctx) {
                self.state.insert(evaluator.name().to_string(), tokens);
                let merged = merge(&self.state);
                self.changed.emit(&merged);
                published.push(merged);
            }
        }

        published
    }

    /// Current merged token list
    pub fn get(&self) -> Vec<Token> {
        merge(&self.state)
    }

    /// Tokens last reported by one evaluator
    pub fn tokens_of(&self, evaluator: &str) -> Option<&[Token]> {
        self.state.get(evaluator).map(Vec::as_slice)
    }

    /// Summary status: first matching rule, else the raw merged tokens
    pub fn summary(&self) -> Summary {
        let tokens = self.get();

        self.summary_conditions
            .iter()
            .find(|cond| eval_cond(&cond.pos, &cond.neg, &tokens))
            .map(|cond| Summary {
                state: cond.state.clone(),
                description: cond.description.clone(),
            })
            .unwrap_or(Summary {
                state: tokens,
                description: String::new(),
            })
    }

    /// Republish the current merged tokens to listeners
    pub fn notify(&mut self) -> Vec<Token> {
        let merged = self.get();
        self.changed.emit(&merged);
        merged
    }

    pub fn on_change<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Vec<Token>) + Send + 'static,
    {
        self.changed.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.changed.unsubscribe(id)
    }
}

impl Default for ActionState {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl fmt::Debug for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionState")
            .field("state", &self.state)
            .field("summary_conditions", &self.summary_conditions)
            .finish()
    }
}

fn merge(state: &IndexMap<String, Vec<Token>>) -> Vec<Token> {
    state.values().flatten().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{Attributes, DirtyEvaluator, SelectedEvaluator, SelfServiceEvaluator};
    use facetkit_types::tokens;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn ctx(attributes: &Attributes) -> EvalContext<'_> {
        EvalContext { attributes }
    }

    fn aggregator(conditions: Vec<SummaryCondition>) -> ActionState {
        ActionState::new(conditions)
            .with_evaluator(Box::new(SelectedEvaluator::default()))
            .with_evaluator(Box::new(DirtyEvaluator::default()))
    }

    #[test]
    fn test_merge_follows_registration_order() {
        let attrs = Attributes::new();
        let mut state = aggregator(vec![]);

        state.dispatch(&FacetEvent::DirtyChanged(true), &ctx(&attrs));
        state.dispatch(&FacetEvent::SelectChanged(vec!["a".into()]), &ctx(&attrs));

        assert_eq!(state.get(), tokens(["item-selected", "dirty"]));
        assert_eq!(state.tokens_of("dirty_state_evaluator"), Some(tokens(["dirty"]).as_slice()));
    }

    #[test]
    fn test_duplicates_are_preserved() {
        let attrs = Attributes::new();
        let mut state = ActionState::default()
            .with_evaluator(Box::new(SelfServiceEvaluator::new(Some("a".into()), None, true)))
            .with_evaluator(Box::new(SelfServiceEvaluator::new(Some("b".into()), None, true)));

        let published = state.dispatch(&FacetEvent::PostLoad, &ctx(&attrs));

        assert_eq!(published.len(), 2);
        assert_eq!(state.get(), tokens(["self-service", "self-service"]));
    }

    #[test]
    fn test_only_changes_are_published() {
        let attrs = Attributes::new();
        let mut state = aggregator(vec![]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        state.on_change(move |tokens| sink.lock().push(tokens.clone()));

        state.dispatch(&FacetEvent::DirtyChanged(false), &ctx(&attrs));
        state.dispatch(&FacetEvent::DirtyChanged(false), &ctx(&attrs));
        state.dispatch(&FacetEvent::DirtyChanged(true), &ctx(&attrs));
        state.dispatch(&FacetEvent::PostLoad, &ctx(&attrs));

        assert_eq!(*seen.lock(), vec![vec![], tokens(["dirty"])]);
    }

    #[test]
    fn test_summary_first_match_wins() {
        let attrs = Attributes::new();
        let mut state = aggregator(vec![
            SummaryCondition::new(tokens(["dirty"]), vec![], tokens(["warning"]), "Unsaved changes"),
            SummaryCondition::new(vec![], vec![], tokens(["ok"]), ""),
        ]);

        assert_eq!(state.summary().state, tokens(["ok"]));

        state.dispatch(&FacetEvent::DirtyChanged(true), &ctx(&attrs));
        let summary = state.summary();
        assert_eq!(summary.state, tokens(["warning"]));
        assert_eq!(summary.description, "Unsaved changes");
    }

    #[test]
    fn test_summary_falls_back_to_tokens() {
        let attrs = Attributes::new();
        let mut state = aggregator(vec![SummaryCondition::new(
            tokens(["disabled"]),
            vec![],
            tokens(["disabled"]),
            "",
        )]);
        state.dispatch(&FacetEvent::DirtyChanged(true), &ctx(&attrs));

        assert_eq!(
            state.summary(),
            Summary {
                state: tokens(["dirty"]),
                description: String::new(),
            }
        );
    }

    #[test]
    fn test_summary_condition_accepts_single_state() {
        let cond: SummaryCondition = serde_yaml::from_str("pos: [dirty]\nstate: warning\n").unwrap();
        assert_eq!(cond.state, tokens(["warning"]));
        assert!(cond.neg.is_empty());

        let cond: SummaryCondition = serde_yaml::from_str("state: [ok, enabled]\n").unwrap();
        assert_eq!(cond.state, tokens(["ok", "enabled"]));
    }
}
