//! Actions and the per-facet action holder
//!
//! An [`Action`] is a named, user-invocable operation with independent
//! enabled/visible flags. The [`ActionHolder`] recomputes every action's
//! flags from the merged action-state tokens; a flag notification fires only
//! when the flag actually flips.

use crate::condition::eval_cond;
use crate::error::ActionError;
use crate::facet::FacetLifecycle;
use crate::signal::{Signal, SubscriptionId};
use facetkit_types::Token;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Default confirmation prompt
pub const DEFAULT_CONFIRM_MSG: &str = "Are you sure you want to proceed with the action?";

/// Code run when an action executes; receives the owning facet
pub type ActionHandler = Arc<dyn Fn(&mut dyn FacetLifecycle) -> Result<(), ActionError> + Send + Sync>;

/// Result of an execution attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action is disabled or hidden
    Refused,
    /// The user declined the confirmation step
    Cancelled,
    /// The handler ran and succeeded (or there was no handler)
    Completed,
    /// The handler ran and reported an error
    Failed(ActionError),
}

/// A named operation with token-driven enabled/visible flags
pub struct Action {
    pub name: String,
    pub label: Option<String>,
    enabled: bool,
    visible: bool,
    pub enable_cond: Vec<Token>,
    pub disable_cond: Vec<Token>,
    pub show_cond: Vec<Token>,
    pub hide_cond: Vec<Token>,
    pub needs_confirm: bool,
    pub confirm_msg: String,
    /// Registered facet dialog used for confirmation, if any
    pub confirm_dialog: Option<String>,
    handler: Option<ActionHandler>,
    enabled_changed: Signal<bool>,
    visible_changed: Signal<bool>,
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            enabled: true,
            visible: true,
            enable_cond: Vec::new(),
            disable_cond: Vec::new(),
            show_cond: Vec::new(),
            hide_cond: Vec::new(),
            needs_confirm: false,
            confirm_msg: DEFAULT_CONFIRM_MSG.to_string(),
            confirm_dialog: None,
            handler: None,
            enabled_changed: Signal::new(),
            visible_changed: Signal::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_enable_cond(mut self, enable: Vec<Token>, disable: Vec<Token>) -> Self {
        self.enable_cond = enable;
        self.disable_cond = disable;
        self
    }

    pub fn with_show_cond(mut self, show: Vec<Token>, hide: Vec<Token>) -> Self {
        self.show_cond = show;
        self.hide_cond = hide;
        self
    }

    pub fn with_initial_flags(mut self, enabled: bool, visible: bool) -> Self {
        self.enabled = enabled;
        self.visible = visible;
        self
    }

    pub fn with_confirm(mut self, message: Option<String>, dialog: Option<String>) -> Self {
        self.needs_confirm = true;
        if let Some(message) = message {
            self.confirm_msg = message;
        }
        self.confirm_dialog = dialog;
        self
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut dyn FacetLifecycle) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn set_handler(&mut self, handler: ActionHandler) {
        self.handler = Some(handler);
    }

    pub fn handler(&self) -> Option<&ActionHandler> {
        self.handler.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether execution is currently allowed
    pub fn is_executable(&self) -> bool {
        self.enabled && self.visible
    }

    pub fn confirm_message(&self) -> &str {
        &self.confirm_msg
    }

    /// Update the enabled flag; notifies only on an actual change
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        if self.enabled == enabled {
            return false;
        }
        self.enabled = enabled;
        self.enabled_changed.emit(&enabled);
        true
    }

    /// Update the visible flag; notifies only on an actual change
    pub fn set_visible(&mut self, visible: bool) -> bool {
        if self.visible == visible {
            return false;
        }
        self.visible = visible;
        self.visible_changed.emit(&visible);
        true
    }

    /// Recompute both flags from the merged tokens
    pub fn apply_tokens(&mut self, tokens: &[Token]) {
        let enabled = eval_cond(&self.enable_cond, &self.disable_cond, tokens);
        let visible = eval_cond(&self.show_cond, &self.hide_cond, tokens);
        self.set_enabled(enabled);
        self.set_visible(visible);
    }

    pub fn on_enabled_changed<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&bool) + Send + 'static,
    {
        self.enabled_changed.subscribe(callback)
    }

    pub fn on_visible_changed<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&bool) + Send + 'static,
    {
        self.visible_changed.subscribe(callback)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("visible", &self.visible)
            .field("enable_cond", &self.enable_cond)
            .field("disable_cond", &self.disable_cond)
            .field("show_cond", &self.show_cond)
            .field("hide_cond", &self.hide_cond)
            .field("needs_confirm", &self.needs_confirm)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

/// Named actions of one facet, in declaration order
#[derive(Debug, Default)]
pub struct ActionHolder {
    actions: IndexMap<String, Action>,
}

impl ActionHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action; an existing action with the same name is replaced in place
    pub fn add(&mut self, action: Action) {
        self.actions.insert(action.name.clone(), action);
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Action> {
        self.actions.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Recompute every action's flags against the merged tokens
    pub fn state_changed(&mut self, tokens: &[Token]) {
        for action in self.actions.values_mut() {
            action.apply_tokens(tokens);
        }
    }
}
