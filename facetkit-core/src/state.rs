//! Observable facet state
//!
//! [`FacetState`] is the key/value store describing "where we are": route
//! arguments, primary keys, pagination and filters. It is only mutated
//! through merge-set and full reset, and every logical update raises exactly
//! one change notification carrying the old and new snapshots.

use crate::signal::{Signal, SubscriptionId};
use facetkit_types::{StateSnapshot, StateValue};

/// Old and new snapshots for one logical state update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub old: StateSnapshot,
    pub new: StateSnapshot,
}

/// Mutable, observable facet state
///
/// Nested updates (a `set` inside a `batch`, or the clear-then-set steps of
/// `reset`) are folded into the outermost update: only the outermost call
/// emits and returns a [`StateChange`].
#[derive(Debug, Default)]
pub struct FacetState {
    values: StateSnapshot,
    /// Depth of in-progress updates
    updating: u32,
    /// Snapshot taken when the outermost update began
    pending_old: Option<StateSnapshot>,
    changed: Signal<StateChange>,
}

impl FacetState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.values.get(key)
    }

    /// Borrow the current values
    pub fn values(&self) -> &StateSnapshot {
        &self.values
    }

    /// Plain snapshot of the current values
    pub fn clone_state(&self) -> StateSnapshot {
        self.values.clone()
    }

    /// Whether an update is currently in progress
    pub fn is_updating(&self) -> bool {
        self.updating > 0
    }

    /// Merge `partial` into the state; unspecified keys are untouched
    pub fn set(&mut self, partial: StateSnapshot) -> Option<StateChange> {
        self.begin();
        for (key, value) in partial {
            self.values.insert(key, value);
        }
        self.finish()
    }

    /// Set a key back to undefined
    pub fn unset(&mut self, key: &str) -> Option<StateChange> {
        self.begin();
        self.values.remove(key);
        self.finish()
    }

    /// Unset every key
    pub fn clear(&mut self) -> Option<StateChange> {
        self.begin();
        self.values = StateSnapshot::new();
        self.finish()
    }

    /// Replace the whole state: clear every key, then apply `full`
    pub fn reset(&mut self, full: StateSnapshot) -> Option<StateChange> {
        self.begin();
        self.clear();
        self.set(full);
        self.finish()
    }

    /// Run several updates as one logical update with a single notification
    pub fn batch<F>(&mut self, f: F) -> Option<StateChange>
    where
        F: FnOnce(&mut FacetState),
    {
        self.begin();
        f(self);
        self.finish()
    }

    /// Subscribe to change notifications
    pub fn on_change<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&StateChange) + Send + 'static,
    {
        self.changed.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.changed.unsubscribe(id)
    }

    fn begin(&mut self) {
        if self.updating == 0 {
            self.pending_old = Some(self.values.clone());
        }
        self.updating += 1;
    }

    fn finish(&mut self) -> Option<StateChange> {
        self.updating -= 1;
        if self.updating > 0 {
            return None;
        }

        let change = StateChange {
            old: self.pending_old.take().unwrap_or_default(),
            new: self.values.clone(),
        };
        tracing::trace!(old = ?change.old, new = ?change.new, "facet state changed");
        self.changed.emit(&change);
        Some(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recorder(state: &mut FacetState) -> Arc<Mutex<Vec<StateChange>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        state.on_change(move |change| sink.lock().push(change.clone()));
        seen
    }

    #[test]
    fn test_set_merges_and_notifies_once() {
        let mut state = FacetState::new();
        let seen = recorder(&mut state);

        state.set(StateSnapshot::new().with("page", 1).with("filter", "adm"));
        let change = state
            .set(StateSnapshot::new().with("page", 2))
            .expect("outermost set returns the change");

        assert_eq!(change.old.get("page"), Some(&StateValue::Int(1)));
        assert_eq!(change.new.get("page"), Some(&StateValue::Int(2)));
        assert_eq!(change.new.get("filter"), Some(&StateValue::from("adm")));
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn test_reset_replaces_everything_with_one_notification() {
        let mut state = FacetState::new();
        state.set(StateSnapshot::new().with("page", 4).with("filter", "x"));
        let seen = recorder(&mut state);

        let full = StateSnapshot::new().with("pkeys", vec!["admins"]);
        let change = state.reset(full.clone()).unwrap();

        assert_eq!(state.clone_state(), full);
        assert_eq!(change.old, StateSnapshot::new().with("page", 4).with("filter", "x"));
        assert_eq!(change.new, full);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], change);
    }

    #[test]
    fn test_nested_updates_coalesce() {
        let mut state = FacetState::new();
        let seen = recorder(&mut state);

        let change = state.batch(|s| {
            assert!(s.set(StateSnapshot::new().with("a", "1")).is_none());
            assert!(s.reset(StateSnapshot::new().with("b", "2")).is_none());
            assert!(s.set(StateSnapshot::new().with("c", 3)).is_none());
            assert!(s.is_updating());
        });

        let change = change.unwrap();
        assert!(change.old.is_empty());
        assert_eq!(change.new, StateSnapshot::new().with("b", "2").with("c", 3));
        assert_eq!(seen.lock().len(), 1);
        assert!(!state.is_updating());
    }

    #[test]
    fn test_unset_and_clear() {
        let mut state = FacetState::new();
        state.set(StateSnapshot::new().with("a", "1").with("b", "2"));

        state.unset("a");
        assert!(state.get("a").is_none());
        assert_eq!(state.clone_state().len(), 1);

        let change = state.clear().unwrap();
        assert!(change.new.is_empty());
        assert_eq!(change.old.len(), 1);
    }

    #[test]
    fn test_clone_is_detached() {
        let mut state = FacetState::new();
        state.set(StateSnapshot::new().with("pkeys", vec!["a", "b"]));

        let snapshot = state.clone_state();
        state.set(StateSnapshot::new().with("pkeys", vec!["c"]));

        assert_eq!(snapshot.get("pkeys"), Some(&StateValue::from(vec!["a", "b"])));
    }
}
