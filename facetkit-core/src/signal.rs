//! Publish/subscribe channels
//!
//! Every observable part of a facet (state changes, facet events, the
//! aggregated action state, individual action flags) exposes a [`Signal`]
//! with a typed payload. Subscribers are invoked synchronously, in
//! subscription order, on the thread that emits.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

impl SubscriptionId {
    fn next() -> Self {
        SubscriptionId(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::SeqCst))
    }
}

type Callback<T> = Box<dyn FnMut(&T) + Send>;

/// A typed notification channel
pub struct Signal<T> {
    subscribers: Vec<(SubscriptionId, Callback<T>)>,
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    /// Subscribe a callback; it stays attached until unsubscribed
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&T) + Send + 'static,
    {
        let id = SubscriptionId::next();
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove a subscription; returns false if it was not attached
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    /// Deliver a payload to every subscriber in subscription order
    pub fn emit(&mut self, payload: &T) {
        for (_, callback) in self.subscribers.iter_mut() {
            callback(payload);
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn clear(&mut self) {
        self.subscribers.clear();
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
