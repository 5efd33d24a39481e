//! Staleness policy
//!
//! Decides whether a facet's displayed content must be discarded and
//! re-fetched. Expiry is evaluated lazily against a supplied instant; no
//! background timer is involved.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Default expiry in seconds
pub const DEFAULT_EXPIRE_TIMEOUT: i64 = 600;

/// Why a facet is considered stale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// Fixed by configuration, bypassing every other check
    Forced,
    /// Time-based expiry is enabled and no refresh has happened yet
    NeverRefreshed,
    /// More than `expire_timeout` seconds since the last refresh
    TimedOut,
    /// The expired flag was set since the last refresh
    Flagged,
    /// The facet is showing an error instead of content
    ErrorDisplayed,
    /// The candidate state differs from the last applied state
    StateChanged,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::Forced => write!(f, "forced"),
            StaleReason::NeverRefreshed => write!(f, "never-refreshed"),
            StaleReason::TimedOut => write!(f, "timed-out"),
            StaleReason::Flagged => write!(f, "flagged"),
            StaleReason::ErrorDisplayed => write!(f, "error-displayed"),
            StaleReason::StateChanged => write!(f, "state-changed"),
        }
    }
}

/// Staleness bookkeeping for one facet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staleness {
    forced: Option<bool>,
    expire_timeout: i64,
    expired: bool,
    last_refreshed: Option<DateTime<Utc>>,
}

impl Staleness {
    /// `expire_timeout` is in seconds; zero or less disables time-based expiry
    pub fn new(expire_timeout: i64, forced: Option<bool>) -> Self {
        Self {
            forced,
            expire_timeout,
            expired: true,
            last_refreshed: None,
        }
    }

    pub fn expire_timeout(&self) -> i64 {
        self.expire_timeout
    }

    pub fn forced(&self) -> Option<bool> {
        self.forced
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed
    }

    pub fn set_expired_flag(&mut self) {
        self.expired = true;
    }

    /// Clear the expired flag and stamp the refresh time
    pub fn clear_expired_flag(&mut self, now: DateTime<Utc>) {
        self.expired = false;
        self.last_refreshed = Some(now);
    }

    /// First applicable reason the facet is stale, if any
    ///
    /// `state_differs` is only consulted when nothing cheaper already
    /// decided the outcome.
    pub fn check<F>(&self, now: DateTime<Utc>, error_displayed: bool, state_differs: F) -> Option<StaleReason>
    where
        F: FnOnce() -> bool,
    {
        if let Some(forced) = self.forced {
            return forced.then_some(StaleReason::Forced);
        }

        if self.expire_timeout > 0 {
            match self.last_refreshed {
                None => return Some(StaleReason::NeverRefreshed),
                Some(last) if self.timed_out(now, last) => return Some(StaleReason::TimedOut),
                Some(_) => {}
            }
        }

        if self.expired {
            return Some(StaleReason::Flagged);
        }
        if error_displayed {
            return Some(StaleReason::ErrorDisplayed);
        }
        if state_differs() {
            return Some(StaleReason::StateChanged);
        }
        None
    }

    /// A timeout beyond the representable range never elapses
    fn timed_out(&self, now: DateTime<Utc>, last: DateTime<Utc>) -> bool {
        match Duration::try_seconds(self.expire_timeout) {
            Some(limit) => now - last > limit,
            None => false,
        }
    }

    pub fn needs_update<F>(&self, now: DateTime<Utc>, error_displayed: bool, state_differs: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        self.check(now, error_displayed, state_differs).is_some()
    }
}

impl Default for Staleness {
    fn default() -> Self {
        Self::new(DEFAULT_EXPIRE_TIMEOUT, None)
    }
}
