//! # facetkit-core
//!
//! Facet lifecycle and action-state reconciliation for entity management
//! consoles.
//!
//! # Architecture
//!
//! A console shows **entities** (users, groups, zones, ...) through
//! **facets**: one navigable view of one entity each. Every facet owns an
//! observable state (primary keys, paging, filters) and walks the same
//! lifecycle:
//!
//! ```text
//! create → show → (state changed?) → clear → refresh → load → post_load
//! ```
//!
//! Whether a shown facet re-fetches is decided by the staleness policy:
//! a state diff, an elapsed expiry timeout, a pending expired flag or a
//! displayed error.
//!
//! ## Action state
//!
//! Facet events (`dirty_changed`, `select_changed`, `post_load`, ...) feed
//! state evaluators. Their token lists are merged and pushed into every
//! action, which recomputes its enabled/visible flags from its conditions.
//! The same tokens drive the header's summary status.
//!
//! ## Data access
//!
//! Facets never perform I/O. Refreshes queue commands in an outbox; the
//! caller drains them, executes them and completes each fetch exactly once.
//!
//! # Example
//!
//! ```rust,ignore
//! use facetkit_core::{ConsoleBuilder, ConsoleConfig};
//!
//! let config = ConsoleConfig::from_file("console.yaml")?;
//! let builder = ConsoleBuilder::new(config)?;
//! let mut facet = builder.build("user/search", Some("main"))?;
//!
//! let facet = facet.lifecycle_mut();
//! facet.create()?;
//! facet.show()?;
//! for request in facet.core_mut().take_requests() {
//!     // execute request.command, then facet.complete_fetch(request.id, result)
//! }
//! ```

pub mod action;
pub mod action_state;
pub mod builder;
pub mod clock;
pub mod condition;
pub mod config;
pub mod dialog;
pub mod diff;
pub mod entity;
pub mod error;
pub mod evaluator;
pub mod facet;
pub mod fetch;
pub mod header;
pub mod signal;
pub mod staleness;
pub mod state;
pub mod table;

// Re-export main types
pub use action::{Action, ActionHandler, ActionHolder, ActionOutcome};
pub use action_state::{ActionState, Summary, SummaryCondition};
pub use builder::{BuiltFacet, ConsoleBuilder, SessionContext};
pub use clock::{Clock, ManualClock, SystemClock};
pub use condition::eval_cond;
pub use config::{ConfigError, ConsoleConfig};
pub use dialog::{AutoConfirm, Confirm, Dialog, DialogResult};
pub use diff::state_diff;
pub use entity::{Entity, FacetGroup};
pub use error::{ActionError, FacetError, FacetResult};
pub use evaluator::{FacetEvent, StateEvaluator};
pub use facet::{
    Facet, FacetContent, FacetCore, FacetLifecycle, FacetOptions, NavigationRequest, PlainContent,
    PlainFacet, RecoveryOption,
};
pub use fetch::{Command, FetchError, FetchId, FetchResult, Request, Response};
pub use header::FacetHeader;
pub use signal::{Signal, SubscriptionId};
pub use staleness::{StaleReason, Staleness};
pub use state::{FacetState, StateChange};
pub use table::{Column, TableContent, TableFacet, TableOptions, TableSummary};
pub use facetkit_types::{FacetRef, StateSnapshot, StateValue, Token};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::{Action, ActionOutcome};
    pub use crate::builder::{BuiltFacet, ConsoleBuilder};
    pub use crate::config::ConsoleConfig;
    pub use crate::dialog::{AutoConfirm, Confirm};
    pub use crate::entity::{Entity, FacetGroup};
    pub use crate::evaluator::FacetEvent;
    pub use crate::facet::{
        Facet, FacetCore, FacetLifecycle, FacetOptions, NavigationRequest, PlainContent, PlainFacet,
    };
    pub use crate::fetch::{BatchResponse, Command, FetchError, FetchId, Response};
    pub use crate::table::{TableContent, TableFacet, TableOptions};
    pub use facetkit_types::{StateSnapshot, StateValue, Token};
}
