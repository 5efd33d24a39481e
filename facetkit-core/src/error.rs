//! Error types for facet lifecycle and action execution

use crate::fetch::FetchId;
use thiserror::Error;

/// Errors raised synchronously by facet lifecycle and state operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FacetError {
    #[error("Can't create facet '{facet}'. No container node defined.")]
    MissingContainer { facet: String },

    #[error("Invalid pkeys count. Supplied {supplied}, but the entity hierarchy defines only {capacity}.")]
    TooManyKeys { supplied: usize, capacity: usize },

    #[error("Facet '{facet}' is not mounted")]
    NotMounted { facet: String },

    #[error("No outstanding fetch with id {0}")]
    UnknownFetch(FetchId),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Unknown dialog: {0}")]
    UnknownDialog(String),
}

/// Failure reported by an action handler
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Facet(#[from] FacetError),
}

pub type FacetResult<T> = Result<T, FacetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = FacetError::TooManyKeys {
            supplied: 3,
            capacity: 2,
        };
        assert!(err.to_string().starts_with("Invalid pkeys count"));

        let err = ActionError::from(FacetError::UnknownAction("delete".into()));
        assert_eq!(err.to_string(), "Unknown action: delete");
    }
}
