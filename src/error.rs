//! Error types for stocklock.
//!
//! Uses thiserror for derive macros. Store-level failures are kept in their
//! own enum so the acquisition loop can tell transient contention apart from
//! a backend that is gone for good.

use crate::exit_codes;
use thiserror::Error;

/// Failures reported by a [`LeaseStore`](crate::store::LeaseStore) backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A record for this resource already exists (uniqueness constraint).
    #[error("a lease record already exists for this resource")]
    Conflict,

    /// The record to delete does not exist (already released or reclaimed).
    #[error("lease record not found")]
    NotFound,

    /// The stored token differs from the one supplied to a verified delete.
    #[error("lease record is held under a different token")]
    TokenMismatch,

    /// The backend could not serve the call right now; retrying may succeed.
    #[error("lease store unavailable: {0}")]
    Unavailable(String),

    /// A record exists but could not be decoded.
    #[error("lease record is corrupt: {0}")]
    Corrupt(String),

    /// Any other backend failure. Not retried.
    #[error("lease store failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether the acquisition loop should absorb this error and try again.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Conflict | StoreError::Unavailable(_))
    }
}

/// Main error type for stocklock operations.
#[derive(Error, Debug)]
pub enum StockLockError {
    /// Invalid arguments or an operation that makes no sense in the current state.
    #[error("{0}")]
    UserError(String),

    /// Configuration could not be read or failed validation.
    #[error("config error: {0}")]
    ConfigError(String),

    /// A resource stayed contended for the whole retry budget.
    #[error("timed out acquiring lease for resource {resource_id} after {attempts} attempts")]
    LeaseTimeout { resource_id: i64, attempts: u32 },

    /// The store failed in a way the retry loop does not absorb.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StockLockError {
    /// Returns the CLI exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            StockLockError::UserError(_) => exit_codes::USER_ERROR,
            StockLockError::ConfigError(_) => exit_codes::USER_ERROR,
            StockLockError::Store(_) => exit_codes::STORE_FAILURE,
            StockLockError::LeaseTimeout { .. } => exit_codes::LEASE_TIMEOUT,
        }
    }

    /// The contended resource, if this is a lease timeout.
    pub fn timed_out_resource(&self) -> Option<i64> {
        match self {
            StockLockError::LeaseTimeout { resource_id, .. } => Some(*resource_id),
            _ => None,
        }
    }
}

/// Result type alias for stocklock operations.
pub type Result<T> = std::result::Result<T, StockLockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_error_has_correct_exit_code() {
        let err = StockLockError::UserError("bad argument".to_string());
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn store_error_has_correct_exit_code() {
        let err = StockLockError::from(StoreError::Backend("disk gone".to_string()));
        assert_eq!(err.exit_code(), exit_codes::STORE_FAILURE);
    }

    #[test]
    fn lease_timeout_has_correct_exit_code() {
        let err = StockLockError::LeaseTimeout {
            resource_id: 5,
            attempts: 30,
        };
        assert_eq!(err.exit_code(), exit_codes::LEASE_TIMEOUT);
        assert_eq!(err.timed_out_resource(), Some(5));
    }

    #[test]
    fn transient_classification() {
        assert!(StoreError::Conflict.is_transient());
        assert!(StoreError::Unavailable("busy".into()).is_transient());
        assert!(!StoreError::NotFound.is_transient());
        assert!(!StoreError::Corrupt("bad json".into()).is_transient());
        assert!(!StoreError::Backend("eio".into()).is_transient());
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = StockLockError::LeaseTimeout {
            resource_id: 3,
            attempts: 30,
        };
        assert_eq!(
            err.to_string(),
            "timed out acquiring lease for resource 3 after 30 attempts"
        );

        let err = StockLockError::from(StoreError::Unavailable("locked".into()));
        assert_eq!(err.to_string(), "lease store unavailable: locked");
    }
}
