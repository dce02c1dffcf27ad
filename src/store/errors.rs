//! Ledger store error types.

use thiserror::Error;

/// Errors surfaced by a [`super::LedgerStore`] backend.
///
/// `Unavailable` is the only retryable class; everything else means the
/// stored data itself is wrong.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying persistence failed (connection loss, timeout, ...)
    #[error("ledger store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    /// Balance arithmetic would overflow the minor-unit integer
    #[error("balance arithmetic overflow")]
    Overflow,

    /// A stored record could not be decoded into its model
    #[error("corrupted ledger record: {0}")]
    Corrupted(String),
}

impl StoreError {
    /// Whether a caller may retry the failed operation with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
