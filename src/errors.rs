//! Crate-wide error taxonomy.

use crate::account::{AccountId, Amount, Currency};
use crate::session::SessionId;
use crate::store::StoreError;
use thiserror::Error;

/// Ledger errors
///
/// `InvalidTransition` is an expected outcome under concurrency (the loser
/// of a settle/confirm race), not a system fault. `Store` is the only class
/// worth retrying.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Account was never ensured
    #[error("account {0} does not exist")]
    AccountNotFound(AccountId),

    /// No such game session
    #[error("game session {0} does not exist")]
    SessionNotFound(SessionId),

    /// No such payment request
    #[error("payment request {0} does not exist")]
    RequestNotFound(String),

    /// Non-positive or malformed amount
    #[error("invalid amount: {0}")]
    InvalidAmount(Amount),

    /// Withdrawal amount under the configured minimum
    #[error("amount below the {currency} withdrawal minimum: {amount} < {minimum}")]
    BelowMinimum {
        currency: Currency,
        amount: Amount,
        minimum: Amount,
    },

    /// Debit would drive a balance below zero
    #[error("insufficient funds: available {available}, required {required}")]
    InsufficientFunds {
        available: Amount,
        required: Amount,
    },

    /// Attempted state change from a non-source state (double settlement,
    /// re-confirmation, or a lost race against a concurrent winner)
    #[error("invalid transition: expected {expected}, record is {actual}")]
    InvalidTransition {
        expected: &'static str,
        actual: String,
    },

    /// Underlying persistence failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Whether a caller may retry with backoff. Everything except store
    /// failures needs new input (or is a benign race loss) rather than a
    /// retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Store(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Client-safe message that doesn't leak storage internals.
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::Store(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_are_the_only_retryable_class() {
        assert!(!LedgerError::AccountNotFound(1).is_retryable());
        assert!(
            !LedgerError::InvalidTransition {
                expected: "open",
                actual: "won".to_string(),
            }
            .is_retryable()
        );
        let store = LedgerError::Store(StoreError::Unavailable(sqlx::Error::PoolTimedOut));
        assert!(store.is_retryable());
    }

    #[test]
    fn client_message_hides_store_internals() {
        let store = LedgerError::Store(StoreError::Unavailable(sqlx::Error::PoolTimedOut));
        assert_eq!(store.client_message(), "Internal server error");
        let funds = LedgerError::InsufficientFunds {
            available: 10,
            required: 20,
        };
        assert!(funds.client_message().contains("insufficient funds"));
    }
}
