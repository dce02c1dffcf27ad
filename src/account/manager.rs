//! Account manager implementation.
//!
//! Creates accounts and moves balances through the store's atomic
//! conditional-update primitive. This layer never decides *why* a balance
//! changes; that policy lives in the session engine and the payment
//! workflow, which call `debit`/`credit` as side effects of their own
//! transitions.

use super::models::{Account, AccountId, Amount, Currency};
use crate::errors::{LedgerError, LedgerResult};
use crate::store::{DeltaOutcome, LedgerStore};
use log::{debug, error, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Attempts made for credits that must not be lost (compensations, refunds,
/// payouts past the point of no return).
const CRITICAL_CREDIT_ATTEMPTS: u32 = 5;

/// Base backoff between critical-credit attempts; doubles each retry.
const CRITICAL_CREDIT_BACKOFF: Duration = Duration::from_millis(50);

/// Account manager
#[derive(Clone)]
pub struct AccountManager {
    store: Arc<dyn LedgerStore>,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Create a zero-balance account if absent. Idempotent; repeat calls
    /// return the existing account untouched.
    pub async fn ensure_account(&self, id: AccountId) -> LedgerResult<Account> {
        let account = self.store.create_account(id).await?;
        debug!("ensured account {id}");
        Ok(account)
    }

    /// Read-only balance snapshot.
    ///
    /// # Errors
    ///
    /// * `LedgerError::AccountNotFound` - account was never ensured
    pub async fn get_balances(&self, id: AccountId) -> LedgerResult<BTreeMap<Currency, Amount>> {
        let account = self
            .store
            .get_account(id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))?;
        Ok(account.balances)
    }

    /// Debit `amount` from one balance; fails rather than go negative.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - amount is not positive
    /// * `LedgerError::InsufficientFunds` - balance cannot cover the debit
    /// * `LedgerError::AccountNotFound` - account was never ensured
    pub async fn debit(
        &self,
        id: AccountId,
        currency: Currency,
        amount: Amount,
    ) -> LedgerResult<Amount> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        self.apply(id, currency, -amount).await
    }

    /// Credit `amount` to one balance.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - amount is not positive
    /// * `LedgerError::AccountNotFound` - account was never ensured
    pub async fn credit(
        &self,
        id: AccountId,
        currency: Currency,
        amount: Amount,
    ) -> LedgerResult<Amount> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        self.apply(id, currency, amount).await
    }

    /// Credit that must not be silently lost: retries store failures with
    /// backoff, and when every attempt is exhausted logs the full details
    /// needed for manual reconciliation before propagating the error.
    ///
    /// Used for the `start` compensation, withdrawal refunds and deposit
    /// credits — all places where the status transition has already been
    /// won and an unapplied credit would break money conservation.
    pub async fn credit_with_retry(
        &self,
        id: AccountId,
        currency: Currency,
        amount: Amount,
        reason: &str,
    ) -> LedgerResult<Amount> {
        let mut backoff = CRITICAL_CREDIT_BACKOFF;
        let mut attempt = 1;
        loop {
            match self.credit(id, currency, amount).await {
                Ok(balance) => return Ok(balance),
                Err(err) if err.is_retryable() && attempt < CRITICAL_CREDIT_ATTEMPTS => {
                    warn!(
                        "credit retry {attempt}/{CRITICAL_CREDIT_ATTEMPTS} for account {id} \
                         ({reason}): {err}"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(err) => {
                    error!(
                        "UNRECONCILED CREDIT: account {id} is owed {} ({reason}); \
                         manual reconciliation required: {err}",
                        currency.format_amount(amount)
                    );
                    return Err(err);
                }
            }
        }
    }

    async fn apply(
        &self,
        id: AccountId,
        currency: Currency,
        delta: Amount,
    ) -> LedgerResult<Amount> {
        match self.store.apply_delta(id, currency, delta).await? {
            DeltaOutcome::Applied { balance } => Ok(balance),
            DeltaOutcome::InsufficientFunds { current } => Err(LedgerError::InsufficientFunds {
                available: current,
                required: delta.unsigned_abs() as Amount,
            }),
            DeltaOutcome::MissingAccount => Err(LedgerError::AccountNotFound(id)),
        }
    }
}
