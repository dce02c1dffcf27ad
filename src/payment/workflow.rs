//! Payment reconciliation workflow implementation.
//!
//! State machine per request: `Pending -> Confirmed | Rejected`, resolved
//! exactly once. The compare-and-transition in the store is the gate: of
//! any set of duplicate confirm/reject calls (operator double-click,
//! retried network call), exactly one applies a balance change.

use super::config::PaymentConfig;
use super::models::{Direction, PaymentRequest, RequestStatus};
use crate::account::{AccountId, AccountManager, Amount, Currency};
use crate::errors::{LedgerError, LedgerResult};
use crate::store::{LedgerStore, ResolveOutcome, StoreError};
use chrono::Utc;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;

/// Attempts to find a free derived request id before giving up. Ids carry a
/// millisecond timestamp, so a collision only means two requests from the
/// same account within the same millisecond.
const ID_ATTEMPTS: u32 = 3;

/// Payment reconciliation workflow
#[derive(Clone)]
pub struct PaymentWorkflow {
    store: Arc<dyn LedgerStore>,
    accounts: AccountManager,
    config: PaymentConfig,
}

impl PaymentWorkflow {
    /// Create a new payment workflow
    pub fn new(store: Arc<dyn LedgerStore>, accounts: AccountManager, config: PaymentConfig) -> Self {
        Self {
            store,
            accounts,
            config,
        }
    }

    /// The configured limits (for front-end display).
    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }

    /// Open a deposit request. The amount stays zero until an operator
    /// inspects the off-band transfer and confirms what actually arrived;
    /// the returned id is what the user transcribes into the transfer
    /// comment.
    ///
    /// # Errors
    ///
    /// * `LedgerError::AccountNotFound` - account was never ensured
    pub async fn create_deposit(
        &self,
        account_id: AccountId,
        currency: Currency,
    ) -> LedgerResult<PaymentRequest> {
        self.store
            .get_account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;

        let request = PaymentRequest::pending(account_id, currency, Direction::Deposit, 0);
        let request = self.insert_request(request).await?;
        info!(
            "deposit request {} opened for account {account_id} ({currency})",
            request.id
        );
        Ok(request)
    }

    /// Open a withdrawal request, reserving the funds immediately so they
    /// cannot be spent elsewhere while the payout is pending. No request is
    /// created when the reserve debit fails.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - amount is not positive
    /// * `LedgerError::BelowMinimum` - amount under the configured minimum
    /// * `LedgerError::InsufficientFunds` - balance cannot cover the reserve
    /// * `LedgerError::AccountNotFound` - account was never ensured
    pub async fn create_withdrawal(
        &self,
        account_id: AccountId,
        currency: Currency,
        amount: Amount,
    ) -> LedgerResult<PaymentRequest> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let minimum = self.config.min_withdrawal(currency);
        if amount < minimum {
            return Err(LedgerError::BelowMinimum {
                currency,
                amount,
                minimum,
            });
        }

        self.accounts.debit(account_id, currency, amount).await?;

        let request =
            PaymentRequest::pending(account_id, currency, Direction::Withdrawal, amount);
        match self.insert_request(request).await {
            Ok(request) => {
                info!(
                    "withdrawal request {} opened: account {account_id} reserved {}",
                    request.id,
                    currency.format_amount(amount)
                );
                Ok(request)
            }
            Err(err) => {
                // Same contract as a failed session create: the reserve has
                // already been taken, so it must go back before we surface
                // the error.
                let _ = self
                    .accounts
                    .credit_with_retry(
                        account_id,
                        currency,
                        amount,
                        "reserve refund after failed withdrawal create",
                    )
                    .await;
                Err(err)
            }
        }
    }

    /// Confirm a pending request. Deposits require the operator-verified
    /// `confirmed_amount` and credit it on the winning transition;
    /// withdrawals just mark the off-band payout completed (funds were
    /// reserved at creation).
    ///
    /// # Errors
    ///
    /// * `LedgerError::RequestNotFound` - no such request
    /// * `LedgerError::InvalidAmount` - deposit confirmed without a positive amount
    /// * `LedgerError::InvalidTransition` - already resolved (or lost a race)
    pub async fn confirm(
        &self,
        request_id: &str,
        confirmed_amount: Option<Amount>,
    ) -> LedgerResult<PaymentRequest> {
        let request = self
            .store
            .get_request(request_id)
            .await?
            .ok_or_else(|| LedgerError::RequestNotFound(request_id.to_string()))?;

        let recorded_amount = match request.direction {
            Direction::Deposit => {
                let amount = confirmed_amount.unwrap_or(0);
                if amount <= 0 {
                    return Err(LedgerError::InvalidAmount(amount));
                }
                Some(amount)
            }
            // The reserved amount is authoritative for withdrawals.
            Direction::Withdrawal => None,
        };

        let resolved = self
            .resolve(request_id, RequestStatus::Confirmed, recorded_amount)
            .await?;

        if resolved.direction == Direction::Deposit {
            // Past the point of no return: the transition is won, the
            // credit must stick.
            self.accounts
                .credit_with_retry(
                    resolved.account_id,
                    resolved.currency,
                    resolved.amount,
                    "confirmed deposit credit",
                )
                .await?;
        }

        info!(
            "request {} confirmed: {} {} for account {}",
            resolved.id,
            resolved.direction,
            resolved.currency.format_amount(resolved.amount),
            resolved.account_id
        );
        Ok(resolved)
    }

    /// Reject a pending request. Withdrawals get their reservation credited
    /// back on the winning transition; deposits never applied a balance
    /// change, so nothing moves.
    ///
    /// # Errors
    ///
    /// * `LedgerError::RequestNotFound` - no such request
    /// * `LedgerError::InvalidTransition` - already resolved (or lost a race)
    pub async fn reject(&self, request_id: &str) -> LedgerResult<PaymentRequest> {
        let resolved = self.resolve(request_id, RequestStatus::Rejected, None).await?;

        if resolved.direction == Direction::Withdrawal {
            self.accounts
                .credit_with_retry(
                    resolved.account_id,
                    resolved.currency,
                    resolved.amount,
                    "rejected withdrawal refund",
                )
                .await?;
        }

        info!("request {} rejected ({})", resolved.id, resolved.direction);
        Ok(resolved)
    }

    /// Operator listing of requests in a given status, oldest first.
    pub async fn list_requests(&self, status: RequestStatus) -> LedgerResult<Vec<PaymentRequest>> {
        Ok(self.store.list_requests(status).await?)
    }

    /// Idempotent status inspection; the prescribed recovery path for a
    /// caller that timed out instead of blindly re-invoking.
    pub async fn get_request(&self, request_id: &str) -> LedgerResult<PaymentRequest> {
        self.store
            .get_request(request_id)
            .await?
            .ok_or_else(|| LedgerError::RequestNotFound(request_id.to_string()))
    }

    async fn resolve(
        &self,
        request_id: &str,
        to: RequestStatus,
        amount: Option<Amount>,
    ) -> LedgerResult<PaymentRequest> {
        match self
            .store
            .resolve_request(request_id, to, amount, Utc::now())
            .await?
        {
            ResolveOutcome::Resolved(request) => Ok(request),
            ResolveOutcome::WrongStatus(actual) => {
                // Expected under duplicate operator actions; not a fault.
                debug!("request {request_id} already resolved ({actual})");
                Err(LedgerError::InvalidTransition {
                    expected: "pending",
                    actual: actual.to_string(),
                })
            }
            ResolveOutcome::Missing => Err(LedgerError::RequestNotFound(request_id.to_string())),
        }
    }

    async fn insert_request(&self, mut request: PaymentRequest) -> LedgerResult<PaymentRequest> {
        for _ in 0..ID_ATTEMPTS {
            if self.store.create_request(&request).await? {
                return Ok(request);
            }
            // Same account, same millisecond; wait the clock out.
            tokio::time::sleep(Duration::from_millis(1)).await;
            request = request.with_fresh_id();
        }
        Err(LedgerError::Store(StoreError::Corrupted(format!(
            "could not derive a free request id for account {}",
            request.account_id
        ))))
    }
}
