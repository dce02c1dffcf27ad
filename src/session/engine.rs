//! Game session engine implementation.
//!
//! State machine per session: `Open -> Won | Lost`, with the stake debited
//! eagerly at `start`. Staking up front means every `start` serializes
//! against the account balance, so a user cannot open many sessions against
//! one balance snapshot.

use super::models::{GameSession, SessionId, SessionStatus};
use crate::account::{AccountId, AccountManager, Amount, Currency};
use crate::errors::{LedgerError, LedgerResult};
use crate::store::{LedgerStore, SettleOutcome, StoreError};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of a successful `start`: the session id the caller settles with
/// later, plus the post-stake balance for display.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StartedSession {
    pub session_id: SessionId,
    pub balance: Amount,
}

/// Result of a successful `settle`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SettledSession {
    pub session: GameSession,
    pub balance: Amount,
}

/// Game session engine
#[derive(Clone)]
pub struct GameEngine {
    store: Arc<dyn LedgerStore>,
    accounts: AccountManager,
}

impl GameEngine {
    /// Create a new game engine
    pub fn new(store: Arc<dyn LedgerStore>, accounts: AccountManager) -> Self {
        Self { store, accounts }
    }

    /// Stake `bet_amount` and open a session.
    ///
    /// The debit and the record creation are one logical unit: if the record
    /// cannot be created after the stake was taken, the stake is credited
    /// back before the error surfaces.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - bet is not positive
    /// * `LedgerError::InsufficientFunds` - balance cannot cover the stake
    /// * `LedgerError::AccountNotFound` - account was never ensured
    pub async fn start(
        &self,
        account_id: AccountId,
        currency: Currency,
        bet_amount: Amount,
    ) -> LedgerResult<StartedSession> {
        if bet_amount <= 0 {
            return Err(LedgerError::InvalidAmount(bet_amount));
        }

        let balance = self.accounts.debit(account_id, currency, bet_amount).await?;
        let session = GameSession::open(account_id, currency, bet_amount);

        let created = match self.store.create_session(&session).await {
            Ok(created) => created,
            Err(err) => {
                self.refund_stake(&session).await;
                return Err(err.into());
            }
        };
        if !created {
            // A v4 id collision; nothing was inserted, so give the stake back.
            self.refund_stake(&session).await;
            return Err(LedgerError::Store(StoreError::Corrupted(format!(
                "duplicate session id {}",
                session.id
            ))));
        }

        info!(
            "session {} opened: account {account_id} staked {}",
            session.id,
            currency.format_amount(bet_amount)
        );
        Ok(StartedSession {
            session_id: session.id,
            balance,
        })
    }

    /// Settle a session with the caller-supplied score and outcome.
    ///
    /// Only one concurrent caller wins the `Open -> Won|Lost` transition;
    /// the losers get `InvalidTransition` and no balance is touched twice.
    /// A won session credits `bet * PAYOUT_MULTIPLIER`; a lost one changes
    /// nothing (the stake was forfeited at `start`).
    ///
    /// # Errors
    ///
    /// * `LedgerError::SessionNotFound` - no such session
    /// * `LedgerError::InvalidTransition` - already settled (or lost a race)
    pub async fn settle(
        &self,
        session_id: SessionId,
        score: i64,
        win: bool,
    ) -> LedgerResult<SettledSession> {
        let to = if win {
            SessionStatus::Won
        } else {
            SessionStatus::Lost
        };

        let session = match self
            .store
            .settle_session(session_id, to, score, chrono::Utc::now())
            .await?
        {
            SettleOutcome::Settled(session) => session,
            SettleOutcome::WrongStatus(actual) => {
                // Expected under concurrent duplicate settles; not a fault.
                debug!("session {session_id} already settled ({actual})");
                return Err(LedgerError::InvalidTransition {
                    expected: "open",
                    actual: actual.to_string(),
                });
            }
            SettleOutcome::Missing => return Err(LedgerError::SessionNotFound(session_id)),
        };

        let balance = if win {
            let payout = session.payout().ok_or(StoreError::Overflow)?;
            // The transition is already won; this credit must stick.
            self.accounts
                .credit_with_retry(session.account_id, session.currency, payout, "session payout")
                .await?
        } else {
            self.accounts
                .get_balances(session.account_id)
                .await?
                .get(&session.currency)
                .copied()
                .unwrap_or(0)
        };

        info!(
            "session {session_id} settled {}: score {score}, balance {}",
            session.status,
            session.currency.format_amount(balance)
        );
        Ok(SettledSession { session, balance })
    }

    /// Idempotent status inspection; the prescribed recovery path for a
    /// caller that timed out instead of blindly retrying `start`/`settle`.
    pub async fn get_session(&self, session_id: SessionId) -> LedgerResult<GameSession> {
        self.store
            .get_session(session_id)
            .await?
            .ok_or(LedgerError::SessionNotFound(session_id))
    }

    /// Reverse the stake after a failed record creation. Failure here is
    /// already logged (with reconciliation details) by the account manager;
    /// the caller still sees the original error.
    async fn refund_stake(&self, session: &GameSession) {
        let _ = self
            .accounts
            .credit_with_retry(
                session.account_id,
                session.currency,
                session.bet_amount,
                "stake refund after failed session create",
            )
            .await;
    }
}
