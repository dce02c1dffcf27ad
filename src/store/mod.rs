//! Ledger store: durable record storage with atomic conditional updates.
//!
//! Every balance mutation in the system goes through [`LedgerStore::apply_delta`],
//! and every status change goes through one of the compare-and-transition
//! primitives (`settle_session`, `resolve_request`). The trait abstraction
//! mirrors the repository seam used elsewhere in our stack: managers depend on
//! the trait, so tests and benches run against the in-memory backend while
//! production runs against PostgreSQL.

use crate::account::{Account, AccountId, Amount, Currency};
use crate::payment::{PaymentRequest, RequestStatus};
use crate::session::{GameSession, SessionId, SessionStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod config;
pub mod errors;
pub mod memory;
pub mod postgres;

pub use config::DatabaseConfig;
pub use errors::{StoreError, StoreResult};
pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Outcome of a conditional balance delta.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeltaOutcome {
    /// Precondition held; `balance` is the committed new balance.
    Applied { balance: Amount },
    /// The delta would have driven the balance below zero.
    InsufficientFunds { current: Amount },
    /// No such account (the account was never ensured).
    MissingAccount,
}

/// Outcome of a session compare-and-transition.
#[derive(Clone, Debug)]
pub enum SettleOutcome {
    /// This caller won the `Open -> Won|Lost` transition.
    Settled(GameSession),
    /// The session was already settled; carries the current status.
    WrongStatus(SessionStatus),
    /// No such session.
    Missing,
}

/// Outcome of a payment-request compare-and-transition.
#[derive(Clone, Debug)]
pub enum ResolveOutcome {
    /// This caller won the `Pending -> Confirmed|Rejected` transition.
    Resolved(PaymentRequest),
    /// The request was already resolved; carries the current status.
    WrongStatus(RequestStatus),
    /// No such request.
    Missing,
}

/// Durable storage for accounts, game sessions and payment requests.
///
/// Implementations must make `apply_delta` linearizable per account and the
/// compare-and-transition primitives linearizable per record id: of any set
/// of concurrent callers, exactly one observes the transition applied.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Create a zero-balance account if absent; returns the stored account
    /// either way. Idempotent.
    async fn create_account(&self, id: AccountId) -> StoreResult<Account>;

    /// Fetch an account snapshot, `None` if it was never created.
    async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>>;

    /// Atomically add `delta` to one balance, committing only if the result
    /// stays non-negative. This is the sole path by which balances change.
    async fn apply_delta(
        &self,
        id: AccountId,
        currency: Currency,
        delta: Amount,
    ) -> StoreResult<DeltaOutcome>;

    /// Insert a session record if its id is absent; `false` on collision.
    async fn create_session(&self, session: &GameSession) -> StoreResult<bool>;

    /// Fetch a session record by id.
    async fn get_session(&self, id: SessionId) -> StoreResult<Option<GameSession>>;

    /// Compare-and-transition a session from `Open` into the terminal
    /// status `to` (`Won` or `Lost`), recording `score` and `settled_at`.
    async fn settle_session(
        &self,
        id: SessionId,
        to: SessionStatus,
        score: i64,
        settled_at: DateTime<Utc>,
    ) -> StoreResult<SettleOutcome>;

    /// Insert a payment request if its id is absent; `false` on collision.
    async fn create_request(&self, request: &PaymentRequest) -> StoreResult<bool>;

    /// Fetch a payment request by id.
    async fn get_request(&self, id: &str) -> StoreResult<Option<PaymentRequest>>;

    /// Compare-and-transition a request from `Pending` into the terminal
    /// status `to` (`Confirmed` or `Rejected`). When `amount` is `Some` the
    /// stored amount is overwritten on the winning transition (used to
    /// record the operator-confirmed deposit amount).
    async fn resolve_request(
        &self,
        id: &str,
        to: RequestStatus,
        amount: Option<Amount>,
        resolved_at: DateTime<Utc>,
    ) -> StoreResult<ResolveOutcome>;

    /// List payment requests in a given status, oldest first.
    async fn list_requests(&self, status: RequestStatus) -> StoreResult<Vec<PaymentRequest>>;
}
