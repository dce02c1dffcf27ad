//! # Timber Ledger
//!
//! Balance ledger and game session engine for the TimberTON wagering bot.
//!
//! Users hold TON and RUB balances, stake a balance on a timed game round,
//! and receive a payout or forfeiture at round end; balances are also moved
//! by operator-reconciled deposits and withdrawals. This crate is the money
//! core behind those flows: it guarantees that balances are debited and
//! credited exactly once per event, that a session or payment request
//! resolves exactly once, and that concurrent requests touching the same
//! account cannot corrupt a balance.
//!
//! ## Architecture
//!
//! Every balance mutation flows through the [`store::LedgerStore`]'s atomic
//! conditional-update primitive, and every status change through its
//! compare-and-transition primitives; nothing in the crate touches a raw
//! balance field. On top of that seam sit three small components:
//!
//! - [`account::AccountManager`]: creates accounts and moves balances,
//!   enforcing non-negativity. Mechanism only; no policy.
//! - [`session::GameEngine`]: `Open -> Won | Lost` per wager, stake debited
//!   at start, fixed 2x payout on the single winning settlement.
//! - [`payment::PaymentWorkflow`]: `Pending -> Confirmed | Rejected` per
//!   deposit/withdrawal, driven by an operator decision, applying each
//!   credit or refund exactly once.
//!
//! The messaging front end and the operator panel are callers of these
//! components, not part of this crate.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use timber_ledger::{
//!     AccountManager, Currency, GameEngine, MemoryLedgerStore, PaymentConfig, PaymentWorkflow,
//! };
//!
//! # async fn demo() -> timber_ledger::LedgerResult<()> {
//! let store = Arc::new(MemoryLedgerStore::new());
//! let accounts = AccountManager::new(store.clone());
//! let games = GameEngine::new(store.clone(), accounts.clone());
//! let payments = PaymentWorkflow::new(store, accounts.clone(), PaymentConfig::default());
//!
//! accounts.ensure_account(42).await?;
//! let deposit = payments.create_deposit(42, Currency::Ton).await?;
//! payments.confirm(&deposit.id, Some(1_000_000_000)).await?;
//! let game = games.start(42, Currency::Ton, 500_000_000).await?;
//! games.settle(game.session_id, 10, true).await?;
//! # Ok(())
//! # }
//! ```

/// Accounts and the debit/credit primitives.
pub mod account;
/// Crate-wide error taxonomy.
pub mod errors;
/// Deposit/withdrawal reconciliation workflow.
pub mod payment;
/// Game session state machine.
pub mod session;
/// Durable storage with atomic conditional updates.
pub mod store;

pub use account::{Account, AccountId, AccountManager, Amount, Currency};
pub use errors::{LedgerError, LedgerResult};
pub use payment::{Direction, PaymentConfig, PaymentRequest, PaymentWorkflow, RequestStatus};
pub use session::{
    GameEngine, GameSession, PAYOUT_MULTIPLIER, SessionId, SessionStatus, SettledSession,
    StartedSession,
};
pub use store::{DatabaseConfig, LedgerStore, MemoryLedgerStore, PgLedgerStore};
