//! Account management: balances and the debit/credit primitives.

pub mod manager;
pub mod models;

pub use manager::AccountManager;
pub use models::{Account, AccountId, Amount, Currency, UnknownCurrency};
