//! Game sessions: one wager round from stake to settlement.

pub mod engine;
pub mod models;

pub use engine::{GameEngine, SettledSession, StartedSession};
pub use models::{GameSession, PAYOUT_MULTIPLIER, SessionId, SessionStatus};
