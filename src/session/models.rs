//! Game session data models.

use crate::account::{AccountId, Amount, Currency};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Session ID type
pub type SessionId = Uuid;

/// Fixed payout multiplier applied to the stake on a won session.
pub const PAYOUT_MULTIPLIER: Amount = 2;

/// Session status
///
/// `Won` and `Lost` are terminal; the only legal transition is
/// `Open -> Won | Lost`, applied at most once per session.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Open,
    Won,
    Lost,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            SessionStatus::Open => "open",
            SessionStatus::Won => "won",
            SessionStatus::Lost => "lost",
        };
        write!(f, "{repr}")
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(SessionStatus::Open),
            "won" => Ok(SessionStatus::Won),
            "lost" => Ok(SessionStatus::Lost),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// Game session model: one wager round from stake to settlement.
///
/// The stake is debited from the account before the record is created, so
/// an `Open` session always represents money already taken off the balance.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GameSession {
    pub id: SessionId,
    pub account_id: AccountId,
    pub currency: Currency,
    pub bet_amount: Amount,
    pub status: SessionStatus,
    pub score: i64,
    pub opened_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl GameSession {
    /// New `Open` session with a freshly generated id.
    pub fn open(account_id: AccountId, currency: Currency, bet_amount: Amount) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            currency,
            bet_amount,
            status: SessionStatus::Open,
            score: 0,
            opened_at: Utc::now(),
            settled_at: None,
        }
    }

    /// Payout credited to the account if this session is won.
    pub fn payout(&self) -> Option<Amount> {
        self.bet_amount.checked_mul(PAYOUT_MULTIPLIER)
    }
}
