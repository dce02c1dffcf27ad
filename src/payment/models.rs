//! Payment request data models.

use crate::account::{AccountId, Amount, Currency};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payment request ID type.
///
/// Deposit ids are transcribed by hand into an off-band transfer comment,
/// so they are short derived strings rather than opaque UUIDs.
pub type RequestId = String;

/// Direction of an external money movement
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Deposit,
    Withdrawal,
}

impl Direction {
    /// Prefix used when deriving request ids.
    pub fn tag(&self) -> &'static str {
        match self {
            Direction::Deposit => "DEP",
            Direction::Withdrawal => "WDR",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Direction::Deposit => "deposit",
            Direction::Withdrawal => "withdrawal",
        };
        write!(f, "{repr}")
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(Direction::Deposit),
            "withdrawal" => Ok(Direction::Withdrawal),
            other => Err(format!("unknown payment direction: {other}")),
        }
    }
}

/// Request status
///
/// `Confirmed` and `Rejected` are terminal; the only legal transition is
/// `Pending -> Confirmed | Rejected`, applied at most once per request.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Confirmed => "confirmed",
            RequestStatus::Rejected => "rejected",
        };
        write!(f, "{repr}")
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "confirmed" => Ok(RequestStatus::Confirmed),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(format!("unknown request status: {other}")),
        }
    }
}

/// Payment request model: a pending external money-movement event.
///
/// For deposits `amount` is zero until an operator confirms the transferred
/// amount; for withdrawals `amount` is the sum reserved from the balance at
/// creation time.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PaymentRequest {
    pub id: RequestId,
    pub account_id: AccountId,
    pub currency: Currency,
    pub direction: Direction,
    pub amount: Amount,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl PaymentRequest {
    /// New `Pending` request with a derived human-transcribable id.
    pub fn pending(
        account_id: AccountId,
        currency: Currency,
        direction: Direction,
        amount: Amount,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            id: Self::derive_id(direction, account_id, created_at),
            account_id,
            currency,
            direction,
            amount,
            status: RequestStatus::Pending,
            created_at,
            resolved_at: None,
        }
    }

    /// Derive the id shown to the user, e.g. `DEP_7533802502_1767225600123`.
    pub fn derive_id(direction: Direction, account_id: AccountId, at: DateTime<Utc>) -> RequestId {
        format!("{}_{}_{}", direction.tag(), account_id, at.timestamp_millis())
    }

    /// Regenerate the id after a creation collision (same account, same
    /// millisecond). The timestamp has advanced by the time this is called.
    pub fn with_fresh_id(mut self) -> Self {
        self.id = Self::derive_id(self.direction, self.account_id, Utc::now());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Confirmed,
            RequestStatus::Rejected,
        ] {
            assert_eq!(status.to_string().parse::<RequestStatus>().unwrap(), status);
        }
    }

    #[test]
    fn deposit_ids_are_transcribable() {
        let request = PaymentRequest::pending(7533802502, Currency::Rub, Direction::Deposit, 0);
        assert!(request.id.starts_with("DEP_7533802502_"));
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.amount, 0);
    }

    #[test]
    fn withdrawal_ids_carry_direction_tag() {
        let request =
            PaymentRequest::pending(42, Currency::Ton, Direction::Withdrawal, 5_000_000_000);
        assert!(request.id.starts_with("WDR_42_"));
        assert_eq!(request.amount, 5_000_000_000);
    }
}
