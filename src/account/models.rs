//! Account data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Account ID type (stable external user identifier, e.g. a chat user id)
pub type AccountId = i64;

/// Monetary amount in minor units (nanotons for TON, kopecks for RUB).
///
/// Balances are fixed-point integers so no float drift can creep into
/// the ledger arithmetic.
pub type Amount = i64;

/// Supported currencies
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Ton,
    Rub,
}

impl Currency {
    /// All currencies an account holds a balance in.
    pub const ALL: [Currency; 2] = [Currency::Ton, Currency::Rub];

    /// Canonical currency code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Ton => "TON",
            Currency::Rub => "RUB",
        }
    }

    /// Number of decimal places carried by the minor unit
    pub fn decimals(&self) -> u32 {
        match self {
            Currency::Ton => 9,
            Currency::Rub => 2,
        }
    }

    /// Minor units per one major unit (10^decimals)
    pub fn minor_per_major(&self) -> Amount {
        10_i64.pow(self.decimals())
    }

    /// Render a minor-unit amount as a human-readable major-unit string,
    /// e.g. `500_000_000` nanotons -> `"0.5 TON"`.
    pub fn format_amount(&self, amount: Amount) -> String {
        let scale = self.minor_per_major();
        let whole = amount / scale;
        let frac = (amount % scale).unsigned_abs();
        if frac == 0 {
            format!("{whole} {}", self.code())
        } else {
            let digits = format!("{frac:0width$}", width = self.decimals() as usize);
            format!("{whole}.{} {}", digits.trim_end_matches('0'), self.code())
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Unknown currency code error
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
#[error("unknown currency code: {0}")]
pub struct UnknownCurrency(pub String);

impl FromStr for Currency {
    type Err = UnknownCurrency;

    // Accepts the lowercase codes used on the wire ("ton"/"rub") as well
    // as the canonical uppercase codes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ton" | "TON" => Ok(Currency::Ton),
            "rub" | "RUB" => Ok(Currency::Rub),
            other => Err(UnknownCurrency(other.to_string())),
        }
    }
}

/// Account model: a user's holdings across currencies.
///
/// Accounts are created on first contact with zero balances and are never
/// deleted; a balance can never go negative.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub balances: BTreeMap<Currency, Amount>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Fresh zero-balance account.
    pub fn new(id: AccountId, created_at: DateTime<Utc>) -> Self {
        let balances = Currency::ALL.iter().map(|c| (*c, 0)).collect();
        Self {
            id,
            balances,
            created_at,
        }
    }

    /// Balance in a single currency (zero if the currency row is absent).
    pub fn balance(&self, currency: Currency) -> Amount {
        self.balances.get(&currency).copied().unwrap_or(0)
    }
}
