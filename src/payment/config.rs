//! Payment workflow configuration.

use crate::account::{Amount, Currency};
use std::env;

/// Limits applied to external money movements, in minor units.
///
/// Deposit minimums are advisory (shown to the user by the front end); the
/// operator confirms whatever actually arrived. Withdrawal minimums are
/// enforced at request creation.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Minimum withdrawal in nanotons (default 5 TON)
    pub min_withdrawal_ton: Amount,

    /// Minimum withdrawal in kopecks (default 500 RUB)
    pub min_withdrawal_rub: Amount,

    /// Advertised minimum deposit in nanotons (default 1 TON)
    pub min_deposit_ton: Amount,

    /// Advertised minimum deposit in kopecks (default 100 RUB)
    pub min_deposit_rub: Amount,
}

impl PaymentConfig {
    /// Load limits from environment variables, falling back to defaults:
    /// `MIN_WITHDRAWAL_TON`, `MIN_WITHDRAWAL_RUB`, `MIN_DEPOSIT_TON`,
    /// `MIN_DEPOSIT_RUB` (all in minor units).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_withdrawal_ton: env_amount("MIN_WITHDRAWAL_TON", defaults.min_withdrawal_ton),
            min_withdrawal_rub: env_amount("MIN_WITHDRAWAL_RUB", defaults.min_withdrawal_rub),
            min_deposit_ton: env_amount("MIN_DEPOSIT_TON", defaults.min_deposit_ton),
            min_deposit_rub: env_amount("MIN_DEPOSIT_RUB", defaults.min_deposit_rub),
        }
    }

    /// Enforced minimum for a withdrawal in `currency`.
    pub fn min_withdrawal(&self, currency: Currency) -> Amount {
        match currency {
            Currency::Ton => self.min_withdrawal_ton,
            Currency::Rub => self.min_withdrawal_rub,
        }
    }

    /// Advertised minimum for a deposit in `currency`.
    pub fn min_deposit(&self, currency: Currency) -> Amount {
        match currency {
            Currency::Ton => self.min_deposit_ton,
            Currency::Rub => self.min_deposit_rub,
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            min_withdrawal_ton: 5 * Currency::Ton.minor_per_major(),
            min_withdrawal_rub: 500 * Currency::Rub.minor_per_major(),
            min_deposit_ton: Currency::Ton.minor_per_major(),
            min_deposit_rub: 100 * Currency::Rub.minor_per_major(),
        }
    }
}

fn env_amount(name: &str, default: Amount) -> Amount {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_advertised_limits() {
        let config = PaymentConfig::default();
        assert_eq!(config.min_withdrawal(Currency::Ton), 5_000_000_000);
        assert_eq!(config.min_withdrawal(Currency::Rub), 50_000);
        assert_eq!(config.min_deposit(Currency::Ton), 1_000_000_000);
        assert_eq!(config.min_deposit(Currency::Rub), 10_000);
    }
}
