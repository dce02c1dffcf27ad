//! Database configuration module.

use std::env;
use std::str::FromStr;

/// PostgreSQL connection configuration.
///
/// Only the knobs [`super::PgLedgerStore::connect`] actually tunes; pool
/// behavior beyond these follows sqlx defaults.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub database_url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Seconds to wait for a free connection before giving up
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    /// Load from `DATABASE_URL`, `DB_MAX_CONNECTIONS` (default 20) and
    /// `DB_ACQUIRE_TIMEOUT` (default 10 seconds).
    ///
    /// # Panics
    ///
    /// Panics if `DATABASE_URL` is not set
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            max_connections: env_parse("DB_MAX_CONNECTIONS", 20),
            acquire_timeout_secs: env_parse("DB_ACQUIRE_TIMEOUT", 10),
        }
    }

    /// Default configuration for local development
    pub fn development() -> Self {
        Self {
            database_url: "postgres://postgres@localhost/timber_ledger".to_string(),
            max_connections: 20,
            acquire_timeout_secs: 10,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::development()
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults_are_sane() {
        let config = DatabaseConfig::development();
        assert!(config.database_url.starts_with("postgres://"));
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.acquire_timeout_secs, 10);
    }
}
