//! PostgreSQL ledger store.
//!
//! The durable backend. Balance changes are a single conditional `UPDATE`
//! whose `WHERE` clause carries the non-negativity precondition, so the
//! check-and-commit is one atomic statement and two racing debits can never
//! both succeed against one balance. Status changes use the same idiom with
//! the source status in the `WHERE` clause.

use super::{
    DeltaOutcome, LedgerStore, ResolveOutcome, SettleOutcome, StoreError, StoreResult,
};
use crate::account::{Account, AccountId, Amount, Currency};
use crate::payment::{PaymentRequest, RequestStatus};
use crate::session::{GameSession, SessionId, SessionStatus};
use crate::store::DatabaseConfig;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Idempotent schema statements, applied by [`PgLedgerStore::migrate`].
///
/// The `CHECK (amount >= 0)` on balances is a backstop; the conditional
/// update in `apply_delta` is what actually enforces non-negativity.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id BIGINT PRIMARY KEY,
        created_at TIMESTAMP NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS balances (
        account_id BIGINT NOT NULL REFERENCES accounts(id),
        currency TEXT NOT NULL,
        amount BIGINT NOT NULL DEFAULT 0 CHECK (amount >= 0),
        updated_at TIMESTAMP NOT NULL DEFAULT NOW(),
        PRIMARY KEY (account_id, currency)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS game_sessions (
        id UUID PRIMARY KEY,
        account_id BIGINT NOT NULL REFERENCES accounts(id),
        currency TEXT NOT NULL,
        bet_amount BIGINT NOT NULL,
        status TEXT NOT NULL,
        score BIGINT NOT NULL DEFAULT 0,
        opened_at TIMESTAMP NOT NULL,
        settled_at TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS payment_requests (
        id TEXT PRIMARY KEY,
        account_id BIGINT NOT NULL REFERENCES accounts(id),
        currency TEXT NOT NULL,
        direction TEXT NOT NULL,
        amount BIGINT NOT NULL DEFAULT 0,
        status TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL,
        resolved_at TIMESTAMP
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS payment_requests_status_idx
        ON payment_requests (status, created_at)
    "#,
];

/// PostgreSQL [`LedgerStore`] implementation.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: Arc<PgPool>,
}

impl PgLedgerStore {
    /// Wrap an existing connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Connect a new pool from configuration.
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the schema. Safe to run on every startup.
    pub async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(self.pool.as_ref()).await?;
        }
        Ok(())
    }

    /// Check if the database connection is healthy.
    pub async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }

    async fn load_balances(&self, id: AccountId) -> StoreResult<BTreeMap<Currency, Amount>> {
        let rows = sqlx::query("SELECT currency, amount FROM balances WHERE account_id = $1")
            .bind(id)
            .fetch_all(self.pool.as_ref())
            .await?;

        let mut balances = BTreeMap::new();
        for row in rows {
            let code: String = row.get("currency");
            let currency = code.parse::<Currency>().map_err(corrupted)?;
            balances.insert(currency, row.get::<i64, _>("amount"));
        }
        Ok(balances)
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn create_account(&self, id: AccountId) -> StoreResult<Account> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO accounts (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for currency in Currency::ALL {
            sqlx::query(
                "INSERT INTO balances (account_id, currency, amount)
                 VALUES ($1, $2, 0)
                 ON CONFLICT (account_id, currency) DO NOTHING",
            )
            .bind(id)
            .bind(currency.code())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.get_account(id).await?.ok_or_else(|| {
            StoreError::Corrupted(format!("account {id} missing after create"))
        })
    }

    async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        let row = sqlx::query("SELECT id, created_at FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Account {
            id: row.get("id"),
            balances: self.load_balances(id).await?,
            created_at: row.get::<NaiveDateTime, _>("created_at").and_utc(),
        }))
    }

    async fn apply_delta(
        &self,
        id: AccountId,
        currency: Currency,
        delta: Amount,
    ) -> StoreResult<DeltaOutcome> {
        // Atomic conditional update: the precondition travels in the WHERE
        // clause, so check and commit are a single statement.
        let updated = sqlx::query(
            "UPDATE balances
             SET amount = amount + $3, updated_at = NOW()
             WHERE account_id = $1 AND currency = $2 AND amount + $3 >= 0
             RETURNING amount",
        )
        .bind(id)
        .bind(currency.code())
        .bind(delta)
        .fetch_optional(self.pool.as_ref())
        .await?;

        if let Some(row) = updated {
            return Ok(DeltaOutcome::Applied {
                balance: row.get("amount"),
            });
        }

        // Either the account is unknown or the precondition failed.
        let current = sqlx::query(
            "SELECT amount FROM balances WHERE account_id = $1 AND currency = $2",
        )
        .bind(id)
        .bind(currency.code())
        .fetch_optional(self.pool.as_ref())
        .await?;

        match current {
            Some(row) => Ok(DeltaOutcome::InsufficientFunds {
                current: row.get("amount"),
            }),
            None => Ok(DeltaOutcome::MissingAccount),
        }
    }

    async fn create_session(&self, session: &GameSession) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO game_sessions (id, account_id, currency, bet_amount, status, score, opened_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(session.id)
        .bind(session.account_id)
        .bind(session.currency.code())
        .bind(session.bet_amount)
        .bind(session.status.to_string())
        .bind(session.score)
        .bind(session.opened_at.naive_utc())
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_session(&self, id: SessionId) -> StoreResult<Option<GameSession>> {
        let row = sqlx::query(
            "SELECT id, account_id, currency, bet_amount, status, score, opened_at, settled_at
             FROM game_sessions
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(session_from_row).transpose()
    }

    async fn settle_session(
        &self,
        id: SessionId,
        to: SessionStatus,
        score: i64,
        settled_at: DateTime<Utc>,
    ) -> StoreResult<SettleOutcome> {
        let settled = sqlx::query(
            "UPDATE game_sessions
             SET status = $2, score = $3, settled_at = $4
             WHERE id = $1 AND status = 'open'
             RETURNING id, account_id, currency, bet_amount, status, score, opened_at, settled_at",
        )
        .bind(id)
        .bind(to.to_string())
        .bind(score)
        .bind(settled_at.naive_utc())
        .fetch_optional(self.pool.as_ref())
        .await?;

        if let Some(row) = settled {
            return Ok(SettleOutcome::Settled(session_from_row(row)?));
        }

        // Lost the race or no such session; look at what is actually there.
        let current = sqlx::query("SELECT status FROM game_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        match current {
            Some(row) => {
                let status: String = row.get("status");
                Ok(SettleOutcome::WrongStatus(
                    status.parse().map_err(corrupted)?,
                ))
            }
            None => Ok(SettleOutcome::Missing),
        }
    }

    async fn create_request(&self, request: &PaymentRequest) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO payment_requests (id, account_id, currency, direction, amount, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&request.id)
        .bind(request.account_id)
        .bind(request.currency.code())
        .bind(request.direction.to_string())
        .bind(request.amount)
        .bind(request.status.to_string())
        .bind(request.created_at.naive_utc())
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_request(&self, id: &str) -> StoreResult<Option<PaymentRequest>> {
        let row = sqlx::query(
            "SELECT id, account_id, currency, direction, amount, status, created_at, resolved_at
             FROM payment_requests
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(request_from_row).transpose()
    }

    async fn resolve_request(
        &self,
        id: &str,
        to: RequestStatus,
        amount: Option<Amount>,
        resolved_at: DateTime<Utc>,
    ) -> StoreResult<ResolveOutcome> {
        let resolved = sqlx::query(
            "UPDATE payment_requests
             SET status = $2, amount = COALESCE($3, amount), resolved_at = $4
             WHERE id = $1 AND status = 'pending'
             RETURNING id, account_id, currency, direction, amount, status, created_at, resolved_at",
        )
        .bind(id)
        .bind(to.to_string())
        .bind(amount)
        .bind(resolved_at.naive_utc())
        .fetch_optional(self.pool.as_ref())
        .await?;

        if let Some(row) = resolved {
            return Ok(ResolveOutcome::Resolved(request_from_row(row)?));
        }

        let current = sqlx::query("SELECT status FROM payment_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        match current {
            Some(row) => {
                let status: String = row.get("status");
                Ok(ResolveOutcome::WrongStatus(
                    status.parse().map_err(corrupted)?,
                ))
            }
            None => Ok(ResolveOutcome::Missing),
        }
    }

    async fn list_requests(&self, status: RequestStatus) -> StoreResult<Vec<PaymentRequest>> {
        let rows = sqlx::query(
            "SELECT id, account_id, currency, direction, amount, status, created_at, resolved_at
             FROM payment_requests
             WHERE status = $1
             ORDER BY created_at",
        )
        .bind(status.to_string())
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(request_from_row).collect()
    }
}

fn corrupted<E: std::fmt::Display>(err: E) -> StoreError {
    StoreError::Corrupted(err.to_string())
}

fn session_from_row(row: PgRow) -> StoreResult<GameSession> {
    let currency: String = row.get("currency");
    let status: String = row.get("status");
    Ok(GameSession {
        id: row.get("id"),
        account_id: row.get("account_id"),
        currency: currency.parse().map_err(corrupted)?,
        bet_amount: row.get("bet_amount"),
        status: status.parse().map_err(corrupted)?,
        score: row.get("score"),
        opened_at: row.get::<NaiveDateTime, _>("opened_at").and_utc(),
        settled_at: row
            .get::<Option<NaiveDateTime>, _>("settled_at")
            .map(|t| t.and_utc()),
    })
}

fn request_from_row(row: PgRow) -> StoreResult<PaymentRequest> {
    let currency: String = row.get("currency");
    let direction: String = row.get("direction");
    let status: String = row.get("status");
    Ok(PaymentRequest {
        id: row.get("id"),
        account_id: row.get("account_id"),
        currency: currency.parse().map_err(corrupted)?,
        direction: direction.parse().map_err(corrupted)?,
        amount: row.get("amount"),
        status: status.parse().map_err(corrupted)?,
        created_at: row.get::<NaiveDateTime, _>("created_at").and_utc(),
        resolved_at: row
            .get::<Option<NaiveDateTime>, _>("resolved_at")
            .map(|t| t.and_utc()),
    })
}
