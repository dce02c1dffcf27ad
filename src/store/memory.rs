//! In-memory ledger store.
//!
//! Backs tests, benches and local development. A single mutex over the maps
//! gives the per-account and per-record linearizability the trait demands;
//! no I/O or await ever happens while the lock is held, so every operation
//! stays a short bounded critical section.

use super::{
    DeltaOutcome, LedgerStore, ResolveOutcome, SettleOutcome, StoreError, StoreResult,
};
use crate::account::{Account, AccountId, Amount, Currency};
use crate::payment::{PaymentRequest, RequestStatus};
use crate::session::{GameSession, SessionId, SessionStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    accounts: HashMap<AccountId, Account>,
    sessions: HashMap<SessionId, GameSession>,
    requests: HashMap<String, PaymentRequest>,
}

/// In-memory [`LedgerStore`] implementation.
#[derive(Default)]
pub struct MemoryLedgerStore {
    inner: Mutex<Inner>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned mutex means a panic mid-mutation; the maps are still
        // structurally sound because every mutation is a single insert/assign.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn create_account(&self, id: AccountId) -> StoreResult<Account> {
        let mut inner = self.lock();
        let account = inner
            .accounts
            .entry(id)
            .or_insert_with(|| Account::new(id, Utc::now()));
        Ok(account.clone())
    }

    async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.lock().accounts.get(&id).cloned())
    }

    async fn apply_delta(
        &self,
        id: AccountId,
        currency: Currency,
        delta: Amount,
    ) -> StoreResult<DeltaOutcome> {
        let mut inner = self.lock();
        let Some(account) = inner.accounts.get_mut(&id) else {
            return Ok(DeltaOutcome::MissingAccount);
        };
        let balance = account.balances.entry(currency).or_insert(0);
        let current = *balance;
        let updated = current.checked_add(delta).ok_or(StoreError::Overflow)?;
        if updated < 0 {
            return Ok(DeltaOutcome::InsufficientFunds { current });
        }
        *balance = updated;
        Ok(DeltaOutcome::Applied { balance: updated })
    }

    async fn create_session(&self, session: &GameSession) -> StoreResult<bool> {
        let mut inner = self.lock();
        if inner.sessions.contains_key(&session.id) {
            return Ok(false);
        }
        inner.sessions.insert(session.id, session.clone());
        Ok(true)
    }

    async fn get_session(&self, id: SessionId) -> StoreResult<Option<GameSession>> {
        Ok(self.lock().sessions.get(&id).cloned())
    }

    async fn settle_session(
        &self,
        id: SessionId,
        to: SessionStatus,
        score: i64,
        settled_at: DateTime<Utc>,
    ) -> StoreResult<SettleOutcome> {
        let mut inner = self.lock();
        let Some(session) = inner.sessions.get_mut(&id) else {
            return Ok(SettleOutcome::Missing);
        };
        if session.status != SessionStatus::Open {
            return Ok(SettleOutcome::WrongStatus(session.status));
        }
        session.status = to;
        session.score = score;
        session.settled_at = Some(settled_at);
        Ok(SettleOutcome::Settled(session.clone()))
    }

    async fn create_request(&self, request: &PaymentRequest) -> StoreResult<bool> {
        let mut inner = self.lock();
        if inner.requests.contains_key(&request.id) {
            return Ok(false);
        }
        inner.requests.insert(request.id.clone(), request.clone());
        Ok(true)
    }

    async fn get_request(&self, id: &str) -> StoreResult<Option<PaymentRequest>> {
        Ok(self.lock().requests.get(id).cloned())
    }

    async fn resolve_request(
        &self,
        id: &str,
        to: RequestStatus,
        amount: Option<Amount>,
        resolved_at: DateTime<Utc>,
    ) -> StoreResult<ResolveOutcome> {
        let mut inner = self.lock();
        let Some(request) = inner.requests.get_mut(id) else {
            return Ok(ResolveOutcome::Missing);
        };
        if request.status != RequestStatus::Pending {
            return Ok(ResolveOutcome::WrongStatus(request.status));
        }
        request.status = to;
        if let Some(amount) = amount {
            request.amount = amount;
        }
        request.resolved_at = Some(resolved_at);
        Ok(ResolveOutcome::Resolved(request.clone()))
    }

    async fn list_requests(&self, status: RequestStatus) -> StoreResult<Vec<PaymentRequest>> {
        let inner = self.lock();
        let mut requests: Vec<PaymentRequest> = inner
            .requests
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::Direction;

    #[tokio::test]
    async fn apply_delta_rejects_negative_result() {
        let store = MemoryLedgerStore::new();
        store.create_account(1).await.unwrap();

        let outcome = store.apply_delta(1, Currency::Ton, 100).await.unwrap();
        assert_eq!(outcome, DeltaOutcome::Applied { balance: 100 });

        let outcome = store.apply_delta(1, Currency::Ton, -150).await.unwrap();
        assert_eq!(outcome, DeltaOutcome::InsufficientFunds { current: 100 });

        // The failed delta must not have moved the balance.
        let outcome = store.apply_delta(1, Currency::Ton, -100).await.unwrap();
        assert_eq!(outcome, DeltaOutcome::Applied { balance: 0 });
    }

    #[tokio::test]
    async fn apply_delta_on_unknown_account_is_missing() {
        let store = MemoryLedgerStore::new();
        let outcome = store.apply_delta(9, Currency::Rub, 10).await.unwrap();
        assert_eq!(outcome, DeltaOutcome::MissingAccount);
    }

    #[tokio::test]
    async fn create_account_is_idempotent() {
        let store = MemoryLedgerStore::new();
        store.create_account(1).await.unwrap();
        store.apply_delta(1, Currency::Rub, 50).await.unwrap();

        // Re-creating must not reset the balance.
        let account = store.create_account(1).await.unwrap();
        assert_eq!(account.balance(Currency::Rub), 50);
    }

    #[tokio::test]
    async fn settle_session_only_transitions_from_open() {
        let store = MemoryLedgerStore::new();
        let session = GameSession::open(1, Currency::Ton, 10);
        assert!(store.create_session(&session).await.unwrap());
        assert!(!store.create_session(&session).await.unwrap());

        let outcome = store
            .settle_session(session.id, SessionStatus::Won, 7, Utc::now())
            .await
            .unwrap();
        assert!(matches!(outcome, SettleOutcome::Settled(_)));

        let outcome = store
            .settle_session(session.id, SessionStatus::Lost, 3, Utc::now())
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SettleOutcome::WrongStatus(SessionStatus::Won)
        ));
    }

    #[tokio::test]
    async fn resolve_request_records_confirmed_amount() {
        let store = MemoryLedgerStore::new();
        let request = PaymentRequest::pending(1, Currency::Rub, Direction::Deposit, 0);
        assert!(store.create_request(&request).await.unwrap());

        let outcome = store
            .resolve_request(&request.id, RequestStatus::Confirmed, Some(20_000), Utc::now())
            .await
            .unwrap();
        match outcome {
            ResolveOutcome::Resolved(resolved) => {
                assert_eq!(resolved.amount, 20_000);
                assert_eq!(resolved.status, RequestStatus::Confirmed);
                assert!(resolved.resolved_at.is_some());
            }
            other => panic!("expected resolved, got {other:?}"),
        }

        let outcome = store
            .resolve_request(&request.id, RequestStatus::Rejected, None, Utc::now())
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            ResolveOutcome::WrongStatus(RequestStatus::Confirmed)
        ));
    }
}
