//! Benchmarks for the hot ledger paths: balance deltas and the full
//! stake/settle cycle, measured against the in-memory store.

use criterion::{Criterion, criterion_group, criterion_main};
use std::sync::Arc;
use timber_ledger::{AccountManager, Currency, GameEngine, MemoryLedgerStore};
use tokio::runtime::Runtime;

const TON: i64 = 1_000_000_000;

fn bench_balance_deltas(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let store = Arc::new(MemoryLedgerStore::new());
    let accounts = AccountManager::new(store.clone());
    rt.block_on(async {
        accounts.ensure_account(1).await.unwrap();
        accounts.credit(1, Currency::Ton, 1_000_000 * TON).await.unwrap();
    });

    c.bench_function("debit_credit_pair", |b| {
        b.iter(|| {
            rt.block_on(async {
                accounts.debit(1, Currency::Ton, TON).await.unwrap();
                accounts.credit(1, Currency::Ton, TON).await.unwrap();
            })
        })
    });
}

fn bench_stake_settle_cycle(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let store = Arc::new(MemoryLedgerStore::new());
    let accounts = AccountManager::new(store.clone());
    let games = GameEngine::new(store, accounts.clone());
    rt.block_on(async {
        accounts.ensure_account(1).await.unwrap();
        accounts.credit(1, Currency::Ton, 1_000_000 * TON).await.unwrap();
    });

    c.bench_function("start_settle_win", |b| {
        b.iter(|| {
            rt.block_on(async {
                let started = games.start(1, Currency::Ton, TON).await.unwrap();
                games.settle(started.session_id, 0, true).await.unwrap();
            })
        })
    });
}

criterion_group!(benches, bench_balance_deltas, bench_stake_settle_cycle);
criterion_main!(benches);
