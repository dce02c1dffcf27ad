//! Property-based conservation tests.
//!
//! Runs random operation sequences against the ledger and checks that the
//! balance only ever moves by the amounts the operations report: confirmed
//! deposits in, resolved withdrawals out or back, stakes out at start and
//! doubled stakes back on wins. Any spontaneous drift fails the property.

use proptest::prelude::*;
use std::sync::Arc;
use timber_ledger::{
    AccountManager, Currency, GameEngine, LedgerError, MemoryLedgerStore, PaymentConfig,
    PaymentWorkflow,
};

const RUB: i64 = 100;
const ACCOUNT: i64 = 1;

#[derive(Clone, Debug)]
enum Op {
    /// Create a deposit and confirm the given verified amount.
    Deposit(i64),
    /// Request a withdrawal (reserving funds if the balance allows).
    Withdraw(i64),
    /// Confirm the oldest pending withdrawal, if any.
    ConfirmWithdrawal,
    /// Reject the oldest pending withdrawal, if any.
    RejectWithdrawal,
    /// Stake a bet and settle it immediately with the given outcome.
    Play { bet: i64, win: bool },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..=2000).prop_map(|rub| Op::Deposit(rub * RUB)),
        (400i64..=1500).prop_map(|rub| Op::Withdraw(rub * RUB)),
        Just(Op::ConfirmWithdrawal),
        Just(Op::RejectWithdrawal),
        ((1i64..=800), any::<bool>()).prop_map(|(rub, win)| Op::Play { bet: rub * RUB, win }),
    ]
}

/// Expected state mirrored alongside the real ledger.
#[derive(Default)]
struct Mirror {
    balance: i64,
    /// Pending withdrawal reservations (request id, amount), oldest first.
    reserved: Vec<(String, i64)>,
}

impl Mirror {
    fn reserved_total(&self) -> i64 {
        self.reserved.iter().map(|(_, amount)| amount).sum()
    }
}

async fn apply_op(
    op: Op,
    mirror: &mut Mirror,
    payments: &PaymentWorkflow,
    games: &GameEngine,
) {
    let min_withdrawal = payments.config().min_withdrawal(Currency::Rub);
    match op {
        Op::Deposit(amount) => {
            let deposit = payments.create_deposit(ACCOUNT, Currency::Rub).await.unwrap();
            payments.confirm(&deposit.id, Some(amount)).await.unwrap();
            mirror.balance += amount;
        }
        Op::Withdraw(amount) => {
            let result = payments
                .create_withdrawal(ACCOUNT, Currency::Rub, amount)
                .await;
            if amount < min_withdrawal {
                assert!(matches!(result, Err(LedgerError::BelowMinimum { .. })));
            } else if amount <= mirror.balance {
                let request = result.unwrap();
                mirror.balance -= amount;
                mirror.reserved.push((request.id, amount));
            } else {
                assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
            }
        }
        Op::ConfirmWithdrawal => {
            if !mirror.reserved.is_empty() {
                let (id, _) = mirror.reserved.remove(0);
                // Reserved funds leave the system; the balance is untouched.
                payments.confirm(&id, None).await.unwrap();
            }
        }
        Op::RejectWithdrawal => {
            if !mirror.reserved.is_empty() {
                let (id, amount) = mirror.reserved.remove(0);
                payments.reject(&id).await.unwrap();
                mirror.balance += amount;
            }
        }
        Op::Play { bet, win } => {
            let result = games.start(ACCOUNT, Currency::Rub, bet).await;
            if bet <= mirror.balance {
                let started = result.unwrap();
                mirror.balance -= bet;
                games.settle(started.session_id, 1, win).await.unwrap();
                if win {
                    mirror.balance += 2 * bet;
                }
            } else {
                assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn balances_never_drift(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let store = Arc::new(MemoryLedgerStore::new());
            let accounts = AccountManager::new(store.clone());
            let games = GameEngine::new(store.clone(), accounts.clone());
            let payments =
                PaymentWorkflow::new(store, accounts.clone(), PaymentConfig::default());
            accounts.ensure_account(ACCOUNT).await.unwrap();

            let mut mirror = Mirror::default();
            for op in ops {
                apply_op(op, &mut mirror, &payments, &games).await;

                // After every step the stored balance must equal the mirror
                // exactly; conservation leaves no room for drift.
                let balances = accounts.get_balances(ACCOUNT).await.unwrap();
                assert_eq!(balances[&Currency::Rub], mirror.balance);
            }

            // Reserved funds are accounted for by pending requests, nothing
            // was ever double-counted into the balance.
            assert!(mirror.reserved_total() >= 0);
        });
    }
}
