use std::sync::Arc;

use tokio::sync::Barrier;
use vault_ledger::{Amount, EventKind, Ledger, LedgerConfig, LedgerEvent, VaultError};

fn units(n: i64) -> Amount {
    Amount::from_units(n)
}

fn drain(events: &mut tokio::sync::broadcast::Receiver<LedgerEvent>) -> Vec<LedgerEvent> {
    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    received
}

/// Two callers race to withdraw the whole balance
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_withdrawals_only_one_wins() {
    for _ in 0..50 {
        let ledger = Ledger::spawn(LedgerConfig::default().with_initial_balance(units(100))).unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let ledger = ledger.clone();
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    ledger.withdraw(units(100)).unwrap().await
                })
            })
            .collect();

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        let wins = outcomes.iter().filter(|o| o.is_ok()).count();
        assert_eq!(wins, 1, "outcomes: {:?}", outcomes);
        assert!(outcomes.contains(&Err(VaultError::InsufficientFunds {
            requested: units(100),
            balance: units(0),
        })));
        assert_eq!(ledger.balance().await.unwrap(), Amount::ZERO);
    }
}

/// Many callers mixing deposits and withdrawals never overdraw, and the
/// event stream replays to the final balance
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_callers_never_overdraw() {
    let config = LedgerConfig {
        initial_balance: units(50),
        event_capacity: 1 << 16,
    };
    let ledger = Ledger::spawn(config).unwrap();
    let mut events = ledger.subscribe();

    let handles: Vec<_> = (0..16i64)
        .map(|caller| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                for i in 0..200i64 {
                    let n = (caller * 31 + i * 17) % 40;
                    if i % 3 == 0 {
                        ledger.deposit(units(n)).unwrap();
                    } else {
                        let _ = ledger.withdraw(units(n)).unwrap();
                    }
                    if i % 25 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let final_balance = ledger.balance().await.unwrap();
    let stats = ledger.stats().await.unwrap();
    let received = drain(&mut events);

    assert_eq!(received.len() as u64, stats.last_seq);
    assert_eq!(
        stats.deposits_applied + stats.withdrawals_applied + stats.withdrawals_rejected,
        16 * 200
    );

    let mut replayed = units(50);
    for (expected_seq, event) in (1u64..).zip(&received) {
        assert_eq!(event.seq, expected_seq);
        match &event.kind {
            EventKind::Deposited { amount, balance } => {
                replayed = replayed.checked_add(*amount).unwrap();
                assert_eq!(*balance, replayed);
            }
            EventKind::Withdrawn { amount, balance } => {
                assert!(*amount <= replayed, "withdrew {} from {}", amount, replayed);
                replayed = replayed.checked_sub(*amount).unwrap();
                assert_eq!(*balance, replayed);
            }
            EventKind::WithdrawalRejected { requested, balance } => {
                assert!(*requested > replayed);
                assert_eq!(*balance, replayed);
            }
            EventKind::DepositRejected { .. } => panic!("unexpected rejection: {}", event),
        }
        assert!(!replayed.is_negative());
    }

    assert_eq!(replayed, final_balance);
    assert_eq!(stats.balance, final_balance);
}

/// A caller's read always reflects its own earlier submissions
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_observe_own_prior_deposits() {
    let ledger = Ledger::spawn(LedgerConfig::default()).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                let mut own = Amount::ZERO;
                for _ in 0..100 {
                    ledger.deposit(units(1)).unwrap();
                    own = own.checked_add(units(1)).unwrap();
                    let seen = ledger.balance().await.unwrap();
                    assert!(seen >= own, "saw {} after depositing {}", seen, own);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(ledger.balance().await.unwrap(), units(800));
}

/// Balances sampled while writers run are whole prefixes and never go backwards
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sampled_balances_are_monotonic_prefixes() {
    let ledger = Ledger::spawn(LedgerConfig::default()).unwrap();

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                for _ in 0..500 {
                    ledger.deposit(units(1)).unwrap();
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let reader = {
        let ledger = ledger.clone();
        tokio::spawn(async move {
            let mut last = Amount::ZERO;
            for _ in 0..200 {
                let seen = ledger.balance().await.unwrap();
                assert!(seen >= last);
                assert_eq!(seen.raw() % units(1).raw(), 0, "torn read: {}", seen);
                last = seen;
            }
        })
    };

    for writer in writers {
        writer.await.unwrap();
    }
    reader.await.unwrap();

    assert_eq!(ledger.balance().await.unwrap(), units(2000));
}

/// Plain OS threads using the blocking API share one ledger
#[test]
fn test_blocking_callers_on_threads() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let ledger = Ledger::spawn_on(
        LedgerConfig::default().with_initial_balance(units(1000)),
        runtime.handle(),
    )
    .unwrap();

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let ledger = ledger.clone();
            std::thread::spawn(move || {
                let mut succeeded = 0i64;
                for _ in 0..50 {
                    if ledger.withdraw(units(3)).unwrap().blocking_wait().is_ok() {
                        succeeded += 1;
                    }
                }
                succeeded
            })
        })
        .collect();

    let succeeded: i64 = threads.into_iter().map(|t| t.join().unwrap()).sum();

    // 400 attempts of 3 against 1000 leave 1 behind after 333 successes
    assert_eq!(succeeded, 333);
    assert_eq!(ledger.blocking_balance().unwrap(), units(1));
}
