//! Lost-update safety under concurrent writers. Every mutation runs as an
//! immediate transaction with a compare-and-swap on the balance, and the
//! ledger retries on conflict, so no concurrent increment may be lost.

use chrono::Utc;
use loyalty_core::accounts::Account;
use loyalty_core::clock::{Clock, SystemClock};
use loyalty_core::ledger::Ledger;
use loyalty_core::store::Store;
use loyalty_core::types::{Reason, Tier};
use std::sync::Arc;
use std::thread;

const WRITERS: usize = 8;
const DELTAS_PER_WRITER: usize = 150;

/// 8 writers × 150 credits against one account through independent
/// connections. The final balance must equal the exact sum; a single
/// lost update breaks the equality.
#[test]
fn concurrent_credits_are_never_lost() {
    let (store, path) = open_file_store();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ledger = Ledger::new(store.clone(), clock.clone());
    let account = seed_account(&store);

    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let store = store.reopen().unwrap();
            let clock = clock.clone();
            let account = account.clone();
            thread::spawn(move || {
                let ledger = Ledger::new(store, clock);
                for _ in 0..DELTAS_PER_WRITER {
                    ledger
                        .apply_delta(&account, 1, Reason::Login, None)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let expected = (WRITERS * DELTAS_PER_WRITER) as i64;
    assert_eq!(ledger.balance(&account).unwrap(), expected);
    assert!(ledger.balance_matches_ledger(&account).unwrap());
    assert_eq!(
        store.ledger_entry_count().unwrap(),
        expected,
        "one ledger entry per applied delta"
    );

    cleanup(store, ledger, &path);
}

/// Mixed debits racing over a shared pot: the overdraw guard plus CAS
/// retries must keep the balance non-negative and exactly consistent
/// with the deltas that were accepted.
#[test]
fn racing_debits_never_overdraw() {
    let (store, path) = open_file_store();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ledger = Ledger::new(store.clone(), clock.clone());
    let account = seed_account(&store);
    ledger
        .apply_delta(&account, 100, Reason::Activation, None)
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = store.reopen().unwrap();
            let clock = clock.clone();
            let account = account.clone();
            thread::spawn(move || {
                let ledger = Ledger::new(store, clock);
                let mut applied = 0i64;
                for _ in 0..100 {
                    if ledger
                        .apply_delta(&account, -3, Reason::Redemption, None)
                        .is_ok()
                    {
                        applied += 3;
                    }
                }
                applied
            })
        })
        .collect();
    let debited: i64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

    let balance = ledger.balance(&account).unwrap();
    assert!(balance >= 0, "balance went negative: {balance}");
    assert_eq!(balance, 100 - debited);
    assert!(ledger.balance_matches_ledger(&account).unwrap());

    cleanup(store, ledger, &path);
}

// In-memory connections are isolated per handle, so the multi-connection
// tests run against a throwaway file in the system temp dir.
fn open_file_store() -> (Store, std::path::PathBuf) {
    let path = std::env::temp_dir().join(format!("loyalty-test-{}.db", uuid::Uuid::new_v4()));
    let store = Store::open(path.to_str().unwrap()).unwrap();
    store.migrate().unwrap();
    (store, path)
}

fn seed_account(store: &Store) -> String {
    let account = Account {
        account_id: format!("usr-{}", uuid::Uuid::new_v4()),
        name: "Seed".into(),
        email: format!("seed-{}@example.com", uuid::Uuid::new_v4()),
        balance: 0,
        tier: Tier::Silver,
        login_count: 0,
        last_login: None,
        referral_code: None,
        referred_by: None,
        bank_details: None,
        service_activated: false,
        created_at: Utc::now(),
    };
    store.insert_account(&account).unwrap();
    account.account_id
}

fn cleanup(store: Store, ledger: Ledger, path: &std::path::Path) {
    drop(ledger);
    drop(store);
    let _ = std::fs::remove_file(path);
    let _ = std::fs::remove_file(path.with_extension("db-wal"));
    let _ = std::fs::remove_file(path.with_extension("db-shm"));
}
