//! Ledger invariants: balance/tier consistency, overdraw protection, and
//! the audit-trail queries.

mod common;

use common::{fund, harness, register, register_funded};
use loyalty_core::error::CoreError;
use loyalty_core::ledger::LedgerDelta;
use loyalty_core::types::{Reason, Tier};

#[test]
fn credits_and_debits_move_the_balance() {
    let h = harness();
    let id = register_funded(&h, "Asha", 200);

    assert_eq!(h.core.ledger().balance(&id).unwrap(), 200);

    h.core
        .ledger()
        .apply_delta(&id, -50, Reason::Redemption, None)
        .unwrap();
    assert_eq!(h.core.ledger().balance(&id).unwrap(), 150);
    assert!(h.core.ledger().balance_matches_ledger(&id).unwrap());
}

#[test]
fn overdraw_is_rejected_without_mutation() {
    let h = harness();
    let id = register_funded(&h, "Asha", 100);

    let err = h
        .core
        .ledger()
        .apply_delta(&id, -101, Reason::Redemption, None)
        .unwrap_err();
    match err {
        CoreError::InsufficientBalance {
            available,
            requested,
            ..
        } => {
            assert_eq!(available, 100);
            assert_eq!(requested, 101);
        }
        other => panic!("expected InsufficientBalance, got {other}"),
    }
    assert_eq!(h.core.ledger().balance(&id).unwrap(), 100);
    assert!(h.core.ledger().balance_matches_ledger(&id).unwrap());
}

#[test]
fn unknown_account_fails_the_whole_batch() {
    let h = harness();
    let id = register_funded(&h, "Asha", 100);

    let deltas = [
        LedgerDelta {
            account_id: id.clone(),
            amount: -10,
            reason: Reason::Transfer,
            correlation_id: None,
        },
        LedgerDelta {
            account_id: "usr-ghost".into(),
            amount: 10,
            reason: Reason::Transfer,
            correlation_id: None,
        },
    ];
    let err = h.core.ledger().apply_deltas(&deltas).unwrap_err();
    assert!(matches!(err, CoreError::AccountNotFound(_)));
    // The valid half must not have landed.
    assert_eq!(h.core.ledger().balance(&id).unwrap(), 100);
}

#[test]
fn tier_recomputes_on_every_mutation() {
    let h = harness();
    let id = register(&h.core, "Asha");

    fund(&h, &id, 999);
    assert_eq!(h.core.account(&id).unwrap().tier, Tier::Silver);

    fund(&h, &id, 1);
    assert_eq!(h.core.account(&id).unwrap().tier, Tier::Gold);

    fund(&h, &id, 4000);
    let account = h.core.account(&id).unwrap();
    assert_eq!(account.balance, 5000);
    assert_eq!(account.tier, Tier::Platinum);

    // Falling back below a threshold demotes.
    h.core
        .ledger()
        .apply_delta(&id, -4500, Reason::Redemption, None)
        .unwrap();
    assert_eq!(h.core.account(&id).unwrap().tier, Tier::Silver);
}

#[test]
fn entries_record_reason_and_tier_at_time() {
    let h = harness();
    let id = register(&h.core, "Asha");
    fund(&h, &id, 1500);

    let entries = h.core.ledger().entries(&id).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, 1500);
    assert_eq!(entries[0].reason, Reason::Activation);
    assert_eq!(entries[0].tier_at_time, Tier::Gold);
}

#[test]
fn correlation_id_links_related_entries() {
    let h = harness();
    let a = register_funded(&h, "Asha", 300);
    let b = register(&h.core, "Ravi");

    let receipt = h.core.transfer(&a, &b, 120).unwrap();
    let linked = h
        .core
        .store()
        .entries_with_correlation(&receipt.correlation_id)
        .unwrap();
    assert_eq!(linked.len(), 2);
    assert_eq!(linked.iter().map(|e| e.amount).sum::<i64>(), 0);
}

#[test]
fn prune_drops_old_entries_but_keeps_balance() {
    let h = harness();
    let id = register_funded(&h, "Asha", 500);

    h.clock.advance(chrono::Duration::days(120));
    fund(&h, &id, 100);

    let cutoff = common::epoch() + chrono::Duration::days(90);
    let pruned = h.core.ledger().prune_entries_before(cutoff).unwrap();
    assert_eq!(pruned, 1);

    // Balance is authoritative; only the audit trail shrank.
    assert_eq!(h.core.ledger().balance(&id).unwrap(), 600);
    assert_eq!(h.core.ledger().entries(&id).unwrap().len(), 1);
    assert!(!h.core.ledger().balance_matches_ledger(&id).unwrap());
}
