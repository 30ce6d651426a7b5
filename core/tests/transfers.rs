//! Peer transfer atomicity: two entries or none.

mod common;

use common::{harness, register, register_funded};
use loyalty_core::error::CoreError;
use loyalty_core::types::Reason;

#[test]
fn transfer_moves_coins_and_pairs_the_entries() {
    let h = harness();
    let a = register_funded(&h, "Asha", 500);
    let b = register(&h.core, "Ravi");

    let receipt = h.core.transfer(&a, &b, 200).unwrap();

    assert_eq!(h.core.account(&a).unwrap().balance, 300);
    assert_eq!(h.core.account(&b).unwrap().balance, 200);
    assert_eq!(receipt.debit.amount, -200);
    assert_eq!(receipt.credit.amount, 200);
    assert_eq!(receipt.debit.reason, Reason::Transfer);
    assert_eq!(
        receipt.debit.correlation_id.as_deref(),
        Some(receipt.correlation_id.as_str())
    );
    assert_eq!(receipt.debit.correlation_id, receipt.credit.correlation_id);
}

#[test]
fn insufficient_balance_leaves_both_sides_untouched() {
    let h = harness();
    let a = register_funded(&h, "Asha", 100);
    let b = register(&h.core, "Ravi");

    let err = h.core.transfer(&a, &b, 150).unwrap_err();
    assert!(matches!(err, CoreError::InsufficientBalance { .. }));
    assert_eq!(h.core.account(&a).unwrap().balance, 100);
    assert_eq!(h.core.account(&b).unwrap().balance, 0);
}

#[test]
fn unknown_recipient_fails_before_the_debit() {
    let h = harness();
    let a = register_funded(&h, "Asha", 100);

    let err = h.core.transfer(&a, "usr-ghost", 50).unwrap_err();
    assert!(matches!(err, CoreError::AccountNotFound(_)));
    assert_eq!(h.core.account(&a).unwrap().balance, 100);
    assert_eq!(h.core.ledger().entries(&a).unwrap().len(), 1); // just the funding credit
}

#[test]
fn self_transfer_and_non_positive_amounts_are_rejected() {
    let h = harness();
    let a = register_funded(&h, "Asha", 100);
    let b = register(&h.core, "Ravi");

    assert!(matches!(
        h.core.transfer(&a, &a, 10).unwrap_err(),
        CoreError::Validation(_)
    ));
    assert!(matches!(
        h.core.transfer(&a, &b, 0).unwrap_err(),
        CoreError::Validation(_)
    ));
    assert!(matches!(
        h.core.transfer(&a, &b, -5).unwrap_err(),
        CoreError::Validation(_)
    ));
    assert_eq!(h.core.account(&a).unwrap().balance, 100);
}

#[test]
fn transfer_can_change_both_tiers() {
    let h = harness();
    let a = register_funded(&h, "Asha", 1200);
    let b = register(&h.core, "Ravi");

    h.core.transfer(&a, &b, 1100).unwrap();
    assert_eq!(h.core.account(&a).unwrap().tier, loyalty_core::types::Tier::Silver);
    assert_eq!(h.core.account(&b).unwrap().tier, loyalty_core::types::Tier::Gold);
}
