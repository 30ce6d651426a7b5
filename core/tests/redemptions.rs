//! Service catalog redemption.

mod common;

use common::{harness, register_funded};
use chrono::Utc;
use loyalty_core::error::CoreError;
use loyalty_core::redemption::ServiceItem;
use loyalty_core::types::Reason;

#[test]
fn redeeming_debits_the_service_cost() {
    let h = harness();
    let id = register_funded(&h, "Asha", 300);
    let service = h.core.add_service("Resume review", 150).unwrap();

    let entry = h.core.redeem_service(&id, &service.service_id).unwrap();
    assert_eq!(entry.amount, -150);
    assert_eq!(entry.reason, Reason::Redemption);
    assert_eq!(entry.correlation_id.as_deref(), Some(service.service_id.as_str()));
    assert_eq!(h.core.account(&id).unwrap().balance, 150);
}

#[test]
fn unknown_or_inactive_service_is_rejected() {
    let h = harness();
    let id = register_funded(&h, "Asha", 300);

    assert!(matches!(
        h.core.redeem_service(&id, "svc-ghost").unwrap_err(),
        CoreError::Validation(_)
    ));

    let retired = ServiceItem {
        service_id: "svc-retired".into(),
        name: "Retired perk".into(),
        coin_cost: 50,
        active: false,
        created_at: Utc::now(),
    };
    h.core.store().insert_service(&retired).unwrap();
    assert!(matches!(
        h.core.redeem_service(&id, "svc-retired").unwrap_err(),
        CoreError::Validation(_)
    ));
    assert_eq!(h.core.account(&id).unwrap().balance, 300);
}

#[test]
fn insufficient_balance_blocks_redemption() {
    let h = harness();
    let id = register_funded(&h, "Asha", 100);
    let service = h.core.add_service("Premium badge", 150).unwrap();

    let err = h.core.redeem_service(&id, &service.service_id).unwrap_err();
    assert!(matches!(err, CoreError::InsufficientBalance { .. }));
    assert_eq!(h.core.account(&id).unwrap().balance, 100);
}

#[test]
fn listing_shows_only_active_services() {
    let h = harness();
    h.core.add_service("Resume review", 150).unwrap();
    let retired = ServiceItem {
        service_id: "svc-retired".into(),
        name: "Retired perk".into(),
        coin_cost: 50,
        active: false,
        created_at: Utc::now(),
    };
    h.core.store().insert_service(&retired).unwrap();

    let listed = h.core.services().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Resume review");
}

#[test]
fn catalog_rejects_bad_definitions() {
    let h = harness();
    assert!(matches!(
        h.core.add_service("  ", 100).unwrap_err(),
        CoreError::Validation(_)
    ));
    assert!(matches!(
        h.core.add_service("Free perk", 0).unwrap_err(),
        CoreError::Validation(_)
    ));
}
