//! Referral codes, signup linking, and the exactly-once activation bonus.

mod common;

use common::{fund, harness, register, TEST_SECRET};
use loyalty_core::accounts::NewAccount;
use loyalty_core::payment::sign_payment;

fn register_with_code(h: &common::Harness, name: &str, code: &str) -> String {
    h.core
        .register(NewAccount {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            referral_code: Some(code.to_string()),
        })
        .unwrap()
        .account_id
}

#[test]
fn code_has_the_published_shape_and_is_stable() {
    let h = harness();
    let id = register(&h.core, "Asha");

    let code = h.core.referral_code(&id).unwrap();
    assert!(code.starts_with("REF"), "code: {code}");
    assert_eq!(code.len(), 9);
    assert!(code[3..]
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

    // Idempotent: asking again returns the same code.
    assert_eq!(h.core.referral_code(&id).unwrap(), code);
}

#[test]
fn codes_are_unique_across_accounts() {
    let h = harness();
    let a = h.core.referral_code(&register(&h.core, "Asha")).unwrap();
    let b = h.core.referral_code(&register(&h.core, "Ravi")).unwrap();
    assert_ne!(a, b);
}

#[test]
fn signup_with_unknown_code_succeeds_silently() {
    let h = harness();
    let id = register_with_code(&h, "Ravi", "REFNOSUCH");
    assert!(h.core.account(&id).unwrap().referred_by.is_none());
}

#[test]
fn signup_with_valid_code_links_the_accounts() {
    let h = harness();
    let referrer = register(&h.core, "Asha");
    let code = h.core.referral_code(&referrer).unwrap();

    let referred = register_with_code(&h, "Ravi", &code);
    assert_eq!(
        h.core.account(&referred).unwrap().referred_by.as_deref(),
        Some(referrer.as_str())
    );

    let stats = h.core.referral_stats(&referrer).unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.completed, 0);
    assert_eq!(stats.coins_earned, 0);
}

#[test]
fn bonus_is_paid_when_the_referred_account_activates() {
    let h = harness();
    let referrer = register(&h.core, "Asha");
    let code = h.core.referral_code(&referrer).unwrap();
    let referred = register_with_code(&h, "Ravi", &code);

    // Activation happens through a verified payment.
    fund(&h, &referred, 100);

    assert_eq!(h.core.account(&referrer).unwrap().balance, 50);
    let stats = h.core.referral_stats(&referrer).unwrap();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.coins_earned, 50);
}

#[test]
fn bonus_is_paid_exactly_once_across_repeat_activations() {
    let h = harness();
    let referrer = register(&h.core, "Asha");
    let code = h.core.referral_code(&referrer).unwrap();
    let referred = register_with_code(&h, "Ravi", &code);

    fund(&h, &referred, 100);
    fund(&h, &referred, 100); // second verified payment

    assert_eq!(h.core.account(&referrer).unwrap().balance, 50);
    assert_eq!(h.core.referral_stats(&referrer).unwrap().completed, 1);
}

#[test]
fn activating_the_referrer_pays_nothing() {
    let h = harness();
    let id = register(&h.core, "Asha");
    let _code = h.core.referral_code(&id).unwrap();

    // The referrer's own activation must not complete its own code.
    let order = h.core.create_order(1000).unwrap();
    let sig = sign_payment(TEST_SECRET, &order.order_id, "pay_self");
    h.core
        .verify_payment(&id, &order.order_id, "pay_self", &sig, 1000)
        .unwrap();

    assert_eq!(h.core.referral_stats(&id).unwrap().completed, 0);
    assert_eq!(h.core.account(&id).unwrap().balance, 100);
}

#[test]
fn code_is_single_use() {
    let h = harness();
    let referrer = register(&h.core, "Asha");
    let code = h.core.referral_code(&referrer).unwrap();

    let first = register_with_code(&h, "Ravi", &code);
    let second = register_with_code(&h, "Meena", &code);

    assert_eq!(
        h.core.account(&first).unwrap().referred_by.as_deref(),
        Some(referrer.as_str())
    );
    assert!(h.core.account(&second).unwrap().referred_by.is_none());
}
