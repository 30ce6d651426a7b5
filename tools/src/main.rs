//! loyalty-runner: headless exerciser for the loyalty core.
//!
//! Drives one full customer journey against a sandbox gateway — signup
//! with a referral code, daily login rewards, payment verification and
//! activation, a peer transfer, a service redemption, and a withdrawal
//! settlement — then prints a summary.
//!
//! Usage:
//!   loyalty-runner --db run.db --secret sandbox-secret

use anyhow::Result;
use loyalty_core::accounts::{BankDetails, NewAccount};
use loyalty_core::config::CoreConfig;
use loyalty_core::gateway::{
    GatewayError, OrderReceipt, PayoutGateway, PayoutReceipt, PayoutRequest,
};
use loyalty_core::payment::sign_payment;
use loyalty_core::store::Store;
use loyalty_core::LoyaltyCore;
use std::collections::HashMap;
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// In-process stand-in for the payout/payment gateway. Every call
/// succeeds; payouts are remembered by reference id so the reconcile
/// path can be exercised.
struct SandboxGateway {
    counter: AtomicU64,
    payouts: Mutex<HashMap<String, PayoutReceipt>>,
}

impl SandboxGateway {
    fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
            payouts: Mutex::new(HashMap::new()),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}_{:06}", self.counter.fetch_add(1, Ordering::SeqCst))
    }
}

impl PayoutGateway for SandboxGateway {
    fn create_payout(&self, req: &PayoutRequest) -> Result<PayoutReceipt, GatewayError> {
        let receipt = PayoutReceipt {
            payout_id: self.next_id("pout"),
            reference_id: req.reference_id.clone(),
            raw_response: serde_json::json!({
                "status": "processed",
                "amount": req.amount_minor,
                "currency": req.currency,
            }),
        };
        self.payouts
            .lock()
            .expect("sandbox payout map poisoned")
            .insert(req.reference_id.clone(), receipt.clone());
        Ok(receipt)
    }

    fn payout_status(&self, reference_id: &str) -> Result<Option<PayoutReceipt>, GatewayError> {
        Ok(self
            .payouts
            .lock()
            .expect("sandbox payout map poisoned")
            .get(reference_id)
            .cloned())
    }

    fn create_order(&self, amount_minor: i64) -> Result<OrderReceipt, GatewayError> {
        Ok(OrderReceipt {
            order_id: self.next_id("order"),
            amount_minor,
        })
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = arg_value(&args, "--db").unwrap_or_else(|| ":memory:".to_string());
    let secret = arg_value(&args, "--secret").unwrap_or_else(|| "sandbox-secret".to_string());

    let store = if db == ":memory:" {
        Store::in_memory()?
    } else {
        Store::open(&db)?
    };
    store.migrate()?;
    log::info!("schema ready, driving sandbox journey against {db}");

    let mut config = CoreConfig::default();
    config.payment.webhook_secret = secret.clone();

    let gateway = Arc::new(SandboxGateway::new());
    let core = LoyaltyCore::new(store, config, gateway);

    println!("loyalty-runner — sandbox journey (db: {db})");
    println!();

    // Referrer signs up, gets a code, and earns a login reward.
    let asha = core.register(NewAccount {
        name: "Asha".into(),
        email: "asha@example.com".into(),
        referral_code: None,
    })?;
    let code = core.referral_code(&asha.account_id)?;
    let login = core.record_login(&asha.account_id)?;
    println!("registered {} (code {code}, login reward {})", asha.name, login.reward_earned);

    // Referred friend signs up with the code and activates via payment.
    let ravi = core.register(NewAccount {
        name: "Ravi".into(),
        email: "ravi@example.com".into(),
        referral_code: Some(code.clone()),
    })?;
    let order = core.create_order(5000)?;
    let payment_id = "pay_sandbox_000001";
    let signature = sign_payment(&secret, &order.order_id, payment_id);
    let activation = core.verify_payment(
        &ravi.account_id,
        &order.order_id,
        payment_id,
        &signature,
        order.amount_minor,
    )?;
    println!(
        "payment verified for {}: {} coins credited, referral bonus paid to {}",
        ravi.name, activation.coins_credited, asha.name
    );

    // Peer transfer and a catalog redemption.
    core.transfer(&ravi.account_id, &asha.account_id, 100)?;
    let service = core.add_service("Resume review", 150)?;
    core.redeem_service(&ravi.account_id, &service.service_id)?;

    // Withdrawal: needs bank details, then request + settle.
    core.set_bank_details(
        &ravi.account_id,
        BankDetails {
            account_holder_name: "Ravi".into(),
            account_number: "000111222333".into(),
            ifsc: "SBIN0001234".into(),
            bank_name: "SBI".into(),
            upi_id: None,
        },
    )?;
    // Top up so the minimum withdrawal clears.
    let order2 = core.create_order(10_000)?;
    let payment2 = "pay_sandbox_000002";
    let sig2 = sign_payment(&secret, &order2.order_id, payment2);
    core.verify_payment(&ravi.account_id, &order2.order_id, payment2, &sig2, order2.amount_minor)?;

    let withdrawal = core.request_withdrawal(&ravi.account_id, 500)?;
    let outcome = core.settle_withdrawal(&withdrawal.withdrawal_id)?;
    println!("withdrawal {} settled: {outcome:?}", withdrawal.withdrawal_id);

    println!();
    println!("=== SUMMARY ===");
    for account in core.leaderboard(10)? {
        let consistent = core.ledger().balance_matches_ledger(&account.account_id)?;
        println!(
            "  {:<6} balance={:<5} tier={:<8} ledger_consistent={consistent}",
            account.name, account.balance, account.tier
        );
    }
    Ok(())
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].clone())
}
