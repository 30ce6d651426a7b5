//! Shared harness for the integration tests: a scripted gateway, a
//! recording notifier, a pinned clock, and a fully wired `LoyaltyCore`.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use loyalty_core::accounts::{BankDetails, NewAccount};
use loyalty_core::clock::FixedClock;
use loyalty_core::config::CoreConfig;
use loyalty_core::gateway::{
    GatewayError, OrderReceipt, PayoutGateway, PayoutReceipt, PayoutRequest,
};
use loyalty_core::notify::{NoticeTemplate, Notifier};
use loyalty_core::reward::FixedRewardPolicy;
use loyalty_core::rng::RewardRng;
use loyalty_core::store::Store;
use loyalty_core::LoyaltyCore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub const TEST_SECRET: &str = "test-webhook-secret";

/// What the scripted gateway should do with the next payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    Succeed,
    Decline,
    Timeout,
}

/// Gateway double: scripted verdicts, call counting, and a payout map so
/// the reconcile path can be exercised.
pub struct ScriptedGateway {
    mode: Mutex<GatewayMode>,
    counter: AtomicU64,
    payouts: Mutex<HashMap<String, PayoutReceipt>>,
    pub payout_calls: AtomicU64,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            mode: Mutex::new(GatewayMode::Succeed),
            counter: AtomicU64::new(1),
            payouts: Mutex::new(HashMap::new()),
            payout_calls: AtomicU64::new(0),
        }
    }

    pub fn set_mode(&self, mode: GatewayMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Plant a receipt as if the payout had gone through before a crash,
    /// without routing it through create_payout.
    pub fn plant_payout(&self, reference_id: &str) -> PayoutReceipt {
        let receipt = PayoutReceipt {
            payout_id: format!("pout_{:06}", self.counter.fetch_add(1, Ordering::SeqCst)),
            reference_id: reference_id.to_string(),
            raw_response: serde_json::json!({ "status": "processed" }),
        };
        self.payouts
            .lock()
            .unwrap()
            .insert(reference_id.to_string(), receipt.clone());
        receipt
    }
}

impl PayoutGateway for ScriptedGateway {
    fn create_payout(&self, req: &PayoutRequest) -> Result<PayoutReceipt, GatewayError> {
        self.payout_calls.fetch_add(1, Ordering::SeqCst);
        match *self.mode.lock().unwrap() {
            GatewayMode::Succeed => Ok(self.plant_payout(&req.reference_id)),
            GatewayMode::Decline => Err(GatewayError::Declined("insufficient funds".into())),
            GatewayMode::Timeout => Err(GatewayError::Timeout),
        }
    }

    fn payout_status(&self, reference_id: &str) -> Result<Option<PayoutReceipt>, GatewayError> {
        Ok(self.payouts.lock().unwrap().get(reference_id).cloned())
    }

    fn create_order(&self, amount_minor: i64) -> Result<OrderReceipt, GatewayError> {
        Ok(OrderReceipt {
            order_id: format!("order_{:06}", self.counter.fetch_add(1, Ordering::SeqCst)),
            amount_minor,
        })
    }
}

/// Notifier double that records every notice it is handed.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, NoticeTemplate)>>,
}

impl Notifier for RecordingNotifier {
    fn notify(
        &self,
        account_id: &str,
        template: NoticeTemplate,
        _context: &serde_json::Value,
    ) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((account_id.to_string(), template));
        Ok(())
    }
}

pub struct Harness {
    pub core: LoyaltyCore,
    pub gateway: Arc<ScriptedGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<FixedClock>,
}

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
}

/// In-memory core with a pinned clock, deterministic rng, a fixed
/// 3-coin login reward, and the default config (secret overridden).
pub fn harness() -> Harness {
    let store = Store::in_memory().unwrap();
    store.migrate().unwrap();

    let mut config = CoreConfig::default();
    config.payment.webhook_secret = TEST_SECRET.to_string();

    let gateway = Arc::new(ScriptedGateway::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let clock = Arc::new(FixedClock::at(epoch()));

    let mut seed = 0u64;
    let core = LoyaltyCore::with_parts(
        store,
        config,
        gateway.clone(),
        Arc::new(FixedRewardPolicy(3)),
        notifier.clone(),
        clock.clone(),
        move || {
            seed += 1;
            RewardRng::seeded(seed)
        },
    );

    Harness {
        core,
        gateway,
        notifier,
        clock,
    }
}

pub fn register(core: &LoyaltyCore, name: &str) -> String {
    core.register(NewAccount {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        referral_code: None,
    })
    .unwrap()
    .account_id
}

/// Register an account and credit it some coins through a verified
/// payment so ledger invariants hold for the seeded balance.
pub fn register_funded(h: &Harness, name: &str, coins: i64) -> String {
    let account_id = register(&h.core, name);
    fund(h, &account_id, coins);
    account_id
}

pub fn fund(h: &Harness, account_id: &str, coins: i64) {
    let amount_minor = coins * 10;
    let order = h.core.create_order(amount_minor).unwrap();
    // Every funding payment is a distinct gateway payment.
    let payment_id = format!("pay_fund_{}", uuid::Uuid::new_v4());
    let signature = loyalty_core::payment::sign_payment(TEST_SECRET, &order.order_id, &payment_id);
    h.core
        .verify_payment(account_id, &order.order_id, &payment_id, &signature, amount_minor)
        .unwrap();
}

pub fn test_bank_details() -> BankDetails {
    BankDetails {
        account_holder_name: "Test Holder".into(),
        account_number: "1234567890".into(),
        ifsc: "HDFC0000123".into(),
        bank_name: "HDFC".into(),
        upi_id: None,
    }
}
