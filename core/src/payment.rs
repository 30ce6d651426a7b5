//! Payment-order verification and service activation.
//!
//! The client pays a gateway order out of band and posts back
//! `(order_id, payment_id, signature)`. The signature is an HMAC-SHA256
//! of `"{order_id}|{payment_id}"` keyed with the shared webhook secret;
//! anything that does not verify is rejected before any state changes.

use crate::clock::Clock;
use crate::config::PaymentConfig;
use crate::error::{CoreError, CoreResult};
use crate::gateway::{OrderReceipt, PayoutGateway};
use crate::ledger::Ledger;
use crate::notify::{self, NoticeTemplate, Notifier};
use crate::referral::ReferralEngine;
use crate::store::Store;
use crate::types::{Coins, Reason, TxnKind, TxnStatus};
use crate::withdrawal::TxnRecord;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// What a verified payment bought the account.
#[derive(Debug, Clone)]
pub struct ActivationReceipt {
    pub payment_id: String,
    pub coins_credited: Coins,
}

pub struct PaymentDesk {
    store: Store,
    ledger: Ledger,
    referrals: ReferralEngine,
    config: PaymentConfig,
    gateway: Arc<dyn PayoutGateway>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl PaymentDesk {
    pub fn new(
        store: Store,
        ledger: Ledger,
        referrals: ReferralEngine,
        config: PaymentConfig,
        gateway: Arc<dyn PayoutGateway>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            ledger,
            referrals,
            config,
            gateway,
            notifier,
            clock,
        }
    }

    /// Open a gateway order for `amount_minor` minor units. The client
    /// completes payment against it and posts the result back through
    /// `verify_and_activate`.
    pub fn create_order(&self, amount_minor: i64) -> CoreResult<OrderReceipt> {
        if amount_minor <= 0 {
            return Err(CoreError::Validation(
                "order amount must be positive".into(),
            ));
        }
        Ok(self.gateway.create_order(amount_minor)?)
    }

    /// Verify the gateway's payment signature, then activate the account
    /// and credit the purchased coins. Replays with the same payment id
    /// are rejected so a retried callback cannot double-credit.
    pub fn verify_and_activate(
        &self,
        account_id: &str,
        order_id: &str,
        payment_id: &str,
        signature_hex: &str,
        claimed_amount_minor: i64,
    ) -> CoreResult<ActivationReceipt> {
        self.verify_signature(order_id, payment_id, signature_hex)?;

        let account = self.store.require_account(account_id)?;
        // The signature does not bind the account, so the payment-id
        // dedup must be global — a captured triple replayed against a
        // second account would otherwise credit twice.
        if self.store.any_credit_with_correlation(payment_id)? {
            return Err(CoreError::AlreadyProcessed(payment_id.to_string()));
        }
        if claimed_amount_minor <= 0 {
            return Err(CoreError::Validation(
                "payment amount must be positive".into(),
            ));
        }

        let coins = claimed_amount_minor / self.config.coin_divisor;
        self.ledger
            .apply_delta(account_id, coins, Reason::Activation, Some(payment_id))?;
        self.store.set_service_activated(account_id)?;

        self.store.insert_txn_record(&TxnRecord {
            txn_id: format!("txn-{}", Uuid::new_v4()),
            withdrawal_id: None,
            account_id: account_id.to_string(),
            kind: TxnKind::Payment,
            status: TxnStatus::Success,
            amount: coins,
            currency: "INR".to_string(),
            gateway_response: json!({
                "order_id": order_id,
                "payment_id": payment_id,
                "amount_minor": claimed_amount_minor,
            }),
            payout_id: None,
            error_message: None,
            created_at: self.clock.now(),
        })?;

        // First verified payment completes a pending referral; a failure
        // here must not unwind the payment itself.
        if let Err(e) = self.referrals.complete_on_activation(account_id) {
            log::warn!("referral completion failed for {account_id}: {e}");
        }

        log::info!(
            "payment verified account={account_id} payment={payment_id} coins={coins}"
        );
        notify::dispatch(
            self.notifier.as_ref(),
            &account.account_id,
            NoticeTemplate::PaymentConfirmed,
            &json!({ "payment_id": payment_id, "coins": coins }),
        );
        Ok(ActivationReceipt {
            payment_id: payment_id.to_string(),
            coins_credited: coins,
        })
    }

    /// Constant-time signature check. Malformed hex and wrong-length
    /// digests fail the same way a wrong signature does.
    fn verify_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature_hex: &str,
    ) -> CoreResult<()> {
        let provided = hex::decode(signature_hex).map_err(|_| CoreError::SignatureInvalid)?;

        let mut mac = HmacSha256::new_from_slice(self.config.webhook_secret.as_bytes())
            .map_err(|_| CoreError::SignatureInvalid)?;
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        let expected = mac.finalize().into_bytes();

        if provided.len() != expected.len() {
            return Err(CoreError::SignatureInvalid);
        }
        if expected.ct_eq(provided.as_slice()).into() {
            Ok(())
        } else {
            Err(CoreError::SignatureInvalid)
        }
    }
}

/// Compute the hex signature the gateway would send for an order/payment
/// pair. Exposed for callers that drive test or sandbox flows.
pub fn sign_payment(secret: &str, order_id: &str, payment_id: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("hmac accepts any key length");
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
