//! Withdrawal / payout settlement — the highest-risk flow in the core.
//!
//! Funds are debited (reserved) at request time. Settlement approves the
//! PENDING row behind an atomic state gate, calls the gateway exactly once
//! with the withdrawal id as idempotency key, and reconciles: SUCCESS
//! stores the payout id, FAILED refunds the full amount. The gateway call
//! runs with no store lock or open transaction held.
//!
//! Crash recovery: a row stuck APPROVED is resolved by `reconcile`, which
//! asks the gateway whether the payout actually happened before deciding
//! between finalize-without-refund and fail-with-refund.

use crate::accounts::BankDetails;
use crate::clock::Clock;
use crate::config::WithdrawalConfig;
use crate::error::{CoreError, CoreResult};
use crate::gateway::{GatewayError, PayoutGateway, PayoutReceipt, PayoutRequest};
use crate::ledger::Ledger;
use crate::notify::{self, NoticeTemplate, Notifier};
use crate::store::Store;
use crate::types::{Coins, Reason, TxnKind, TxnStatus, WithdrawalStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Minor units per coin at the gateway (1 coin = 1 rupee = 100 paise).
const MINOR_UNITS_PER_COIN: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdrawal {
    pub withdrawal_id: String,
    pub account_id: String,
    pub amount: Coins,
    pub status: WithdrawalStatus,
    /// Bank details frozen at request time; later edits to the account
    /// must not redirect an in-flight payout.
    pub bank_details: BankDetails,
    pub payout_id: Option<String>,
    pub notes: Option<String>,
    /// Set when the gateway timed out mid-settlement: the refund has been
    /// issued, but an operator should confirm the payout never landed.
    pub needs_review: bool,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// Immutable record of one settlement attempt against the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxnRecord {
    pub txn_id: String,
    pub withdrawal_id: Option<String>,
    pub account_id: String,
    pub kind: TxnKind,
    pub status: TxnStatus,
    pub amount: Coins,
    pub currency: String,
    pub gateway_response: serde_json::Value,
    pub payout_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    Succeeded,
    Failed,
}

pub struct WithdrawalDesk {
    store: Store,
    ledger: Ledger,
    config: WithdrawalConfig,
    gateway: Arc<dyn PayoutGateway>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl WithdrawalDesk {
    pub fn new(
        store: Store,
        ledger: Ledger,
        config: WithdrawalConfig,
        gateway: Arc<dyn PayoutGateway>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            ledger,
            config,
            gateway,
            notifier,
            clock,
        }
    }

    /// Reserve funds and open a PENDING withdrawal. The debit happens
    /// first — a request that cannot be funded never creates a row.
    pub fn request(&self, account_id: &str, amount: Coins) -> CoreResult<Withdrawal> {
        if amount < self.config.min_amount {
            return Err(CoreError::Validation(format!(
                "minimum withdrawal amount is {} coins",
                self.config.min_amount
            )));
        }
        let account = self.store.require_account(account_id)?;
        let Some(bank_details) = account.bank_details else {
            return Err(CoreError::Validation(
                "bank details required for withdrawal".into(),
            ));
        };

        let withdrawal_id = format!("wdr-{}", Uuid::new_v4());
        self.ledger.apply_delta(
            account_id,
            -amount,
            Reason::Redemption,
            Some(&withdrawal_id),
        )?;

        let withdrawal = Withdrawal {
            withdrawal_id,
            account_id: account_id.to_string(),
            amount,
            status: WithdrawalStatus::Pending,
            bank_details,
            payout_id: None,
            notes: None,
            needs_review: false,
            created_at: self.clock.now(),
            settled_at: None,
        };
        self.store.insert_withdrawal(&withdrawal)?;
        log::info!(
            "withdrawal requested id={} account={account_id} amount={amount}",
            withdrawal.withdrawal_id
        );
        Ok(withdrawal)
    }

    /// Approve and settle. At-most-once toward the gateway: the
    /// PENDING → APPROVED gate admits exactly one caller per withdrawal,
    /// so a concurrent duplicate approval gets `AlreadyProcessed` without
    /// ever reaching the gateway. Always resolves to a terminal state.
    pub fn approve_and_settle(&self, withdrawal_id: &str) -> CoreResult<SettlementOutcome> {
        let withdrawal = self.store.require_withdrawal(withdrawal_id)?;
        if !self.store.transition_withdrawal(
            withdrawal_id,
            WithdrawalStatus::Pending,
            WithdrawalStatus::Approved,
        )? {
            return Err(CoreError::AlreadyProcessed(withdrawal_id.to_string()));
        }

        let request = PayoutRequest {
            reference_id: withdrawal.withdrawal_id.clone(),
            amount_minor: withdrawal.amount * MINOR_UNITS_PER_COIN,
            currency: self.config.currency.clone(),
            bank: withdrawal.bank_details.clone(),
            narration: "Reward withdrawal payout".to_string(),
        };

        // Slow call, no locks held.
        match self.gateway.create_payout(&request) {
            Ok(receipt) => self.finalize_success(&withdrawal, &receipt),
            Err(err) => self.finalize_failure(&withdrawal, &err),
        }
    }

    /// Recovery path for a withdrawal stuck after a crash mid-settlement.
    /// APPROVED rows are resolved against the gateway by idempotency key:
    /// a confirmed payout finalizes SUCCESS (no refund — the money left),
    /// anything else finalizes FAILED with the refund. FAILED rows replay
    /// the refund, which the dedup guard reduces to a no-op when it
    /// already landed. Idempotent; safe to run from a periodic sweeper.
    pub fn reconcile(&self, withdrawal_id: &str) -> CoreResult<SettlementOutcome> {
        let withdrawal = self.store.require_withdrawal(withdrawal_id)?;
        match withdrawal.status {
            WithdrawalStatus::Approved => {}
            WithdrawalStatus::Success => return Ok(SettlementOutcome::Succeeded),
            WithdrawalStatus::Failed => {
                // The terminal move commits before the refund credit, so a
                // crash in between leaves FAILED without its refund.
                self.refund_once(&withdrawal)?;
                return Ok(SettlementOutcome::Failed);
            }
            WithdrawalStatus::Pending => {
                return Err(CoreError::Validation(format!(
                    "withdrawal '{withdrawal_id}' has not been approved"
                )))
            }
        }

        match self.gateway.payout_status(&withdrawal.withdrawal_id)? {
            Some(receipt) => self.finalize_success(&withdrawal, &receipt),
            None => {
                log::warn!(
                    "reconcile: gateway has no payout for withdrawal {}, refunding",
                    withdrawal.withdrawal_id
                );
                self.finalize_failure(
                    &withdrawal,
                    &GatewayError::Declined("payout not found at gateway".into()),
                )
            }
        }
    }

    /// All APPROVED withdrawals older than `stuck_after` — the sweeper's
    /// work list for `reconcile`.
    pub fn stuck_approvals(&self, stuck_after: chrono::Duration) -> CoreResult<Vec<Withdrawal>> {
        let cutoff = self.clock.now() - stuck_after;
        Ok(self
            .store
            .withdrawals_with_status(WithdrawalStatus::Approved)?
            .into_iter()
            .filter(|w| w.created_at <= cutoff)
            .collect())
    }

    pub fn get(&self, withdrawal_id: &str) -> CoreResult<Withdrawal> {
        self.store.require_withdrawal(withdrawal_id)
    }

    pub fn for_account(&self, account_id: &str) -> CoreResult<Vec<Withdrawal>> {
        self.store.withdrawals_for_account(account_id)
    }

    pub fn settlement_trail(&self, withdrawal_id: &str) -> CoreResult<Vec<TxnRecord>> {
        self.store.txns_for_withdrawal(withdrawal_id)
    }

    // ── Terminal moves ────────────────────────────────────────────

    fn finalize_success(
        &self,
        withdrawal: &Withdrawal,
        receipt: &PayoutReceipt,
    ) -> CoreResult<SettlementOutcome> {
        let now = self.clock.now();
        if !self.store.settle_withdrawal_success(
            &withdrawal.withdrawal_id,
            &receipt.payout_id,
            now,
        )? {
            // Another worker finalized first; our gateway view still wins
            // nothing — leave their terminal state alone.
            return Err(CoreError::AlreadyProcessed(
                withdrawal.withdrawal_id.clone(),
            ));
        }

        self.store.insert_txn_record(&TxnRecord {
            txn_id: format!("txn-{}", Uuid::new_v4()),
            withdrawal_id: Some(withdrawal.withdrawal_id.clone()),
            account_id: withdrawal.account_id.clone(),
            kind: TxnKind::Payout,
            status: TxnStatus::Success,
            amount: withdrawal.amount,
            currency: self.config.currency.clone(),
            gateway_response: receipt.raw_response.clone(),
            payout_id: Some(receipt.payout_id.clone()),
            error_message: None,
            created_at: now,
        })?;

        log::info!(
            "withdrawal settled id={} payout={} amount={}",
            withdrawal.withdrawal_id,
            receipt.payout_id,
            withdrawal.amount
        );
        notify::dispatch(
            self.notifier.as_ref(),
            &withdrawal.account_id,
            NoticeTemplate::WithdrawalSuccess,
            &json!({
                "withdrawal_id": withdrawal.withdrawal_id,
                "amount": withdrawal.amount,
                "payout_id": receipt.payout_id,
            }),
        );
        Ok(SettlementOutcome::Succeeded)
    }

    fn finalize_failure(
        &self,
        withdrawal: &Withdrawal,
        err: &GatewayError,
    ) -> CoreResult<SettlementOutcome> {
        let now = self.clock.now();
        let needs_review = matches!(err, GatewayError::Timeout);
        if !self.store.settle_withdrawal_failed(
            &withdrawal.withdrawal_id,
            &err.to_string(),
            needs_review,
            now,
        )? {
            return Err(CoreError::AlreadyProcessed(
                withdrawal.withdrawal_id.clone(),
            ));
        }

        self.refund_once(withdrawal)?;

        self.store.insert_txn_record(&TxnRecord {
            txn_id: format!("txn-{}", Uuid::new_v4()),
            withdrawal_id: Some(withdrawal.withdrawal_id.clone()),
            account_id: withdrawal.account_id.clone(),
            kind: TxnKind::Payout,
            status: TxnStatus::Failed,
            amount: withdrawal.amount,
            currency: self.config.currency.clone(),
            gateway_response: json!({ "error": err.to_string() }),
            payout_id: None,
            error_message: Some(err.to_string()),
            created_at: now,
        })?;

        log::warn!(
            "withdrawal failed id={} amount={} needs_review={needs_review}: {err}",
            withdrawal.withdrawal_id,
            withdrawal.amount
        );
        notify::dispatch(
            self.notifier.as_ref(),
            &withdrawal.account_id,
            NoticeTemplate::WithdrawalFailed,
            &json!({
                "withdrawal_id": withdrawal.withdrawal_id,
                "amount": withdrawal.amount,
                "reason": err.to_string(),
            }),
        );
        Ok(SettlementOutcome::Failed)
    }

    /// Credit the reserved amount back, exactly once. The withdrawal id
    /// doubles as the refund's correlation id, so a replayed failure path
    /// (retry after crash) detects the earlier credit and skips.
    fn refund_once(&self, withdrawal: &Withdrawal) -> CoreResult<()> {
        if self
            .store
            .has_credit_with_correlation(&withdrawal.account_id, &withdrawal.withdrawal_id)?
        {
            log::info!(
                "refund already applied for withdrawal {}, skipping",
                withdrawal.withdrawal_id
            );
            return Ok(());
        }
        self.ledger.apply_delta(
            &withdrawal.account_id,
            withdrawal.amount,
            Reason::Redemption,
            Some(&withdrawal.withdrawal_id),
        )?;
        Ok(())
    }
}
