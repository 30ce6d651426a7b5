//! Top-level wiring: one `LoyaltyCore` owns the store plus every desk and
//! delegates the inbound operations. Collaborator processes (auth, admin,
//! HTTP surface) construct this once and call through it.

use crate::accounts::{Account, AccountDirectory, BankDetails, LoginOutcome, NewAccount};
use crate::clock::{Clock, SystemClock};
use crate::config::CoreConfig;
use crate::error::CoreResult;
use crate::gateway::{OrderReceipt, PayoutGateway};
use crate::ledger::{Ledger, LedgerEntry};
use crate::notify::{LogNotifier, Notifier};
use crate::payment::{ActivationReceipt, PaymentDesk};
use crate::redemption::{RedemptionDesk, ServiceItem};
use crate::referral::{ReferralEngine, ReferralStats};
use crate::reward::{RewardPolicy, UniformRangePolicy};
use crate::rng::RewardRng;
use crate::store::Store;
use crate::transfer::{TransferDesk, TransferReceipt};
use crate::types::Coins;
use crate::withdrawal::{SettlementOutcome, TxnRecord, Withdrawal, WithdrawalDesk};
use std::sync::Arc;

pub struct LoyaltyCore {
    store: Store,
    ledger: Ledger,
    accounts: AccountDirectory,
    referrals: ReferralEngine,
    transfers: TransferDesk,
    withdrawals: WithdrawalDesk,
    payments: PaymentDesk,
    redemptions: RedemptionDesk,
}

impl LoyaltyCore {
    /// Production wiring: system clock, entropy-seeded rng, log-only
    /// notifier, uniform login-reward policy.
    pub fn new(store: Store, config: CoreConfig, gateway: Arc<dyn PayoutGateway>) -> Self {
        let policy = Arc::new(UniformRangePolicy::new(
            &config.reward,
            RewardRng::from_entropy(),
        ));
        Self::with_parts(
            store,
            config,
            gateway,
            policy,
            Arc::new(LogNotifier),
            Arc::new(SystemClock),
            RewardRng::from_entropy,
        )
    }

    /// Full dependency injection, used by tests to pin the clock, rng,
    /// reward policy, gateway, and notifier.
    pub fn with_parts(
        store: Store,
        config: CoreConfig,
        gateway: Arc<dyn PayoutGateway>,
        policy: Arc<dyn RewardPolicy>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        mut rng_source: impl FnMut() -> RewardRng,
    ) -> Self {
        let ledger = Ledger::new(store.clone(), clock.clone());
        let referrals = ReferralEngine::new(
            store.clone(),
            ledger.clone(),
            config.referral.clone(),
            rng_source(),
            clock.clone(),
        );
        let accounts = AccountDirectory::new(
            store.clone(),
            ledger.clone(),
            ReferralEngine::new(
                store.clone(),
                ledger.clone(),
                config.referral.clone(),
                rng_source(),
                clock.clone(),
            ),
            policy,
            notifier.clone(),
            clock.clone(),
        );
        let transfers = TransferDesk::new(store.clone(), ledger.clone());
        let withdrawals = WithdrawalDesk::new(
            store.clone(),
            ledger.clone(),
            config.withdrawal.clone(),
            gateway.clone(),
            notifier.clone(),
            clock.clone(),
        );
        let payments = PaymentDesk::new(
            store.clone(),
            ledger.clone(),
            ReferralEngine::new(
                store.clone(),
                ledger.clone(),
                config.referral.clone(),
                rng_source(),
                clock.clone(),
            ),
            config.payment.clone(),
            gateway,
            notifier,
            clock.clone(),
        );
        let redemptions = RedemptionDesk::new(store.clone(), ledger.clone(), clock);
        Self {
            store,
            ledger,
            accounts,
            referrals,
            transfers,
            withdrawals,
            payments,
            redemptions,
        }
    }

    // ── Accounts ──────────────────────────────────────────────────

    pub fn register(&self, profile: NewAccount) -> CoreResult<Account> {
        self.accounts.register(profile)
    }

    pub fn record_login(&self, account_id: &str) -> CoreResult<LoginOutcome> {
        self.accounts.record_login(account_id)
    }

    pub fn account(&self, account_id: &str) -> CoreResult<Account> {
        self.accounts.get(account_id)
    }

    pub fn set_bank_details(&self, account_id: &str, details: BankDetails) -> CoreResult<()> {
        self.accounts.set_bank_details(account_id, details)
    }

    pub fn leaderboard(&self, limit: usize) -> CoreResult<Vec<Account>> {
        self.accounts.leaderboard(limit)
    }

    pub fn reward_history(&self, account_id: &str, limit: usize) -> CoreResult<Vec<LedgerEntry>> {
        self.accounts.reward_history(account_id, limit)
    }

    // ── Referrals ─────────────────────────────────────────────────

    pub fn referral_code(&self, account_id: &str) -> CoreResult<String> {
        self.referrals.generate_code(account_id)
    }

    pub fn referral_stats(&self, account_id: &str) -> CoreResult<ReferralStats> {
        self.referrals.stats_for(account_id)
    }

    // ── Transfers ─────────────────────────────────────────────────

    pub fn transfer(&self, from: &str, to: &str, amount: Coins) -> CoreResult<TransferReceipt> {
        self.transfers.transfer(from, to, amount)
    }

    // ── Withdrawals ───────────────────────────────────────────────

    pub fn request_withdrawal(&self, account_id: &str, amount: Coins) -> CoreResult<Withdrawal> {
        self.withdrawals.request(account_id, amount)
    }

    pub fn settle_withdrawal(&self, withdrawal_id: &str) -> CoreResult<SettlementOutcome> {
        self.withdrawals.approve_and_settle(withdrawal_id)
    }

    pub fn reconcile_withdrawal(&self, withdrawal_id: &str) -> CoreResult<SettlementOutcome> {
        self.withdrawals.reconcile(withdrawal_id)
    }

    pub fn withdrawals_for(&self, account_id: &str) -> CoreResult<Vec<Withdrawal>> {
        self.withdrawals.for_account(account_id)
    }

    pub fn settlement_trail(&self, withdrawal_id: &str) -> CoreResult<Vec<TxnRecord>> {
        self.withdrawals.settlement_trail(withdrawal_id)
    }

    // ── Payments ──────────────────────────────────────────────────

    pub fn create_order(&self, amount_minor: i64) -> CoreResult<OrderReceipt> {
        self.payments.create_order(amount_minor)
    }

    pub fn verify_payment(
        &self,
        account_id: &str,
        order_id: &str,
        payment_id: &str,
        signature_hex: &str,
        claimed_amount_minor: i64,
    ) -> CoreResult<ActivationReceipt> {
        self.payments.verify_and_activate(
            account_id,
            order_id,
            payment_id,
            signature_hex,
            claimed_amount_minor,
        )
    }

    // ── Redemptions ───────────────────────────────────────────────

    pub fn add_service(&self, name: &str, coin_cost: Coins) -> CoreResult<ServiceItem> {
        self.redemptions.add_service(name, coin_cost)
    }

    pub fn services(&self) -> CoreResult<Vec<ServiceItem>> {
        self.redemptions.list_services()
    }

    pub fn redeem_service(&self, account_id: &str, service_id: &str) -> CoreResult<LedgerEntry> {
        self.redemptions.redeem(account_id, service_id)
    }

    // ── Escape hatches ────────────────────────────────────────────

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn withdrawal_desk(&self) -> &WithdrawalDesk {
        &self.withdrawals
    }
}
