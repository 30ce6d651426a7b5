//! Account directory: registration, login capture (with the at-most-once
//! daily reward), bank details, and read-side queries.

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::ledger::{Ledger, LedgerEntry};
use crate::notify::{self, NoticeTemplate, Notifier};
use crate::referral::ReferralEngine;
use crate::reward::RewardPolicy;
use crate::store::Store;
use crate::types::{Coins, Reason, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankDetails {
    pub account_holder_name: String,
    pub account_number: String,
    pub ifsc: String,
    pub bank_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upi_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub name: String,
    pub email: String,
    pub balance: Coins,
    pub tier: Tier,
    pub login_count: i64,
    pub last_login: Option<DateTime<Utc>>,
    pub referral_code: Option<String>,
    pub referred_by: Option<String>,
    pub bank_details: Option<BankDetails>,
    pub service_activated: bool,
    pub created_at: DateTime<Utc>,
}

/// Signup profile. Credentials/token mechanics live in the auth
/// collaborator; the core only owns the loyalty-relevant state.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    /// Referral code the signup arrived with, if any. Unknown codes are
    /// silently ignored.
    pub referral_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Coins credited for this login; 0 when already rewarded today or
    /// when the reward step failed.
    pub reward_earned: Coins,
    pub login_count: i64,
    pub tier: Tier,
}

pub struct AccountDirectory {
    store: Store,
    ledger: Ledger,
    referrals: ReferralEngine,
    policy: Arc<dyn RewardPolicy>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl AccountDirectory {
    pub fn new(
        store: Store,
        ledger: Ledger,
        referrals: ReferralEngine,
        policy: Arc<dyn RewardPolicy>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            ledger,
            referrals,
            policy,
            notifier,
            clock,
        }
    }

    pub fn register(&self, profile: NewAccount) -> CoreResult<Account> {
        if profile.name.trim().is_empty() || profile.email.trim().is_empty() {
            return Err(CoreError::Validation("name and email are required".into()));
        }
        let email = profile.email.trim().to_lowercase();
        if self.store.account_by_email(&email)?.is_some() {
            return Err(CoreError::Validation(format!(
                "email '{email}' is already registered"
            )));
        }

        let account = Account {
            account_id: format!("usr-{}", Uuid::new_v4()),
            name: profile.name.trim().to_string(),
            email,
            balance: 0,
            tier: Tier::Silver,
            login_count: 0,
            last_login: None,
            referral_code: None,
            referred_by: None,
            bank_details: None,
            service_activated: false,
            created_at: self.clock.now(),
        };
        self.store.insert_account(&account)?;

        // Best-effort side benefit: a bad code must not fail the signup.
        if let Some(code) = profile.referral_code.as_deref() {
            if let Err(e) = self.referrals.redeem_on_signup(code, &account.account_id) {
                log::warn!(
                    "referral redemption failed for {} code={code}: {e}",
                    account.account_id
                );
            }
        }

        notify::dispatch(
            self.notifier.as_ref(),
            &account.account_id,
            NoticeTemplate::Welcome,
            &serde_json::json!({ "name": account.name }),
        );
        Ok(account)
    }

    /// Capture a login. The count and timestamp always advance; the coin
    /// reward is granted at most once per UTC calendar day, and a reward
    /// failure is logged — never surfaced — because authentication already
    /// succeeded.
    pub fn record_login(&self, account_id: &str) -> CoreResult<LoginOutcome> {
        let account = self.store.require_account(account_id)?;
        let now = self.clock.now();

        // The store's conditional update is the day-boundary arbiter:
        // exactly one login per account wins a fresh calendar day, even
        // under concurrent same-day logins.
        let (login_count, day_rolled) = self.store.record_login(account_id, now)?;

        let mut reward_earned = 0;
        if day_rolled {
            let amount = self.policy.login_reward(&account);
            if amount > 0 {
                match self
                    .ledger
                    .apply_delta(account_id, amount, Reason::Login, None)
                {
                    Ok(_) => reward_earned = amount,
                    Err(e) => {
                        log::warn!(
                            "login reward credit failed account={account_id} policy={}: {e}",
                            self.policy.version()
                        );
                    }
                }
            }
        }

        let tier = Tier::for_balance(self.store.account_balance(account_id)?);
        Ok(LoginOutcome {
            reward_earned,
            login_count,
            tier,
        })
    }

    pub fn get(&self, account_id: &str) -> CoreResult<Account> {
        self.store.require_account(account_id)
    }

    pub fn set_bank_details(&self, account_id: &str, bank: BankDetails) -> CoreResult<()> {
        if bank.account_number.trim().is_empty() || bank.ifsc.trim().is_empty() {
            return Err(CoreError::Validation(
                "account number and IFSC are required".into(),
            ));
        }
        self.store.set_bank_details(account_id, &bank)
    }

    pub fn leaderboard(&self, limit: usize) -> CoreResult<Vec<Account>> {
        self.store.leaderboard(limit)
    }

    pub fn reward_history(&self, account_id: &str, limit: usize) -> CoreResult<Vec<LedgerEntry>> {
        self.store.recent_entries_for_account(account_id, limit)
    }
}
