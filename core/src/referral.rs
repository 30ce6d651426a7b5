//! Referral engine: code issuance, signup linking, and the activation
//! bonus paid through the ledger.

use crate::clock::Clock;
use crate::config::ReferralConfig;
use crate::error::CoreResult;
use crate::ledger::Ledger;
use crate::rng::RewardRng;
use crate::store::Store;
use crate::types::{Coins, Reason, ReferralStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const CODE_PREFIX: &str = "REF";
const CODE_SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Referral {
    pub referral_id: String,
    pub referrer: String,
    /// Unset until a signup consumes the code.
    pub referred: Option<String>,
    pub referral_code: String,
    pub status: ReferralStatus,
    pub coins_earned: Coins,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ReferralStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub coins_earned: Coins,
}

pub struct ReferralEngine {
    store: Store,
    ledger: Ledger,
    config: ReferralConfig,
    rng: Mutex<RewardRng>,
    clock: Arc<dyn Clock>,
}

impl ReferralEngine {
    pub fn new(
        store: Store,
        ledger: Ledger,
        config: ReferralConfig,
        rng: RewardRng,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            ledger,
            config,
            rng: Mutex::new(rng),
            clock,
        }
    }

    /// Issue (or return) the account's referral code. Idempotent: called
    /// twice it returns the same code and keeps a single referral row —
    /// legacy accounts with a code but no row get the row repaired here.
    pub fn generate_code(&self, account_id: &str) -> CoreResult<String> {
        let account = self.store.require_account(account_id)?;
        let now = self.clock.now();

        if let Some(code) = account.referral_code {
            self.store
                .ensure_referral_row(&new_referral_id(), account_id, &code, now)?;
            return Ok(code);
        }

        // Draw until unused. Collisions are rare (36^6 space) but the
        // UNIQUE constraint is the real guarantee.
        loop {
            let code = {
                let mut rng = self.rng.lock().expect("referral rng mutex poisoned");
                format!("{CODE_PREFIX}{}", rng.token(CODE_SUFFIX_LEN))
            };
            if self.store.account_by_referral_code(&code)?.is_some() {
                continue;
            }
            if !self.store.set_referral_code(account_id, &code)? {
                // Lost a race with another generate_code call — reuse the
                // code that call assigned.
                let account = self.store.require_account(account_id)?;
                if let Some(existing) = account.referral_code {
                    self.store.ensure_referral_row(
                        &new_referral_id(),
                        account_id,
                        &existing,
                        now,
                    )?;
                    return Ok(existing);
                }
                continue;
            }
            self.store
                .ensure_referral_row(&new_referral_id(), account_id, &code, now)?;
            return Ok(code);
        }
    }

    /// Link a signup to the pending referral for `code`. Deliberately a
    /// no-op for unknown codes — signup must not leak which codes exist —
    /// and for self-referrals.
    pub fn redeem_on_signup(&self, code: &str, new_account_id: &str) -> CoreResult<()> {
        let Some(referral) = self.store.referral_by_code(code)? else {
            log::debug!("signup with unknown referral code '{code}'");
            return Ok(());
        };
        if referral.referrer == new_account_id {
            log::warn!("self-referral attempt ignored: account={new_account_id} code={code}");
            return Ok(());
        }
        if self.store.link_referred(code, new_account_id)? {
            self.store
                .set_referred_by(new_account_id, &referral.referrer)?;
        } else {
            log::debug!("referral code '{code}' already consumed");
        }
        Ok(())
    }

    /// Pay the referrer once the referred account activates its service.
    /// The pending → completed move is a conditional update, so the bonus
    /// is credited exactly once no matter how many times this runs.
    pub fn complete_on_activation(&self, referred_account_id: &str) -> CoreResult<()> {
        let bonus = self.config.bonus_coins;
        let Some(referral) =
            self.store
                .complete_referral(referred_account_id, bonus, self.clock.now())?
        else {
            return Ok(());
        };

        self.ledger.apply_delta(
            &referral.referrer,
            bonus,
            Reason::ReferralBonus,
            Some(&referral.referral_id),
        )?;
        log::info!(
            "referral completed: referrer={} referred={referred_account_id} bonus={bonus}",
            referral.referrer
        );
        Ok(())
    }

    pub fn stats_for(&self, referrer: &str) -> CoreResult<ReferralStats> {
        let rows = self.store.referrals_for_referrer(referrer)?;
        let mut stats = ReferralStats {
            total: rows.iter().filter(|r| r.referred.is_some()).count(),
            ..Default::default()
        };
        for r in &rows {
            match r.status {
                ReferralStatus::Completed => {
                    stats.completed += 1;
                    stats.coins_earned += r.coins_earned;
                }
                ReferralStatus::Pending if r.referred.is_some() => stats.pending += 1,
                ReferralStatus::Pending => {}
            }
        }
        Ok(stats)
    }
}

fn new_referral_id() -> String {
    format!("ref-{}", Uuid::new_v4())
}
