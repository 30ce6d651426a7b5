//! Login reward policy.
//!
//! The formula is a revolving door — fixed 1–4, then 5–20 with streak and
//! tier multipliers, then 1–2, then 1–10 — so it is an injectable,
//! versioned object. Swap the policy, not the call sites.

use crate::accounts::Account;
use crate::config::RewardConfig;
use crate::rng::RewardRng;
use crate::types::Coins;
use std::sync::Mutex;

pub trait RewardPolicy: Send + Sync {
    /// Stable label recorded in logs so reward amounts can be attributed
    /// to the formula that produced them.
    fn version(&self) -> &'static str;

    /// Coins to grant for this login event. Must be non-negative.
    fn login_reward(&self, account: &Account) -> Coins;
}

/// The shipped policy: a uniform random draw in [min, max], independent of
/// streaks and tier.
pub struct UniformRangePolicy {
    min: Coins,
    max: Coins,
    rng: Mutex<RewardRng>,
}

impl UniformRangePolicy {
    pub fn new(config: &RewardConfig, rng: RewardRng) -> Self {
        assert!(
            0 <= config.min_coins && config.min_coins <= config.max_coins,
            "reward range must be non-negative and non-empty"
        );
        Self {
            min: config.min_coins,
            max: config.max_coins,
            rng: Mutex::new(rng),
        }
    }
}

impl RewardPolicy for UniformRangePolicy {
    fn version(&self) -> &'static str {
        "uniform-v1"
    }

    fn login_reward(&self, _account: &Account) -> Coins {
        self.rng
            .lock()
            .expect("reward rng mutex poisoned")
            .next_in_range(self.min, self.max)
    }
}

/// Degenerate policy for tests: always the same amount.
pub struct FixedRewardPolicy(pub Coins);

impl RewardPolicy for FixedRewardPolicy {
    fn version(&self) -> &'static str {
        "fixed"
    }

    fn login_reward(&self, _account: &Account) -> Coins {
        self.0
    }
}
