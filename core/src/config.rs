//! Core configuration: reward formula bounds, referral bonus, withdrawal
//! limits, and payment-verification secrets.
//!
//! The login reward formula has churned repeatedly in production (fixed
//! 1–4, then streak/tier multipliers, then back). Everything tunable lives
//! here and is injected, never hardcoded at the call site.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CoreResult;
use crate::types::Coins;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Inclusive lower bound of the uniform login reward.
    pub min_coins: Coins,
    /// Inclusive upper bound of the uniform login reward.
    pub max_coins: Coins,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            min_coins: 1,
            max_coins: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralConfig {
    /// Flat bonus credited to the referrer when the referred account
    /// activates its service.
    pub bonus_coins: Coins,
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self { bonus_coins: 50 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalConfig {
    /// Smallest withdrawal the core will accept, in coins.
    pub min_amount: Coins,
    /// ISO currency code the gateway settles in.
    pub currency: String,
    /// Upper bound on a single gateway call. The gateway impl enforces it;
    /// past the bound the call is failed as a timeout and refunded.
    pub gateway_timeout_secs: u64,
}

impl Default for WithdrawalConfig {
    fn default() -> Self {
        Self {
            min_amount: 500,
            currency: "INR".to_string(),
            gateway_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Shared secret for the gateway's payment-confirmation HMAC.
    pub webhook_secret: String,
    /// One coin credited per this many minor units of purchase amount.
    pub coin_divisor: i64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            webhook_secret: String::new(),
            coin_divisor: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub reward: RewardConfig,
    pub referral: ReferralConfig,
    pub withdrawal: WithdrawalConfig,
    pub payment: PaymentConfig,
}

impl CoreConfig {
    pub fn from_json_str(s: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: &Path) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("read config {}: {e}", path.display()))?;
        Self::from_json_str(&raw)
    }
}
