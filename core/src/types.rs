//! Shared primitive types used across the entire core.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A coin amount. Signed in ledger entries, non-negative on accounts.
pub type Coins = i64;

/// A stable, unique identifier for any entity in the core.
pub type EntityId = String;

/// Coin balance at which an account becomes Gold.
pub const GOLD_THRESHOLD: Coins = 1_000;
/// Coin balance at which an account becomes Platinum.
pub const PLATINUM_THRESHOLD: Coins = 5_000;

/// Loyalty tier, always derived from the coin balance — never stored
/// independently of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    /// Pure, total tier derivation. Re-run on every balance mutation.
    pub fn for_balance(balance: Coins) -> Self {
        if balance >= PLATINUM_THRESHOLD {
            Tier::Platinum
        } else if balance >= GOLD_THRESHOLD {
            Tier::Gold
        } else {
            Tier::Silver
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Silver => "Silver",
            Tier::Gold => "Gold",
            Tier::Platinum => "Platinum",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Silver" => Ok(Tier::Silver),
            "Gold" => Ok(Tier::Gold),
            "Platinum" => Ok(Tier::Platinum),
            other => Err(format!("unknown tier '{other}'")),
        }
    }
}

/// Audit reason attached to every ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    Login,
    ReferralBonus,
    Redemption,
    Transfer,
    Payment,
    Activation,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Login => "login",
            Reason::ReferralBonus => "referral_bonus",
            Reason::Redemption => "redemption",
            Reason::Transfer => "transfer",
            Reason::Payment => "payment",
            Reason::Activation => "activation",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(Reason::Login),
            "referral_bonus" => Ok(Reason::ReferralBonus),
            "redemption" => Ok(Reason::Redemption),
            "transfer" => Ok(Reason::Transfer),
            "payment" => Ok(Reason::Payment),
            "activation" => Ok(Reason::Activation),
            other => Err(format!("unknown ledger reason '{other}'")),
        }
    }
}

/// Withdrawal settlement state. Transitions are forward-only:
/// PENDING → APPROVED → {SUCCESS | FAILED}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Success,
    Failed,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "PENDING",
            WithdrawalStatus::Approved => "APPROVED",
            WithdrawalStatus::Success => "SUCCESS",
            WithdrawalStatus::Failed => "FAILED",
        }
    }

    /// Whether `self → to` is a legal transition. Rejects every backward
    /// jump (e.g. SUCCESS → PENDING) and any move out of a terminal state.
    pub fn can_transition(&self, to: WithdrawalStatus) -> bool {
        matches!(
            (self, to),
            (WithdrawalStatus::Pending, WithdrawalStatus::Approved)
                | (WithdrawalStatus::Approved, WithdrawalStatus::Success)
                | (WithdrawalStatus::Approved, WithdrawalStatus::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WithdrawalStatus::Success | WithdrawalStatus::Failed)
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WithdrawalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(WithdrawalStatus::Pending),
            "APPROVED" => Ok(WithdrawalStatus::Approved),
            "SUCCESS" => Ok(WithdrawalStatus::Success),
            "FAILED" => Ok(WithdrawalStatus::Failed),
            other => Err(format!("unknown withdrawal status '{other}'")),
        }
    }
}

/// Referral lifecycle state. Monotonic: pending → completed, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Pending,
    Completed,
}

impl ReferralStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::Pending => "pending",
            ReferralStatus::Completed => "completed",
        }
    }
}

impl FromStr for ReferralStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReferralStatus::Pending),
            "completed" => Ok(ReferralStatus::Completed),
            other => Err(format!("unknown referral status '{other}'")),
        }
    }
}

/// Terminal outcome of one gateway settlement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxnStatus {
    Success,
    Failed,
}

impl TxnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnStatus::Success => "SUCCESS",
            TxnStatus::Failed => "FAILED",
        }
    }
}

impl FromStr for TxnStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(TxnStatus::Success),
            "FAILED" => Ok(TxnStatus::Failed),
            other => Err(format!("unknown txn status '{other}'")),
        }
    }
}

/// What a txn_record settles: a withdrawal payout or a coin purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnKind {
    Payout,
    Payment,
}

impl TxnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnKind::Payout => "payout",
            TxnKind::Payment => "payment",
        }
    }
}

impl FromStr for TxnKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payout" => Ok(TxnKind::Payout),
            "payment" => Ok(TxnKind::Payment),
            other => Err(format!("unknown txn kind '{other}'")),
        }
    }
}
