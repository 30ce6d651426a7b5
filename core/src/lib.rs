//! Loyalty/rewards core: coin ledger, tiers, login rewards, referrals,
//! peer transfers, withdrawal settlement, and payment verification on
//! SQLite.
//!
//! All persistence goes through [`store::Store`] — no other module talks
//! to the database. [`engine::LoyaltyCore`] wires the desks together and
//! is the intended entry point for embedding processes.

pub mod accounts;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod notify;
pub mod payment;
pub mod redemption;
pub mod referral;
pub mod reward;
pub mod rng;
pub mod store;
pub mod transfer;
pub mod types;
pub mod withdrawal;

pub use engine::LoyaltyCore;
pub use error::{CoreError, CoreResult};
