//! External payout/payment gateway boundary.
//!
//! The core never talks to the network itself — it calls this trait.
//! Gateway calls may block for seconds; callers must not hold any store
//! lock or open transaction across them. Every payout carries the
//! withdrawal id as its idempotency key so a retried settlement attempt
//! cannot double-pay.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::accounts::BankDetails;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The gateway refused the payout/order (bad account, low balance…).
    #[error("gateway declined: {0}")]
    Declined(String),

    /// The bounded call deadline elapsed with no answer. The payout may or
    /// may not have gone through — settle as failed and flag for review.
    #[error("gateway call timed out")]
    Timeout,

    /// Transport-level failure before the gateway gave a verdict.
    #[error("gateway unreachable: {0}")]
    Transport(String),
}

/// One payout instruction. Amounts are in minor units (coins × 100).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRequest {
    /// Idempotency key — always the withdrawal id.
    pub reference_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub bank: BankDetails,
    pub narration: String,
}

/// The gateway's answer to a payout, either fresh or replayed from a
/// status query during recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutReceipt {
    pub payout_id: String,
    pub reference_id: String,
    /// Raw gateway response body, persisted verbatim on the txn_record.
    pub raw_response: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: String,
    pub amount_minor: i64,
}

pub trait PayoutGateway: Send + Sync {
    /// Submit one payout. At-most-once from the caller's side: the core
    /// calls this exactly once per withdrawal approval.
    fn create_payout(&self, req: &PayoutRequest) -> Result<PayoutReceipt, GatewayError>;

    /// Idempotent status probe by reference id — the recovery path for
    /// withdrawals stuck APPROVED after a crash mid-settlement. `None`
    /// means the gateway never saw the payout.
    fn payout_status(&self, reference_id: &str) -> Result<Option<PayoutReceipt>, GatewayError>;

    /// Create a coin-purchase order to be paid by the client and verified
    /// back through `payment::PaymentDesk::verify_and_activate`.
    fn create_order(&self, amount_minor: i64) -> Result<OrderReceipt, GatewayError>;
}
