//! Peer-to-peer coin transfer: one debit, one credit, one correlation id,
//! applied as a single ledger batch — two entries or none.

use crate::error::{CoreError, CoreResult};
use crate::ledger::{Ledger, LedgerDelta, LedgerEntry};
use crate::store::Store;
use crate::types::{Coins, Reason};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub correlation_id: String,
    pub debit: LedgerEntry,
    pub credit: LedgerEntry,
}

pub struct TransferDesk {
    store: Store,
    ledger: Ledger,
}

impl TransferDesk {
    pub fn new(store: Store, ledger: Ledger) -> Self {
        Self { store, ledger }
    }

    pub fn transfer(&self, from: &str, to: &str, amount: Coins) -> CoreResult<TransferReceipt> {
        if amount <= 0 {
            return Err(CoreError::Validation(format!(
                "transfer amount must be positive, got {amount}"
            )));
        }
        if from == to {
            return Err(CoreError::Validation("cannot transfer to yourself".into()));
        }
        // Recipient existence is checked up front so an unknown recipient
        // fails before the sender is touched; sender existence and balance
        // are enforced inside the atomic batch.
        if self.store.get_account(to)?.is_none() {
            return Err(CoreError::AccountNotFound(to.to_string()));
        }

        let correlation_id = Uuid::new_v4().to_string();
        let deltas = [
            LedgerDelta {
                account_id: from.to_string(),
                amount: -amount,
                reason: Reason::Transfer,
                correlation_id: Some(correlation_id.clone()),
            },
            LedgerDelta {
                account_id: to.to_string(),
                amount,
                reason: Reason::Transfer,
                correlation_id: Some(correlation_id.clone()),
            },
        ];
        let mut entries = self.ledger.apply_deltas(&deltas)?;
        let credit = entries.remove(1);
        let debit = entries.remove(0);
        log::info!("transfer {from} -> {to} amount={amount} correlation={correlation_id}");
        Ok(TransferReceipt {
            correlation_id,
            debit,
            credit,
        })
    }
}
