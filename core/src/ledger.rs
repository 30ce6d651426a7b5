//! The account ledger — the only way a coin balance changes.
//!
//! `apply_delta`/`apply_deltas` wrap the store's atomic write path with a
//! bounded retry loop: a tripped compare-and-swap or an SQLITE_BUSY shows
//! up as `Conflict` and is replayed; callers never see it.

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::store::Store;
use crate::types::{Coins, Reason, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Conflicts beyond this count indicate something structurally wrong
/// (e.g. a writer looping on the same account) and surface as an error.
const MAX_CONFLICT_RETRIES: u32 = 16;

/// One requested balance mutation.
#[derive(Debug, Clone)]
pub struct LedgerDelta {
    pub account_id: String,
    pub amount: Coins,
    pub reason: Reason,
    /// Pairs the two sides of a transfer, or dedups a refund/bonus.
    pub correlation_id: Option<String>,
}

/// One immutable, signed balance adjustment with its audit reason and the
/// tier the account held immediately after the mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: i64,
    pub account_id: String,
    pub amount: Coins,
    pub reason: Reason,
    pub tier_at_time: Tier,
    pub correlation_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Ledger {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Apply one signed delta atomically. Overdraws fail with
    /// `InsufficientBalance` before any mutation.
    pub fn apply_delta(
        &self,
        account_id: &str,
        amount: Coins,
        reason: Reason,
        correlation_id: Option<&str>,
    ) -> CoreResult<LedgerEntry> {
        let deltas = [LedgerDelta {
            account_id: account_id.to_string(),
            amount,
            reason,
            correlation_id: correlation_id.map(str::to_string),
        }];
        let mut entries = self.apply_deltas(&deltas)?;
        Ok(entries.remove(0))
    }

    /// Apply a batch of deltas as a single unit of work — both ledger
    /// entries of a transfer exist, or neither does.
    pub fn apply_deltas(&self, deltas: &[LedgerDelta]) -> CoreResult<Vec<LedgerEntry>> {
        let at = self.clock.now();
        let mut attempt = 0u32;
        loop {
            match self.store.apply_deltas(deltas, at) {
                Err(CoreError::Conflict) if attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    log::debug!("ledger conflict, retry {attempt}/{MAX_CONFLICT_RETRIES}");
                    std::thread::sleep(Duration::from_millis(u64::from(attempt) * 2));
                }
                other => return other,
            }
        }
    }

    pub fn balance(&self, account_id: &str) -> CoreResult<Coins> {
        self.store.account_balance(account_id)
    }

    pub fn entries(&self, account_id: &str) -> CoreResult<Vec<LedgerEntry>> {
        self.store.entries_for_account(account_id)
    }

    /// `balance == sum(entries)` — the core audit invariant, checked by
    /// tests and the reconciliation sweeper.
    pub fn balance_matches_ledger(&self, account_id: &str) -> CoreResult<bool> {
        let balance = self.store.account_balance(account_id)?;
        let sum = self.store.ledger_sum_for_account(account_id)?;
        Ok(balance == sum)
    }

    /// Retention cleanup of old entries. Accounts keep their balances;
    /// only the aged audit trail is dropped.
    pub fn prune_entries_before(&self, cutoff: DateTime<Utc>) -> CoreResult<usize> {
        self.store.prune_entries_before(cutoff)
    }
}
