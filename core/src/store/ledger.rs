//! Ledger persistence: the single write path for coin balances.
//!
//! Every balance mutation runs as one IMMEDIATE transaction:
//! read balance → check overdraw → compare-and-swap update (balance and
//! derived tier together) → append the immutable ledger entry. No observer
//! can see a new balance without its entry, and a concurrent writer that
//! slipped in between read and update trips the CAS and surfaces as
//! `Conflict` for the caller's retry loop.

use super::{parse_enum, parse_timestamp, Store};
use crate::error::{CoreError, CoreResult};
use crate::ledger::{LedgerDelta, LedgerEntry};
use crate::types::{Coins, Tier};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

impl Store {
    /// Apply a batch of signed deltas atomically — all or nothing.
    /// Deltas are processed in ascending account-id order (fixed global
    /// order), but the returned entries match the input order.
    pub fn apply_deltas(
        &self,
        deltas: &[LedgerDelta],
        at: DateTime<Utc>,
    ) -> CoreResult<Vec<LedgerEntry>> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut order: Vec<usize> = (0..deltas.len()).collect();
        order.sort_by(|&a, &b| deltas[a].account_id.cmp(&deltas[b].account_id));

        let mut out: Vec<Option<LedgerEntry>> = Vec::new();
        out.resize_with(deltas.len(), || None);

        for &i in &order {
            let d = &deltas[i];
            let balance: Coins = tx
                .query_row(
                    "SELECT balance FROM account WHERE account_id = ?1",
                    params![d.account_id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| CoreError::AccountNotFound(d.account_id.clone()))?;

            if d.amount < 0 && balance + d.amount < 0 {
                return Err(CoreError::InsufficientBalance {
                    account_id: d.account_id.clone(),
                    available: balance,
                    requested: -d.amount,
                });
            }

            let new_balance = balance + d.amount;
            let tier = Tier::for_balance(new_balance);

            let n = tx.execute(
                "UPDATE account SET balance = ?1, tier = ?2
                 WHERE account_id = ?3 AND balance = ?4",
                params![new_balance, tier.as_str(), d.account_id, balance],
            )?;
            if n == 0 {
                return Err(CoreError::Conflict);
            }

            tx.execute(
                "INSERT INTO ledger_entry
                    (account_id, amount, reason, tier_at_time, correlation_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    d.account_id,
                    d.amount,
                    d.reason.as_str(),
                    tier.as_str(),
                    d.correlation_id,
                    at.to_rfc3339(),
                ],
            )?;

            out[i] = Some(LedgerEntry {
                entry_id: tx.last_insert_rowid(),
                account_id: d.account_id.clone(),
                amount: d.amount,
                reason: d.reason,
                tier_at_time: tier,
                correlation_id: d.correlation_id.clone(),
                created_at: at,
            });
        }

        tx.commit()?;
        Ok(out.into_iter().flatten().collect())
    }

    pub fn entries_for_account(&self, account_id: &str) -> CoreResult<Vec<LedgerEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "{LEDGER_SELECT} WHERE account_id = ?1 ORDER BY entry_id ASC"
        ))?;
        let rows = stmt.query_map(params![account_id], ledger_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn recent_entries_for_account(
        &self,
        account_id: &str,
        limit: usize,
    ) -> CoreResult<Vec<LedgerEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "{LEDGER_SELECT} WHERE account_id = ?1 ORDER BY entry_id DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![account_id, limit as i64], ledger_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn entries_with_correlation(&self, correlation_id: &str) -> CoreResult<Vec<LedgerEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "{LEDGER_SELECT} WHERE correlation_id = ?1 ORDER BY entry_id ASC"
        ))?;
        let rows = stmt.query_map(params![correlation_id], ledger_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Audit invariant: the account balance must equal the signed sum of
    /// its ledger entries at all times.
    pub fn ledger_sum_for_account(&self, account_id: &str) -> CoreResult<Coins> {
        self.lock()
            .query_row(
                "SELECT COALESCE(SUM(amount), 0) FROM ledger_entry WHERE account_id = ?1",
                params![account_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// Refund/bonus dedup guard: has a credit with this correlation id
    /// already been written for the account?
    pub fn has_credit_with_correlation(
        &self,
        account_id: &str,
        correlation_id: &str,
    ) -> CoreResult<bool> {
        self.lock()
            .query_row(
                "SELECT COUNT(*) > 0 FROM ledger_entry
                 WHERE account_id = ?1 AND correlation_id = ?2 AND amount > 0",
                params![account_id, correlation_id],
                |row| row.get::<_, i64>(0).map(|c| c > 0),
            )
            .map_err(Into::into)
    }

    /// Account-agnostic variant: has a credit bearing this correlation id
    /// been written anywhere? Used where the correlation id alone is the
    /// idempotency key (e.g. a gateway payment id), so a replay against a
    /// different account still trips the guard.
    pub fn any_credit_with_correlation(&self, correlation_id: &str) -> CoreResult<bool> {
        self.lock()
            .query_row(
                "SELECT COUNT(*) FROM ledger_entry
                 WHERE correlation_id = ?1 AND amount > 0",
                params![correlation_id],
                |row| row.get::<_, i64>(0).map(|c| c > 0),
            )
            .map_err(Into::into)
    }

    pub fn ledger_entry_count(&self) -> CoreResult<i64> {
        self.lock()
            .query_row("SELECT COUNT(*) FROM ledger_entry", [], |row| row.get(0))
            .map_err(Into::into)
    }

    /// Retention cleanup — the one sanctioned bulk delete on the
    /// otherwise append-only log. Returns the number of rows removed.
    pub fn prune_entries_before(&self, cutoff: DateTime<Utc>) -> CoreResult<usize> {
        let n = self.lock().execute(
            "DELETE FROM ledger_entry WHERE created_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(n)
    }
}

const LEDGER_SELECT: &str = "SELECT entry_id, account_id, amount, reason, tier_at_time,
        correlation_id, created_at
 FROM ledger_entry";

fn ledger_row_mapper(row: &Row<'_>) -> Result<LedgerEntry, rusqlite::Error> {
    Ok(LedgerEntry {
        entry_id: row.get(0)?,
        account_id: row.get(1)?,
        amount: row.get(2)?,
        reason: parse_enum(3, row.get(3)?)?,
        tier_at_time: parse_enum(4, row.get(4)?)?,
        correlation_id: row.get(5)?,
        created_at: parse_timestamp(6, &row.get::<_, String>(6)?)?,
    })
}
