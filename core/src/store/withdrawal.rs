//! Withdrawal and settlement-trail persistence.
//!
//! State moves are conditional UPDATEs keyed on the expected prior status,
//! so the PENDING → APPROVED gate (and the terminal moves) are atomic:
//! two concurrent approvals cannot both pass, and a terminal row can never
//! move again.

use super::{parse_enum, parse_timestamp, Store};
use crate::error::{CoreError, CoreResult};
use crate::types::WithdrawalStatus;
use crate::withdrawal::{TxnRecord, Withdrawal};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

impl Store {
    pub fn insert_withdrawal(&self, w: &Withdrawal) -> CoreResult<()> {
        let bank = serde_json::to_string(&w.bank_details)?;
        self.lock().execute(
            "INSERT INTO withdrawal (
                withdrawal_id, account_id, amount, status, bank_details,
                payout_id, notes, needs_review, created_at, settled_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                w.withdrawal_id,
                w.account_id,
                w.amount,
                w.status.as_str(),
                bank,
                w.payout_id,
                w.notes,
                w.needs_review as i32,
                w.created_at.to_rfc3339(),
                w.settled_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn get_withdrawal(&self, withdrawal_id: &str) -> CoreResult<Option<Withdrawal>> {
        let row = self
            .lock()
            .query_row(
                &format!("{WITHDRAWAL_SELECT} WHERE withdrawal_id = ?1"),
                params![withdrawal_id],
                withdrawal_row_mapper,
            )
            .optional()?;
        Ok(row)
    }

    pub fn require_withdrawal(&self, withdrawal_id: &str) -> CoreResult<Withdrawal> {
        self.get_withdrawal(withdrawal_id)?.ok_or_else(|| {
            CoreError::Validation(format!("withdrawal '{withdrawal_id}' not found"))
        })
    }

    /// Atomic state move: succeeds only when the row still holds `from`.
    /// Returns false when another worker got there first (or the caller's
    /// view was stale).
    pub fn transition_withdrawal(
        &self,
        withdrawal_id: &str,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    ) -> CoreResult<bool> {
        debug_assert!(from.can_transition(to), "illegal transition {from} -> {to}");
        let n = self.lock().execute(
            "UPDATE withdrawal SET status = ?1 WHERE withdrawal_id = ?2 AND status = ?3",
            params![to.as_str(), withdrawal_id, from.as_str()],
        )?;
        Ok(n > 0)
    }

    /// Terminal success: APPROVED → SUCCESS with the gateway payout id.
    pub fn settle_withdrawal_success(
        &self,
        withdrawal_id: &str,
        payout_id: &str,
        at: DateTime<Utc>,
    ) -> CoreResult<bool> {
        let n = self.lock().execute(
            "UPDATE withdrawal
             SET status = 'SUCCESS', payout_id = ?1, settled_at = ?2
             WHERE withdrawal_id = ?3 AND status = 'APPROVED'",
            params![payout_id, at.to_rfc3339(), withdrawal_id],
        )?;
        Ok(n > 0)
    }

    /// Terminal failure: APPROVED → FAILED with the reason recorded.
    /// `needs_review` marks timeouts for manual reconciliation.
    pub fn settle_withdrawal_failed(
        &self,
        withdrawal_id: &str,
        notes: &str,
        needs_review: bool,
        at: DateTime<Utc>,
    ) -> CoreResult<bool> {
        let n = self.lock().execute(
            "UPDATE withdrawal
             SET status = 'FAILED', notes = ?1, needs_review = ?2, settled_at = ?3
             WHERE withdrawal_id = ?4 AND status = 'APPROVED'",
            params![notes, needs_review as i32, at.to_rfc3339(), withdrawal_id],
        )?;
        Ok(n > 0)
    }

    pub fn withdrawals_for_account(&self, account_id: &str) -> CoreResult<Vec<Withdrawal>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "{WITHDRAWAL_SELECT} WHERE account_id = ?1 ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map(params![account_id], withdrawal_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Withdrawals sitting in a given state — the sweeper uses this to
    /// find APPROVED rows that need gateway reconciliation.
    pub fn withdrawals_with_status(
        &self,
        status: WithdrawalStatus,
    ) -> CoreResult<Vec<Withdrawal>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "{WITHDRAWAL_SELECT} WHERE status = ?1 ORDER BY created_at ASC"
        ))?;
        let rows = stmt.query_map(params![status.as_str()], withdrawal_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Settlement trail ──────────────────────────────────────────

    pub fn insert_txn_record(&self, t: &TxnRecord) -> CoreResult<()> {
        self.lock().execute(
            "INSERT INTO txn_record (
                txn_id, withdrawal_id, account_id, kind, status, amount,
                currency, gateway_response, payout_id, error_message, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                t.txn_id,
                t.withdrawal_id,
                t.account_id,
                t.kind.as_str(),
                t.status.as_str(),
                t.amount,
                t.currency,
                t.gateway_response.to_string(),
                t.payout_id,
                t.error_message,
                t.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn txns_for_withdrawal(&self, withdrawal_id: &str) -> CoreResult<Vec<TxnRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "{TXN_SELECT} WHERE withdrawal_id = ?1 ORDER BY created_at ASC"
        ))?;
        let rows = stmt.query_map(params![withdrawal_id], txn_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn txns_for_account(&self, account_id: &str) -> CoreResult<Vec<TxnRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "{TXN_SELECT} WHERE account_id = ?1 ORDER BY created_at ASC"
        ))?;
        let rows = stmt.query_map(params![account_id], txn_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn txn_count(&self) -> CoreResult<i64> {
        self.lock()
            .query_row("SELECT COUNT(*) FROM txn_record", [], |row| row.get(0))
            .map_err(Into::into)
    }
}

const WITHDRAWAL_SELECT: &str = "SELECT withdrawal_id, account_id, amount, status, bank_details,
        payout_id, notes, needs_review, created_at, settled_at
 FROM withdrawal";

fn withdrawal_row_mapper(row: &Row<'_>) -> Result<Withdrawal, rusqlite::Error> {
    let bank_raw: String = row.get(4)?;
    let bank_details = serde_json::from_str(&bank_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("bank_details: {e}").into(),
        )
    })?;
    Ok(Withdrawal {
        withdrawal_id: row.get(0)?,
        account_id: row.get(1)?,
        amount: row.get(2)?,
        status: parse_enum(3, row.get(3)?)?,
        bank_details,
        payout_id: row.get(5)?,
        notes: row.get(6)?,
        needs_review: row.get::<_, i32>(7)? != 0,
        created_at: parse_timestamp(8, &row.get::<_, String>(8)?)?,
        settled_at: row
            .get::<_, Option<String>>(9)?
            .map(|s| parse_timestamp(9, &s))
            .transpose()?,
    })
}

const TXN_SELECT: &str = "SELECT txn_id, withdrawal_id, account_id, kind, status, amount,
        currency, gateway_response, payout_id, error_message, created_at
 FROM txn_record";

fn txn_row_mapper(row: &Row<'_>) -> Result<TxnRecord, rusqlite::Error> {
    let raw: String = row.get(7)?;
    let gateway_response = serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            rusqlite::types::Type::Text,
            format!("gateway_response: {e}").into(),
        )
    })?;
    Ok(TxnRecord {
        txn_id: row.get(0)?,
        withdrawal_id: row.get(1)?,
        account_id: row.get(2)?,
        kind: parse_enum(3, row.get(3)?)?,
        status: parse_enum(4, row.get(4)?)?,
        amount: row.get(5)?,
        currency: row.get(6)?,
        gateway_response,
        payout_id: row.get(8)?,
        error_message: row.get(9)?,
        created_at: parse_timestamp(10, &row.get::<_, String>(10)?)?,
    })
}
