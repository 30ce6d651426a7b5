//! Referral persistence. The UNIQUE constraint on referral_code is the
//! backstop against duplicate rows; lifecycle moves are conditional
//! UPDATEs so a link or completion can only ever happen once.

use super::{parse_enum, parse_timestamp, Store};
use crate::referral::Referral;
use crate::error::CoreResult;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

impl Store {
    /// Insert the referral row for a freshly issued (or legacy) code.
    /// `INSERT OR IGNORE` keyed on the unique code makes the lazy-repair
    /// path idempotent.
    pub fn ensure_referral_row(
        &self,
        referral_id: &str,
        referrer: &str,
        code: &str,
        at: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.lock().execute(
            "INSERT OR IGNORE INTO referral
                (referral_id, referrer, referred, referral_code, status, coins_earned, created_at)
             VALUES (?1, ?2, NULL, ?3, 'pending', 0, ?4)",
            params![referral_id, referrer, code, at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn referral_by_code(&self, code: &str) -> CoreResult<Option<Referral>> {
        let row = self
            .lock()
            .query_row(
                &format!("{REFERRAL_SELECT} WHERE referral_code = ?1"),
                params![code],
                referral_row_mapper,
            )
            .optional()?;
        Ok(row)
    }

    pub fn referral_for_referred(&self, referred: &str) -> CoreResult<Option<Referral>> {
        let row = self
            .lock()
            .query_row(
                &format!("{REFERRAL_SELECT} WHERE referred = ?1"),
                params![referred],
                referral_row_mapper,
            )
            .optional()?;
        Ok(row)
    }

    /// Attach a new signup to a pending, unconsumed referral. The
    /// `referred IS NULL` guard means a code can never be consumed twice.
    /// Returns false when the code is unknown or already used.
    pub fn link_referred(&self, code: &str, new_account_id: &str) -> CoreResult<bool> {
        let n = self.lock().execute(
            "UPDATE referral SET referred = ?1
             WHERE referral_code = ?2 AND referred IS NULL AND status = 'pending'",
            params![new_account_id, code],
        )?;
        Ok(n > 0)
    }

    /// Move the referral for this referred account from pending to
    /// completed, stamping the bonus. Exactly one caller can win the
    /// conditional update; everyone else gets `None`. The winner receives
    /// the completed row so it can credit the referrer.
    pub fn complete_referral(
        &self,
        referred: &str,
        bonus: i64,
        at: DateTime<Utc>,
    ) -> CoreResult<Option<Referral>> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let n = tx.execute(
            "UPDATE referral
             SET status = 'completed', coins_earned = ?1, completed_at = ?2
             WHERE referred = ?3 AND status = 'pending'",
            params![bonus, at.to_rfc3339(), referred],
        )?;
        let row = if n > 0 {
            tx.query_row(
                &format!("{REFERRAL_SELECT} WHERE referred = ?1"),
                params![referred],
                referral_row_mapper,
            )
            .optional()?
        } else {
            None
        };
        tx.commit()?;
        Ok(row)
    }

    pub fn referrals_for_referrer(&self, referrer: &str) -> CoreResult<Vec<Referral>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "{REFERRAL_SELECT} WHERE referrer = ?1 ORDER BY created_at ASC"
        ))?;
        let rows = stmt.query_map(params![referrer], referral_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn referral_count(&self) -> CoreResult<i64> {
        self.lock()
            .query_row("SELECT COUNT(*) FROM referral", [], |row| row.get(0))
            .map_err(Into::into)
    }

    pub fn referral_count_for_code(&self, code: &str) -> CoreResult<i64> {
        self.lock()
            .query_row(
                "SELECT COUNT(*) FROM referral WHERE referral_code = ?1",
                params![code],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }
}

const REFERRAL_SELECT: &str = "SELECT referral_id, referrer, referred, referral_code, status,
        coins_earned, created_at, completed_at
 FROM referral";

fn referral_row_mapper(row: &Row<'_>) -> Result<Referral, rusqlite::Error> {
    Ok(Referral {
        referral_id: row.get(0)?,
        referrer: row.get(1)?,
        referred: row.get(2)?,
        referral_code: row.get(3)?,
        status: parse_enum(4, row.get(4)?)?,
        coins_earned: row.get(5)?,
        created_at: parse_timestamp(6, &row.get::<_, String>(6)?)?,
        completed_at: row
            .get::<_, Option<String>>(7)?
            .map(|s| parse_timestamp(7, &s))
            .transpose()?,
    })
}
