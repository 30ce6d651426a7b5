//! SQLite persistence layer.
//!
//! RULE: Only store.rs (and its submodules) talks to the database.
//! Components call store methods — they never execute SQL directly.
//!
//! The handle is cheaply cloneable (one connection behind a mutex) so
//! request-scoped components can share it; `reopen()` yields an
//! independent connection to the same database for true multi-connection
//! concurrency. Per-account write safety does not depend on the mutex:
//! every balance mutation is an IMMEDIATE transaction with a
//! compare-and-swap update (see `store/ledger.rs`).

use crate::accounts::{Account, BankDetails};
use crate::error::{CoreError, CoreResult};
use crate::types::Tier;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

mod ledger;
mod referral;
mod service;
mod withdrawal;

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl Store {
    pub fn open(path: &str) -> CoreResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> CoreResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Open a new connection to the same database. Used by concurrent
    /// callers that want their own connection instead of sharing the
    /// mutex. For in-memory databases this returns an isolated database.
    pub fn reopen(&self) -> CoreResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> CoreResult<()> {
        let conn = self.lock();
        conn.execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        conn.execute_batch(include_str!("../../migrations/002_referrals.sql"))?;
        conn.execute_batch(include_str!("../../migrations/003_withdrawals.sql"))?;
        conn.execute_batch(include_str!("../../migrations/004_services.sql"))?;
        Ok(())
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }

    // ── Account ───────────────────────────────────────────────────

    pub fn insert_account(&self, account: &Account) -> CoreResult<()> {
        let bank = match &account.bank_details {
            Some(b) => Some(serde_json::to_string(b)?),
            None => None,
        };
        self.lock().execute(
            "INSERT INTO account (
                account_id, name, email, balance, tier, login_count,
                last_login, referral_code, referred_by, bank_details,
                service_activated, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                account.account_id,
                account.name,
                account.email,
                account.balance,
                account.tier.as_str(),
                account.login_count,
                account.last_login.map(|t| t.to_rfc3339()),
                account.referral_code,
                account.referred_by,
                bank,
                account.service_activated as i32,
                account.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_account(&self, account_id: &str) -> CoreResult<Option<Account>> {
        let row = self
            .lock()
            .query_row(
                &format!("{ACCOUNT_SELECT} WHERE account_id = ?1"),
                params![account_id],
                account_row_mapper,
            )
            .optional()?;
        Ok(row)
    }

    /// Like `get_account` but turns a missing row into `AccountNotFound`.
    pub fn require_account(&self, account_id: &str) -> CoreResult<Account> {
        self.get_account(account_id)?
            .ok_or_else(|| CoreError::AccountNotFound(account_id.to_string()))
    }

    pub fn account_by_email(&self, email: &str) -> CoreResult<Option<Account>> {
        let row = self
            .lock()
            .query_row(
                &format!("{ACCOUNT_SELECT} WHERE email = ?1"),
                params![email],
                account_row_mapper,
            )
            .optional()?;
        Ok(row)
    }

    pub fn account_by_referral_code(&self, code: &str) -> CoreResult<Option<Account>> {
        let row = self
            .lock()
            .query_row(
                &format!("{ACCOUNT_SELECT} WHERE referral_code = ?1"),
                params![code],
                account_row_mapper,
            )
            .optional()?;
        Ok(row)
    }

    pub fn account_balance(&self, account_id: &str) -> CoreResult<i64> {
        self.lock()
            .query_row(
                "SELECT balance FROM account WHERE account_id = ?1",
                params![account_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| CoreError::AccountNotFound(account_id.to_string()))
    }

    /// Set the account's referral code, only if none is assigned yet.
    /// Returns false when the account already carried a code.
    pub fn set_referral_code(&self, account_id: &str, code: &str) -> CoreResult<bool> {
        let n = self.lock().execute(
            "UPDATE account SET referral_code = ?1
             WHERE account_id = ?2 AND referral_code IS NULL",
            params![code, account_id],
        )?;
        Ok(n > 0)
    }

    pub fn set_referred_by(&self, account_id: &str, referrer_id: &str) -> CoreResult<()> {
        self.lock().execute(
            "UPDATE account SET referred_by = ?1 WHERE account_id = ?2",
            params![referrer_id, account_id],
        )?;
        Ok(())
    }

    pub fn set_bank_details(&self, account_id: &str, bank: &BankDetails) -> CoreResult<()> {
        let json = serde_json::to_string(bank)?;
        let n = self.lock().execute(
            "UPDATE account SET bank_details = ?1 WHERE account_id = ?2",
            params![json, account_id],
        )?;
        if n == 0 {
            return Err(CoreError::AccountNotFound(account_id.to_string()));
        }
        Ok(())
    }

    /// Capture a login: bump the counter and stamp last_login. Returns the
    /// new count and whether this login claimed a new UTC calendar day —
    /// the claim is a conditional UPDATE on the stored last_login date, so
    /// two concurrent logins can never both see the day roll over. Kept
    /// apart from reward crediting so a failed reward never loses the
    /// login.
    pub fn record_login(&self, account_id: &str, at: DateTime<Utc>) -> CoreResult<(i64, bool)> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let stamp = at.to_rfc3339();

        // `IS NOT` treats a NULL last_login (never logged in) as a roll.
        let day_rolled = tx.execute(
            "UPDATE account SET login_count = login_count + 1, last_login = ?1
             WHERE account_id = ?2 AND date(last_login) IS NOT date(?1)",
            params![stamp, account_id],
        )? > 0;
        if !day_rolled {
            let n = tx.execute(
                "UPDATE account SET login_count = login_count + 1, last_login = ?1
                 WHERE account_id = ?2",
                params![stamp, account_id],
            )?;
            if n == 0 {
                return Err(CoreError::AccountNotFound(account_id.to_string()));
            }
        }
        let login_count = tx.query_row(
            "SELECT login_count FROM account WHERE account_id = ?1",
            params![account_id],
            |row| row.get(0),
        )?;
        tx.commit()?;
        Ok((login_count, day_rolled))
    }

    pub fn set_service_activated(&self, account_id: &str) -> CoreResult<()> {
        let n = self.lock().execute(
            "UPDATE account SET service_activated = 1 WHERE account_id = ?1",
            params![account_id],
        )?;
        if n == 0 {
            return Err(CoreError::AccountNotFound(account_id.to_string()));
        }
        Ok(())
    }

    /// Top accounts by balance, login count breaking ties.
    pub fn leaderboard(&self, limit: usize) -> CoreResult<Vec<Account>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "{ACCOUNT_SELECT} ORDER BY balance DESC, login_count DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], account_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn account_count(&self) -> CoreResult<i64> {
        self.lock()
            .query_row("SELECT COUNT(*) FROM account", [], |row| row.get(0))
            .map_err(Into::into)
    }
}

const ACCOUNT_SELECT: &str = "SELECT account_id, name, email, balance, tier, login_count,
        last_login, referral_code, referred_by, bank_details,
        service_activated, created_at
 FROM account";

fn account_row_mapper(row: &Row<'_>) -> Result<Account, rusqlite::Error> {
    let bank_json: Option<String> = row.get(9)?;
    let bank_details = match bank_json {
        Some(raw) => Some(
            serde_json::from_str(&raw)
                .map_err(|e| conversion_err(9, format!("bank_details: {e}")))?,
        ),
        None => None,
    };
    Ok(Account {
        account_id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        balance: row.get(3)?,
        tier: parse_enum::<Tier>(4, row.get(4)?)?,
        login_count: row.get(5)?,
        last_login: row
            .get::<_, Option<String>>(6)?
            .map(|s| parse_timestamp(6, &s))
            .transpose()?,
        referral_code: row.get(7)?,
        referred_by: row.get(8)?,
        bank_details,
        service_activated: row.get::<_, i32>(10)? != 0,
        created_at: parse_timestamp(11, &row.get::<_, String>(11)?)?,
    })
}

/// Decode a TEXT column holding one of our string enums.
pub(crate) fn parse_enum<T: FromStr<Err = String>>(
    idx: usize,
    raw: String,
) -> Result<T, rusqlite::Error> {
    raw.parse::<T>().map_err(|e| conversion_err(idx, e))
}

pub(crate) fn parse_timestamp(idx: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, format!("timestamp: {e}")))
}

fn conversion_err(idx: usize, msg: impl Into<String>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        msg.into().into(),
    )
}
