use crate::gateway::GatewayError;
use crate::types::Coins;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("database error: {0}")]
    Database(rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("insufficient balance on '{account_id}': have {available}, need {requested}")]
    InsufficientBalance {
        account_id: String,
        available: Coins,
        requested: Coins,
    },

    #[error("account '{0}' not found")]
    AccountNotFound(String),

    #[error("'{0}' already processed")]
    AlreadyProcessed(String),

    #[error("payment signature mismatch")]
    SignatureInvalid,

    #[error("payout gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Conditional-write conflict (lost-update guard tripped, or SQLite
    /// reported busy/locked). Retried transparently by the ledger — this
    /// variant never reaches external callers.
    #[error("conditional write conflict")]
    Conflict,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// SQLITE_BUSY / SQLITE_LOCKED become Conflict so the ledger retry loop
/// treats them like a lost CAS; everything else is a hard database error.
impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(inner, _)
                if matches!(
                    inner.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                CoreError::Conflict
            }
            _ => CoreError::Database(e),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
