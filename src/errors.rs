use chrono::NaiveDate;
use thiserror::Error;

use crate::ledger::account::AccountId;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Error type that captures common ledger failures.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Cannot combine amounts of currency {left} and {right}")]
    CurrencyMismatch { left: String, right: String },
    #[error("Cannot compare an amount with {0}")]
    TypeMismatch(String),
    #[error("FX rate {from} → {to} not found on {date}")]
    RateNotFound {
        from: String,
        to: String,
        date: NaiveDate,
    },
    #[error("Amount overflow: {0}")]
    Overflow(String),
    #[error("Unknown account: {0}")]
    UnknownAccount(AccountId),
    #[error("Duplicate account name: {0}")]
    DuplicateAccount(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
