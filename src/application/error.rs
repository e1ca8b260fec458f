use thiserror::Error;

use crate::domain::{Cents, format_cents};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error("No transactions found for account: {0}")]
    HistoryNotFound(String),

    #[error(
        "Insufficient funds in account {account}: balance {}, required {}",
        format_cents(*balance),
        format_cents(*required)
    )]
    InsufficientFunds {
        account: String,
        balance: Cents,
        required: Cents,
    },

    #[error("Timed out waiting for the lock on account {0}")]
    ConcurrencyTimeout(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl LedgerError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrencyTimeout(_))
    }
}
