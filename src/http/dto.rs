use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::{BalanceChange, History, TransferOutcome};
use crate::domain::{Account, Cents, LedgerEntry, cents_to_decimal, round_to_cents};

use super::errors::ApiError;

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub user_id: String,
    #[serde(deserialize_with = "rust_decimal::serde::float::deserialize")]
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub user_id: String,
    #[serde(deserialize_with = "rust_decimal::serde::float::deserialize")]
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(deserialize_with = "rust_decimal::serde::float::deserialize")]
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct BalanceRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TransactionsRequest {
    pub user_id: String,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

/// Round a requested amount to cents; the service rejects anything that
/// ends up non-positive.
pub fn amount_to_cents(amount: Decimal) -> Result<Cents, ApiError> {
    round_to_cents(amount).ok_or_else(|| ApiError::bad_request("amount is out of range"))
}

#[derive(Debug, Serialize)]
pub struct BalanceChangeData {
    pub user_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_balance: Decimal,
}

impl From<BalanceChange> for BalanceChangeData {
    fn from(change: BalanceChange) -> Self {
        Self {
            user_id: change.account,
            new_balance: cents_to_decimal(change.new_balance),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransferData {
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_sender_balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_receiver_balance: Decimal,
}

impl From<TransferOutcome> for TransferData {
    fn from(outcome: TransferOutcome) -> Self {
        Self {
            sender_id: outcome.sender,
            receiver_id: outcome.receiver,
            new_sender_balance: cents_to_decimal(outcome.new_sender_balance),
            new_receiver_balance: cents_to_decimal(outcome.new_receiver_balance),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BalanceData {
    pub user_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

impl From<Account> for BalanceData {
    fn from(account: Account) -> Self {
        Self {
            user_id: account.id,
            balance: cents_to_decimal(account.balance),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EntryData {
    pub id: i64,
    pub from_user_id: String,
    pub to_user_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for EntryData {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            from_user_id: entry.from_account,
            to_user_id: entry.to_account,
            amount: cents_to_decimal(entry.amount),
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionsData {
    pub user_id: String,
    pub page: u32,
    pub page_size: u32,
    pub transactions: Vec<EntryData>,
}

impl From<History> for TransactionsData {
    fn from(history: History) -> Self {
        Self {
            user_id: history.account,
            page: history.page,
            page_size: history.page_size,
            transactions: history.entries.into_iter().map(EntryData::from).collect(),
        }
    }
}
