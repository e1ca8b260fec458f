use chrono::{DateTime, Utc};

use super::{AccountId, Cents};

pub type EntryId = i64;

/// An immutable record of one signed balance movement.
///
/// The account whose balance moved is always `to_account`; `from_account`
/// names the party that initiated the movement. Deposits and withdrawals
/// reference the acting account on both sides, a transfer's debit leg
/// references the sender on both sides and its credit leg points from the
/// sender to the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub from_account: AccountId,
    pub to_account: AccountId,
    pub amount: Cents,
    pub created_at: DateTime<Utc>,
}

/// An entry that has not been persisted yet. The store assigns `id` and
/// `created_at` on append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub from_account: AccountId,
    pub to_account: AccountId,
    pub amount: Cents,
}

impl NewEntry {
    pub fn deposit(account: &str, amount: Cents) -> Self {
        Self {
            from_account: account.to_string(),
            to_account: account.to_string(),
            amount,
        }
    }

    pub fn withdrawal(account: &str, amount: Cents) -> Self {
        Self {
            from_account: account.to_string(),
            to_account: account.to_string(),
            amount: -amount,
        }
    }

    /// Both legs of a transfer: the sender's debit, then the receiver's credit.
    pub fn transfer_legs(sender: &str, receiver: &str, amount: Cents) -> [Self; 2] {
        [
            Self::withdrawal(sender, amount),
            Self {
                from_account: sender.to_string(),
                to_account: receiver.to_string(),
                amount,
            },
        ]
    }
}

/// Reconstruct an account's balance from entries, starting from zero.
pub fn ledger_balance(account: &str, entries: &[LedgerEntry]) -> Cents {
    entries
        .iter()
        .filter(|entry| entry.to_account == account)
        .map(|entry| entry.amount)
        .sum()
}
