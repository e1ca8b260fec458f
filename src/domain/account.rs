use chrono::{DateTime, Utc};

use super::Cents;

/// Opaque account identifier, supplied by whoever provisions the account.
pub type AccountId = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub balance: Cents,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// A freshly provisioned account always starts at zero so that its balance
    /// is fully explained by its ledger entries.
    pub fn new(id: impl Into<AccountId>) -> Self {
        Self {
            id: id.into(),
            balance: 0,
            created_at: Utc::now(),
        }
    }

    pub fn can_cover(&self, amount: Cents) -> bool {
        self.balance >= amount
    }
}
