use std::collections::HashMap;
use std::fmt;

use super::{Account, AccountId, Cents, format_cents};

/// Result of comparing stored balances against the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub account_count: i64,
    pub entry_count: i64,
    pub issues: Vec<ReconcileIssue>,
}

impl ReconcileReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileIssue {
    BalanceMismatch {
        account: AccountId,
        stored: Cents,
        ledger: Cents,
    },
    NegativeBalance {
        account: AccountId,
        balance: Cents,
    },
    UnknownAccount {
        account: AccountId,
        entries: i64,
    },
}

impl fmt::Display for ReconcileIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileIssue::BalanceMismatch {
                account,
                stored,
                ledger,
            } => write!(
                f,
                "{}: stored balance {} differs from ledger total {}",
                account,
                format_cents(*stored),
                format_cents(*ledger)
            ),
            ReconcileIssue::NegativeBalance { account, balance } => {
                write!(f, "{}: negative balance {}", account, format_cents(*balance))
            }
            ReconcileIssue::UnknownAccount { account, entries } => {
                write!(f, "{}: {} ledger entries reference an unknown account", account, entries)
            }
        }
    }
}

/// Compare every account's stored balance with the sum of the entries that
/// moved it.
///
/// `ledger_totals` maps an account to the sum of entry amounts whose
/// `to_account` is that account. `referenced` maps every account named on
/// either side of an entry to the number of entries naming it.
pub fn build_reconcile_report(
    accounts: &[Account],
    ledger_totals: &HashMap<AccountId, Cents>,
    referenced: &HashMap<AccountId, i64>,
    entry_count: i64,
) -> ReconcileReport {
    let mut issues = Vec::new();

    for account in accounts {
        let ledger = ledger_totals.get(&account.id).copied().unwrap_or(0);
        if ledger != account.balance {
            issues.push(ReconcileIssue::BalanceMismatch {
                account: account.id.clone(),
                stored: account.balance,
                ledger,
            });
        }
        if account.balance < 0 {
            issues.push(ReconcileIssue::NegativeBalance {
                account: account.id.clone(),
                balance: account.balance,
            });
        }
    }

    let mut unknown: Vec<_> = referenced
        .iter()
        .filter(|(id, _)| !accounts.iter().any(|account| &account.id == *id))
        .collect();
    unknown.sort();
    issues.extend(unknown.into_iter().map(|(id, count)| ReconcileIssue::UnknownAccount {
        account: id.clone(),
        entries: *count,
    }));

    ReconcileReport {
        account_count: accounts.len() as i64,
        entry_count,
        issues,
    }
}
