use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::AccountId;

use super::LedgerError;

/// Per-account mutual exclusion for mutating operations.
///
/// Locks are created on first use and live for the rest of the process.
/// This serialises read-modify-write sequences on one account inside this
/// process only; a second serving process needs store-level locking instead.
#[derive(Default)]
pub struct AccountLocks {
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
}

/// Held locks for one operation. Dropping it releases every lock.
pub struct AccountGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the lock for an account, inserting it atomically if absent.
    fn lock_for(&self, account: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.get(account) {
            return Arc::clone(lock.value());
        }
        Arc::clone(
            self.locks
                .entry(account.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Lock every listed account.
    ///
    /// Ids are sorted and deduplicated first, so two operations over the same
    /// pair of accounts always lock them in the same order whichever one is
    /// the sender.
    pub async fn acquire(&self, accounts: &[&str]) -> AccountGuard {
        let mut guards = Vec::with_capacity(accounts.len());
        for account in lock_order(accounts) {
            guards.push(self.lock_for(account).lock_owned().await);
        }
        AccountGuard { _guards: guards }
    }

    /// Like [`acquire`](Self::acquire), giving up after `timeout`.
    /// Locks taken before the deadline are released again on failure.
    pub async fn acquire_within(
        &self,
        accounts: &[&str],
        timeout: Duration,
    ) -> Result<AccountGuard, LedgerError> {
        tokio::time::timeout(timeout, self.acquire(accounts))
            .await
            .map_err(|_| LedgerError::ConcurrencyTimeout(lock_order(accounts).join(",")))
    }

    /// Number of accounts that have ever been locked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

fn lock_order<'a>(accounts: &[&'a str]) -> Vec<&'a str> {
    let mut ordered = accounts.to_vec();
    ordered.sort_unstable();
    ordered.dedup();
    ordered
}
