use tracing::{error, info, warn};

use crate::domain::{
    Account, AccountId, Cents, LedgerEntry, NewEntry, ReconcileReport, build_reconcile_report,
};
use crate::storage::{Repository, UnitOfWork};

use super::{AccountGuard, AccountLocks, EngineConfig, LedgerError, MAX_PAGE_SIZE};

/// The single entry point for mutating balances.
///
/// Every mutation follows the same path: validate, lock the touched accounts
/// in a fixed order, open a unit of work, read, check, write the balance(s),
/// append the ledger entries, then commit or roll back. Locks are released
/// when the operation returns, whatever the outcome.
pub struct LedgerService {
    repo: Repository,
    locks: AccountLocks,
    config: EngineConfig,
}

/// Result of a deposit or withdrawal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceChange {
    pub account: AccountId,
    pub new_balance: Cents,
}

/// Result of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub sender: AccountId,
    pub receiver: AccountId,
    pub new_sender_balance: Cents,
    pub new_receiver_balance: Cents,
}

/// One page of an account's history, newest entry first
#[derive(Debug, Clone)]
pub struct History {
    pub account: AccountId,
    pub page: u32,
    pub page_size: u32,
    pub entries: Vec<LedgerEntry>,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            locks: AccountLocks::new(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Initialize a database at the given path, creating it if needed.
    pub async fn init(database_path: &str) -> Result<Self, LedgerError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, LedgerError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    pub fn locks(&self) -> &AccountLocks {
        &self.locks
    }

    // ========================
    // Account operations
    // ========================

    /// Provision a new account with a zero balance.
    pub async fn open_account(&self, account_id: &str) -> Result<Account, LedgerError> {
        validate_account_id(account_id, "user_id")?;

        let account = Account::new(account_id);
        if !self.repo.create_account(&account).await? {
            return Err(LedgerError::AccountExists(account_id.to_string()));
        }
        info!(account = account_id, "account opened");
        Ok(account)
    }

    /// Read the committed balance. Takes no lock.
    pub async fn get_balance(&self, account_id: &str) -> Result<Account, LedgerError> {
        validate_account_id(account_id, "user_id")?;

        self.repo
            .get_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))
    }

    // ========================
    // Mutations
    // ========================

    #[tracing::instrument(skip(self))]
    pub async fn deposit(&self, account_id: &str, amount: Cents) -> Result<BalanceChange, LedgerError> {
        validate_account_id(account_id, "user_id")?;
        validate_amount(amount)?;

        let _guard = self.lock(&[account_id]).await?;
        let mut uow = self.repo.begin().await?;
        let outcome = apply_deposit(&mut uow, account_id, amount).await;
        let new_balance = settle(uow, outcome).await?;

        info!(account = account_id, amount, new_balance, "deposit committed");
        Ok(BalanceChange {
            account: account_id.to_string(),
            new_balance,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn withdraw(&self, account_id: &str, amount: Cents) -> Result<BalanceChange, LedgerError> {
        validate_account_id(account_id, "user_id")?;
        validate_amount(amount)?;

        let _guard = self.lock(&[account_id]).await?;
        let mut uow = self.repo.begin().await?;
        let outcome = apply_withdrawal(&mut uow, account_id, amount).await;
        let new_balance = settle(uow, outcome).await?;

        info!(account = account_id, amount, new_balance, "withdrawal committed");
        Ok(BalanceChange {
            account: account_id.to_string(),
            new_balance,
        })
    }

    /// Move funds between two accounts.
    ///
    /// A transfer to the sender itself is accepted: the funds rule still
    /// applies, the balance does not move, and both legs are recorded.
    #[tracing::instrument(skip(self))]
    pub async fn transfer(
        &self,
        sender_id: &str,
        receiver_id: &str,
        amount: Cents,
    ) -> Result<TransferOutcome, LedgerError> {
        validate_account_id(sender_id, "sender_id")?;
        validate_account_id(receiver_id, "receiver_id")?;
        validate_amount(amount)?;

        let _guard = self.lock(&[sender_id, receiver_id]).await?;
        let mut uow = self.repo.begin().await?;
        let outcome = apply_transfer(&mut uow, sender_id, receiver_id, amount).await;
        let (new_sender_balance, new_receiver_balance) = settle(uow, outcome).await?;

        info!(
            sender = sender_id,
            receiver = receiver_id,
            amount,
            new_sender_balance,
            new_receiver_balance,
            "transfer committed"
        );
        Ok(TransferOutcome {
            sender: sender_id.to_string(),
            receiver: receiver_id.to_string(),
            new_sender_balance,
            new_receiver_balance,
        })
    }

    async fn lock(&self, accounts: &[&str]) -> Result<AccountGuard, LedgerError> {
        match self.config.lock_timeout {
            Some(timeout) => self.locks.acquire_within(accounts, timeout).await,
            None => Ok(self.locks.acquire(accounts).await),
        }
    }

    // ========================
    // History
    // ========================

    /// Page through an account's entries, newest first.
    ///
    /// A page past the end of a non-empty history is an empty list. An
    /// account that has never had an entry is `HistoryNotFound`.
    pub async fn transactions(
        &self,
        account_id: &str,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<History, LedgerError> {
        validate_account_id(account_id, "user_id")?;

        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(LedgerError::Validation("page must be at least 1".into()));
        }
        let page_size = page_size.unwrap_or(self.config.default_page_size);
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(LedgerError::Validation(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        let offset = (i64::from(page) - 1) * i64::from(page_size);
        let entries = self
            .repo
            .list_entries(account_id, i64::from(page_size), offset)
            .await?;

        if entries.is_empty() && self.repo.count_entries(account_id).await? == 0 {
            return Err(LedgerError::HistoryNotFound(account_id.to_string()));
        }

        Ok(History {
            account: account_id.to_string(),
            page,
            page_size,
            entries,
        })
    }

    // ========================
    // Integrity
    // ========================

    /// Compare every stored balance with the ledger.
    pub async fn reconcile(&self) -> Result<ReconcileReport, LedgerError> {
        let accounts = self.repo.list_accounts().await?;
        let totals = self.repo.ledger_totals().await?;
        let referenced = self.repo.entry_references().await?;
        let entry_count = self.repo.entry_count().await?;

        Ok(build_reconcile_report(
            &accounts,
            &totals,
            &referenced,
            entry_count,
        ))
    }
}

async fn apply_deposit(uow: &mut UnitOfWork, account_id: &str, amount: Cents) -> Result<Cents, LedgerError> {
    let account = load(uow, account_id).await?;
    let new_balance = credit(&account, amount)?;

    uow.set_balance(account_id, new_balance).await?;
    uow.append_entries(&[NewEntry::deposit(account_id, amount)])
        .await?;
    Ok(new_balance)
}

async fn apply_withdrawal(
    uow: &mut UnitOfWork,
    account_id: &str,
    amount: Cents,
) -> Result<Cents, LedgerError> {
    let account = load(uow, account_id).await?;
    ensure_covers(&account, amount)?;
    let new_balance = account.balance - amount;

    uow.set_balance(account_id, new_balance).await?;
    uow.append_entries(&[NewEntry::withdrawal(account_id, amount)])
        .await?;
    Ok(new_balance)
}

async fn apply_transfer(
    uow: &mut UnitOfWork,
    sender_id: &str,
    receiver_id: &str,
    amount: Cents,
) -> Result<(Cents, Cents), LedgerError> {
    let sender = load(uow, sender_id).await?;
    if sender_id == receiver_id {
        ensure_covers(&sender, amount)?;
        uow.append_entries(&NewEntry::transfer_legs(sender_id, receiver_id, amount))
            .await?;
        return Ok((sender.balance, sender.balance));
    }

    let receiver = load(uow, receiver_id).await?;
    ensure_covers(&sender, amount)?;
    let new_sender_balance = sender.balance - amount;
    let new_receiver_balance = credit(&receiver, amount)?;

    uow.set_balance(sender_id, new_sender_balance).await?;
    uow.set_balance(receiver_id, new_receiver_balance).await?;
    // Both legs go out in one statement: they commit or vanish together.
    uow.append_entries(&NewEntry::transfer_legs(sender_id, receiver_id, amount))
        .await?;
    Ok((new_sender_balance, new_receiver_balance))
}

async fn load(uow: &mut UnitOfWork, account_id: &str) -> Result<Account, LedgerError> {
    uow.account(account_id)
        .await?
        .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))
}

fn ensure_covers(account: &Account, amount: Cents) -> Result<(), LedgerError> {
    if account.can_cover(amount) {
        Ok(())
    } else {
        Err(LedgerError::InsufficientFunds {
            account: account.id.clone(),
            balance: account.balance,
            required: amount,
        })
    }
}

fn credit(account: &Account, amount: Cents) -> Result<Cents, LedgerError> {
    account.balance.checked_add(amount).ok_or_else(|| {
        LedgerError::Validation(format!("amount would overflow the balance of {}", account.id))
    })
}

/// Commit on success, roll back on failure.
async fn settle<T>(uow: UnitOfWork, outcome: Result<T, LedgerError>) -> Result<T, LedgerError> {
    match outcome {
        Ok(value) => {
            if let Err(err) = uow.commit().await {
                error!(error = %err, "commit failed");
                return Err(err.into());
            }
            Ok(value)
        }
        Err(err) => {
            uow.abort().await;
            match &err {
                LedgerError::Database(cause) => error!(error = %cause, "unit of work aborted"),
                other => warn!(reason = %other, "operation rejected"),
            }
            Err(err)
        }
    }
}

fn validate_account_id(account_id: &str, field: &str) -> Result<(), LedgerError> {
    if account_id.trim().is_empty() {
        return Err(LedgerError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn validate_amount(amount: Cents) -> Result<(), LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::Validation(
            "amount must be greater than 0".to_string(),
        ));
    }
    Ok(())
}
