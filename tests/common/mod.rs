// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::path::PathBuf;

use anyhow::Result;
use coffer::application::{EngineConfig, LedgerService};
use coffer::Repository;
use coffer::domain::{Cents, LedgerEntry};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// A service backed by a fresh database in a temporary directory.
pub struct TestLedger {
    pub service: LedgerService,
    pub dir: TempDir,
}

impl TestLedger {
    pub async fn new() -> Result<Self> {
        Self::with_config(EngineConfig::default()).await
    }

    pub async fn with_config(config: EngineConfig) -> Result<Self> {
        let dir = TempDir::new()?;
        let db_path = dir.path().join("test.db");
        let service = LedgerService::init(db_path.to_str().unwrap())
            .await?
            .with_config(config);
        Ok(Self { service, dir })
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("test.db")
    }

    /// A second repository on the same database, bypassing the service.
    pub async fn repository(&self) -> Result<Repository> {
        Repository::connect(&format!("sqlite:{}", self.db_path().display())).await
    }

    /// Open each account with a zero balance.
    pub async fn open(&self, accounts: &[&str]) -> Result<()> {
        for account in accounts {
            self.service.open_account(account).await?;
        }
        Ok(())
    }

    /// Open an account and deposit `amount` into it.
    pub async fn funded(&self, account: &str, amount: Cents) -> Result<()> {
        self.service.open_account(account).await?;
        self.service.deposit(account, amount).await?;
        Ok(())
    }

    pub async fn balance(&self, account: &str) -> Result<Cents> {
        Ok(self.service.get_balance(account).await?.balance)
    }

    /// Every entry referencing the account, newest first.
    pub async fn all_entries(&self, account: &str) -> Result<Vec<LedgerEntry>> {
        let mut entries = Vec::new();
        let mut page = 1;
        loop {
            let history = self
                .service
                .transactions(account, Some(page), Some(100))
                .await?;
            if history.entries.is_empty() {
                return Ok(entries);
            }
            entries.extend(history.entries);
            page += 1;
        }
    }

    /// Make every subsequent ledger append fail inside the store, after any
    /// balance update in the same unit of work has already been written.
    pub async fn fail_ledger_appends(&self) -> Result<()> {
        let pool = SqlitePool::connect(&format!("sqlite:{}", self.db_path().display())).await?;
        sqlx::query(
            r#"
            CREATE TRIGGER fail_ledger_append
            BEFORE INSERT ON ledger_entries
            BEGIN
                SELECT RAISE(ABORT, 'induced append failure');
            END;
            "#,
        )
        .execute(&pool)
        .await?;
        pool.close().await;
        Ok(())
    }

    pub async fn restore_ledger_appends(&self) -> Result<()> {
        let pool = SqlitePool::connect(&format!("sqlite:{}", self.db_path().display())).await?;
        sqlx::query("DROP TRIGGER IF EXISTS fail_ledger_append")
            .execute(&pool)
            .await?;
        pool.close().await;
        Ok(())
    }
}
