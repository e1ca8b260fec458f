use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, Transaction};

use crate::domain::{Account, AccountId, Cents, LedgerEntry, NewEntry};

use super::MIGRATION_001_INITIAL;

/// Repository for persisting and querying accounts and ledger entries.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Open a unit of work.
    ///
    /// `BEGIN IMMEDIATE` takes SQLite's write lock up front, so the balance
    /// read inside the unit of work can never be invalidated by another
    /// writer before our own update lands.
    pub async fn begin(&self) -> Result<UnitOfWork> {
        let tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .context("Failed to begin unit of work")?;
        Ok(UnitOfWork { tx })
    }

    // ========================
    // Account operations
    // ========================

    /// Insert a new account. Returns `false` if the id is already taken.
    pub async fn create_account(&self, account: &Account) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (id, balance, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&account.id)
        .bind(account.balance)
        .bind(timestamp(account.created_at))
        .execute(&self.pool)
        .await
        .context("Failed to create account")?;

        Ok(result.rows_affected() == 1)
    }

    /// Read an account outside any unit of work.
    pub async fn get_account(&self, id: &str) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT id, balance, created_at FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch account")?;

        row.as_ref().map(row_to_account).transpose()
    }

    /// List all accounts, ordered by id.
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query("SELECT id, balance, created_at FROM accounts ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list accounts")?;

        rows.iter().map(row_to_account).collect()
    }

    // ========================
    // Ledger operations
    // ========================

    /// List entries referencing an account on either side, newest first.
    pub async fn list_entries(
        &self,
        account: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, from_account, to_account, amount, created_at
            FROM ledger_entries
            WHERE from_account = ? OR to_account = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(account)
        .bind(account)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list ledger entries")?;

        rows.iter().map(row_to_entry).collect()
    }

    /// Count entries referencing an account on either side.
    pub async fn count_entries(&self, account: &str) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM ledger_entries
            WHERE from_account = ? OR to_account = ?
            "#,
        )
        .bind(account)
        .bind(account)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count ledger entries")?;

        Ok(row.get("count"))
    }

    /// Total number of ledger entries.
    pub async fn entry_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM ledger_entries")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count ledger entries")?;

        Ok(row.get("count"))
    }

    /// Sum of entry amounts per affected account (`to_account`).
    pub async fn ledger_totals(&self) -> Result<HashMap<AccountId, Cents>> {
        let rows = sqlx::query(
            r#"
            SELECT to_account, SUM(amount) as total
            FROM ledger_entries
            GROUP BY to_account
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to compute ledger totals")?;

        Ok(rows
            .iter()
            .map(|row| (row.get("to_account"), row.get("total")))
            .collect())
    }

    /// Number of entries naming each account on either side.
    pub async fn entry_references(&self) -> Result<HashMap<AccountId, i64>> {
        let rows = sqlx::query(
            r#"
            SELECT account, COUNT(*) as count
            FROM (
                SELECT id, from_account as account FROM ledger_entries
                UNION
                SELECT id, to_account as account FROM ledger_entries
            )
            GROUP BY account
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to count entry references")?;

        Ok(rows
            .iter()
            .map(|row| (row.get("account"), row.get("count")))
            .collect())
    }
}

/// An atomic-commit scope over account and ledger writes.
///
/// Owned by exactly one operation. Dropping it without calling
/// [`UnitOfWork::commit`] rolls every write back.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    /// Read an account as seen by this unit of work.
    pub async fn account(&mut self, id: &str) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT id, balance, created_at FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .context("Failed to fetch account")?;

        row.as_ref().map(row_to_account).transpose()
    }

    pub async fn set_balance(&mut self, id: &str, balance: Cents) -> Result<()> {
        let result = sqlx::query("UPDATE accounts SET balance = ? WHERE id = ?")
            .bind(balance)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .context("Failed to update balance")?;

        if result.rows_affected() != 1 {
            anyhow::bail!("Balance update for {} touched {} rows", id, result.rows_affected());
        }
        Ok(())
    }

    /// Append entries in a single statement, stamped with one creation time.
    pub async fn append_entries(&mut self, entries: &[NewEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let created_at = timestamp(Utc::now());
        let mut builder = QueryBuilder::<Sqlite>::new(
            "INSERT INTO ledger_entries (from_account, to_account, amount, created_at) ",
        );
        builder.push_values(entries, |mut row, entry| {
            row.push_bind(entry.from_account.clone())
                .push_bind(entry.to_account.clone())
                .push_bind(entry.amount)
                .push_bind(created_at.clone());
        });

        builder
            .build()
            .execute(&mut *self.tx)
            .await
            .context("Failed to append ledger entries")?;
        Ok(())
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.context("Failed to commit unit of work")
    }

    /// Roll back explicitly. A failed rollback is logged and otherwise
    /// ignored: the caller is already reporting a failure.
    pub async fn abort(self) {
        if let Err(err) = self.tx.rollback().await {
            tracing::error!(error = %err, "rollback failed");
        }
    }
}

/// Fixed-width UTC timestamps so that text ordering matches time ordering.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .context("Invalid created_at timestamp")?
        .with_timezone(&Utc))
}

fn row_to_account(row: &SqliteRow) -> Result<Account> {
    let created_at: String = row.get("created_at");
    Ok(Account {
        id: row.get("id"),
        balance: row.get("balance"),
        created_at: parse_timestamp(&created_at)?,
    })
}

fn row_to_entry(row: &SqliteRow) -> Result<LedgerEntry> {
    let created_at: String = row.get("created_at");
    Ok(LedgerEntry {
        id: row.get("id"),
        from_account: row.get("from_account"),
        to_account: row.get("to_account"),
        amount: row.get("amount"),
        created_at: parse_timestamp(&created_at)?,
    })
}
