use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::application::{EngineConfig, LedgerService};
use crate::domain::{format_cents, parse_cents};

/// Coffer - wallet ledger service
#[derive(Parser)]
#[command(name = "coffer")]
#[command(about = "Deposits, withdrawals and transfers over an append-only ledger")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "COFFER_DATABASE", default_value = "coffer.db", global = true)]
    pub database: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Open a new account with a zero balance
    Open {
        /// Account id
        user_id: String,
    },

    /// Serve the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, env = "COFFER_BIND", default_value = "0.0.0.0:8080")]
        bind: String,

        /// Give up waiting for account locks after this many milliseconds
        #[arg(long, env = "COFFER_LOCK_TIMEOUT_MS")]
        lock_timeout_ms: Option<u64>,

        /// Page size for history queries that do not specify one
        #[arg(long, default_value = "10")]
        default_page_size: u32,
    },

    /// Deposit funds into an account
    Deposit {
        user_id: String,
        /// Amount (e.g., "50.00" or "50")
        amount: String,
    },

    /// Withdraw funds from an account
    Withdraw {
        user_id: String,
        /// Amount (e.g., "50.00" or "50")
        amount: String,
    },

    /// Transfer funds between accounts
    Transfer {
        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// Sending account
        #[arg(long)]
        from: String,

        /// Receiving account
        #[arg(long)]
        to: String,
    },

    /// Show an account's balance
    Balance { user_id: String },

    /// List an account's transactions, newest first
    History {
        user_id: String,

        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Verify that every balance matches the ledger
    Check,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        crate::observability::init(self.log_json);

        match self.command {
            Commands::Init => {
                LedgerService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Open { user_id } => {
                let service = LedgerService::connect(&self.database).await?;
                let account = service.open_account(&user_id).await?;
                println!("Opened account {}", account.id);
            }

            Commands::Serve {
                bind,
                lock_timeout_ms,
                default_page_size,
            } => {
                let mut config = EngineConfig::default().with_default_page_size(default_page_size);
                if let Some(ms) = lock_timeout_ms {
                    config = config.with_lock_timeout(Duration::from_millis(ms));
                }
                let service = LedgerService::connect(&self.database)
                    .await?
                    .with_config(config);
                crate::http::serve(Arc::new(service), &bind).await?;
            }

            Commands::Deposit { user_id, amount } => {
                let service = LedgerService::connect(&self.database).await?;
                let change = service.deposit(&user_id, parse_amount(&amount)?).await?;
                println!("{}: {}", change.account, format_cents(change.new_balance));
            }

            Commands::Withdraw { user_id, amount } => {
                let service = LedgerService::connect(&self.database).await?;
                let change = service.withdraw(&user_id, parse_amount(&amount)?).await?;
                println!("{}: {}", change.account, format_cents(change.new_balance));
            }

            Commands::Transfer { amount, from, to } => {
                let service = LedgerService::connect(&self.database).await?;
                let amount = parse_amount(&amount)?;
                let outcome = service.transfer(&from, &to, amount).await?;
                println!(
                    "{} -> {}: {}",
                    outcome.sender,
                    outcome.receiver,
                    format_cents(amount)
                );
                println!("  {}: {}", outcome.sender, format_cents(outcome.new_sender_balance));
                println!(
                    "  {}: {}",
                    outcome.receiver,
                    format_cents(outcome.new_receiver_balance)
                );
            }

            Commands::Balance { user_id } => {
                let service = LedgerService::connect(&self.database).await?;
                let account = service.get_balance(&user_id).await?;
                println!("{}: {}", account.id, format_cents(account.balance));
            }

            Commands::History {
                user_id,
                page,
                page_size,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                run_history_command(&service, &user_id, page, page_size).await?;
            }

            Commands::Check => {
                let service = LedgerService::connect(&self.database).await?;
                run_check_command(&service).await?;
            }
        }

        Ok(())
    }
}

fn parse_amount(amount: &str) -> Result<i64> {
    parse_cents(amount).context("Invalid amount format. Use '50.00' or '50'")
}

async fn run_history_command(
    service: &LedgerService,
    user_id: &str,
    page: u32,
    page_size: Option<u32>,
) -> Result<()> {
    let history = service.transactions(user_id, Some(page), page_size).await?;

    if history.entries.is_empty() {
        println!("No transactions on page {}.", history.page);
        return Ok(());
    }

    println!(
        "{:<8} {:<26} {:<16} {:<16} {:>12}",
        "ID", "CREATED", "FROM", "TO", "AMOUNT"
    );
    println!("{}", "-".repeat(82));
    for entry in &history.entries {
        println!(
            "{:<8} {:<26} {:<16} {:<16} {:>12}",
            entry.id,
            entry.created_at.format("%Y-%m-%d %H:%M:%S%.3f"),
            truncate(&entry.from_account, 16),
            truncate(&entry.to_account, 16),
            format_cents(entry.amount)
        );
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.reconcile().await?;

    println!("Accounts: {}", report.account_count);
    println!("Entries:  {}", report.entry_count);
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
