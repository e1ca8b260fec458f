mod common;

use anyhow::Result;
use coffer::application::LedgerError;
use coffer::domain::{Cents, ledger_balance};
use common::TestLedger;

#[tokio::test]
async fn test_deposit_withdraw_then_rejected_transfer() -> Result<()> {
    let ledger = TestLedger::new().await?;
    ledger.open(&["user3", "user4"]).await?;

    let change = ledger.service.deposit("user3", 10000).await?;
    assert_eq!(change.account, "user3");
    assert_eq!(change.new_balance, 10000);

    let change = ledger.service.withdraw("user3", 5000).await?;
    assert_eq!(change.new_balance, 5000);

    let result = ledger.service.transfer("user3", "user4", 15000).await;
    assert!(matches!(
        result,
        Err(LedgerError::InsufficientFunds {
            balance: 5000,
            required: 15000,
            ..
        })
    ));

    assert_eq!(ledger.balance("user3").await?, 5000);
    assert_eq!(ledger.balance("user4").await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_transfer_moves_funds_and_records_both_legs() -> Result<()> {
    let ledger = TestLedger::new().await?;
    ledger.funded("alice", 10000).await?;
    ledger.open(&["bob"]).await?;

    let outcome = ledger.service.transfer("alice", "bob", 2550).await?;
    assert_eq!(outcome.sender, "alice");
    assert_eq!(outcome.receiver, "bob");
    assert_eq!(outcome.new_sender_balance, 7450);
    assert_eq!(outcome.new_receiver_balance, 2550);

    let alice = ledger.all_entries("alice").await?;
    assert_eq!(alice.len(), 3, "deposit, debit leg and credit leg");

    let bob = ledger.all_entries("bob").await?;
    assert_eq!(bob.len(), 1);
    assert_eq!(bob[0].from_account, "alice");
    assert_eq!(bob[0].to_account, "bob");
    assert_eq!(bob[0].amount, 2550);

    let debit = alice
        .iter()
        .find(|e| e.to_account == "alice" && e.amount < 0)
        .expect("debit leg");
    assert_eq!(debit.from_account, "alice");
    assert_eq!(debit.amount, -2550);
    Ok(())
}

#[tokio::test]
async fn test_withdraw_insufficient_funds_leaves_balance() -> Result<()> {
    let ledger = TestLedger::new().await?;
    ledger.funded("user1", 1000).await?;

    let result = ledger.service.withdraw("user1", 1001).await;
    assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
    assert_eq!(ledger.balance("user1").await?, 1000);
    assert_eq!(ledger.all_entries("user1").await?.len(), 1);

    // Withdrawing the whole balance is allowed
    let change = ledger.service.withdraw("user1", 1000).await?;
    assert_eq!(change.new_balance, 0);
    Ok(())
}

#[tokio::test]
async fn test_unknown_accounts() -> Result<()> {
    let ledger = TestLedger::new().await?;
    ledger.funded("alice", 500).await?;

    assert!(matches!(
        ledger.service.deposit("ghost", 100).await,
        Err(LedgerError::AccountNotFound(id)) if id == "ghost"
    ));
    assert!(matches!(
        ledger.service.withdraw("ghost", 100).await,
        Err(LedgerError::AccountNotFound(_))
    ));
    assert!(matches!(
        ledger.service.transfer("alice", "ghost", 100).await,
        Err(LedgerError::AccountNotFound(id)) if id == "ghost"
    ));
    assert!(matches!(
        ledger.service.get_balance("ghost").await,
        Err(LedgerError::AccountNotFound(_))
    ));

    assert_eq!(ledger.balance("alice").await?, 500);
    Ok(())
}

#[tokio::test]
async fn test_invalid_input_is_rejected_before_store_access() -> Result<()> {
    let ledger = TestLedger::new().await?;
    ledger.funded("alice", 500).await?;

    for amount in [0, -100] {
        assert!(matches!(
            ledger.service.deposit("alice", amount).await,
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            ledger.service.withdraw("alice", amount).await,
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            ledger.service.transfer("alice", "bob", amount).await,
            Err(LedgerError::Validation(_))
        ));
    }
    assert!(matches!(
        ledger.service.deposit("", 100).await,
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        ledger.service.transfer("alice", "  ", 100).await,
        Err(LedgerError::Validation(_))
    ));

    // Validation failures never touch the lock registry
    assert_eq!(ledger.service.locks().len(), 1);
    assert_eq!(ledger.balance("alice").await?, 500);
    Ok(())
}

#[tokio::test]
async fn test_open_account_twice() -> Result<()> {
    let ledger = TestLedger::new().await?;
    ledger.open(&["alice"]).await?;

    assert!(matches!(
        ledger.service.open_account("alice").await,
        Err(LedgerError::AccountExists(_))
    ));
    assert_eq!(ledger.balance("alice").await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_transfer_to_self_nets_to_zero() -> Result<()> {
    let ledger = TestLedger::new().await?;
    ledger.funded("alice", 1000).await?;

    let outcome = ledger.service.transfer("alice", "alice", 400).await?;
    assert_eq!(outcome.new_sender_balance, 1000);
    assert_eq!(outcome.new_receiver_balance, 1000);
    assert_eq!(ledger.balance("alice").await?, 1000);

    let entries = ledger.all_entries("alice").await?;
    assert_eq!(entries.len(), 3);
    assert_eq!(ledger_balance("alice", &entries), 1000);

    // The funds rule still applies to a transfer to oneself
    assert!(matches!(
        ledger.service.transfer("alice", "alice", 1001).await,
        Err(LedgerError::InsufficientFunds { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_deposit_rolls_back_when_append_fails() -> Result<()> {
    let ledger = TestLedger::new().await?;
    ledger.funded("alice", 1000).await?;
    ledger.fail_ledger_appends().await?;

    let result = ledger.service.deposit("alice", 500).await;
    assert!(matches!(result, Err(LedgerError::Database(_))));
    assert_eq!(ledger.balance("alice").await?, 1000);

    ledger.restore_ledger_appends().await?;
    assert_eq!(ledger.service.deposit("alice", 500).await?.new_balance, 1500);
    Ok(())
}

#[tokio::test]
async fn test_withdraw_rolls_back_when_append_fails() -> Result<()> {
    let ledger = TestLedger::new().await?;
    ledger.funded("alice", 1000).await?;
    ledger.fail_ledger_appends().await?;

    let result = ledger.service.withdraw("alice", 300).await;
    assert!(matches!(result, Err(LedgerError::Database(_))));
    assert_eq!(ledger.balance("alice").await?, 1000);
    assert_eq!(ledger.all_entries("alice").await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_transfer_rolls_back_both_accounts_when_append_fails() -> Result<()> {
    let ledger = TestLedger::new().await?;
    ledger.funded("alice", 1000).await?;
    ledger.funded("bob", 200).await?;
    ledger.fail_ledger_appends().await?;

    let result = ledger.service.transfer("alice", "bob", 300).await;
    assert!(matches!(result, Err(LedgerError::Database(_))));
    assert_eq!(ledger.balance("alice").await?, 1000);
    assert_eq!(ledger.balance("bob").await?, 200);

    ledger.restore_ledger_appends().await?;
    let report = ledger.service.reconcile().await?;
    assert!(report.is_healthy(), "{:?}", report.issues);
    Ok(())
}

#[tokio::test]
async fn test_balances_equal_sum_of_ledger_entries() -> Result<()> {
    let ledger = TestLedger::new().await?;
    let accounts = ["a", "b", "c"];
    ledger.open(&accounts).await?;

    ledger.service.deposit("a", 10000).await?;
    ledger.service.deposit("b", 2500).await?;
    ledger.service.transfer("a", "b", 3333).await?;
    ledger.service.withdraw("b", 1234).await?;
    ledger.service.transfer("b", "c", 4000).await?;
    ledger.service.transfer("c", "a", 1).await?;
    ledger.service.deposit("c", 99).await?;
    // rejected operations must leave no trace
    let _ = ledger.service.withdraw("a", 1_000_000).await;
    let _ = ledger.service.transfer("c", "b", 1_000_000).await;

    let mut total: Cents = 0;
    for account in accounts {
        let entries = ledger.all_entries(account).await?;
        let balance = ledger.balance(account).await?;
        assert_eq!(balance, ledger_balance(account, &entries), "account {account}");
        assert!(balance >= 0);
        total += balance;
    }
    assert_eq!(total, 10000 + 2500 - 1234 + 99);

    let report = ledger.service.reconcile().await?;
    assert!(report.is_healthy(), "{:?}", report.issues);
    assert_eq!(report.account_count, 3);
    assert_eq!(report.entry_count, 3 + 1 + 3 * 2);
    Ok(())
}

#[tokio::test]
async fn test_ledger_entries_are_immutable() -> Result<()> {
    let ledger = TestLedger::new().await?;
    ledger.funded("alice", 1000).await?;

    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}", ledger.db_path().display())).await?;
    let update = sqlx::query("UPDATE ledger_entries SET amount = 1")
        .execute(&pool)
        .await;
    assert!(update.is_err());
    let delete = sqlx::query("DELETE FROM ledger_entries").execute(&pool).await;
    assert!(delete.is_err());
    pool.close().await;

    assert_eq!(ledger.all_entries("alice").await?[0].amount, 1000);
    Ok(())
}
