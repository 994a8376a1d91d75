//! Engine properties shared by the backend-specific test files

#![allow(dead_code)]

use std::collections::HashSet;

use simple_bank::ledger::{
    Account, CreateAccountParams, LedgerError, ListEntriesParams, ListTransfersParams,
    TransferEngine, TransferTxParams, TxContext,
};
use simple_bank::random::{random_currency, random_money, random_owner};

pub async fn create_account(engine: &TransferEngine, balance: i64, currency: &str) -> Account {
    engine
        .store()
        .create_account(
            &TxContext::background(),
            CreateAccountParams {
                owner: random_owner(),
                balance,
                currency: currency.to_string(),
            },
        )
        .await
        .expect("create account")
}

pub async fn create_random_account(engine: &TransferEngine) -> Account {
    create_account(engine, random_money(), &random_currency()).await
}

pub async fn balance_of(engine: &TransferEngine, id: i64) -> i64 {
    engine
        .store()
        .get_account(&TxContext::background(), id)
        .await
        .expect("get account")
        .balance
}

/// 5 concurrent transfers of 10 from one account to another
pub async fn concurrent_transfers_lose_no_updates(engine: &TransferEngine) {
    let from = create_account(engine, 1000, "USD").await;
    let to = create_account(engine, 1000, "USD").await;
    let n = 5;
    let amount = 10;

    let mut handles = Vec::new();
    for _ in 0..n {
        let engine = engine.clone();
        let arg = TransferTxParams {
            from_account_id: from.id,
            to_account_id: to.id,
            amount,
        };
        handles.push(tokio::spawn(async move {
            engine.transfer_funds(&TxContext::background(), arg).await
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        let result = handle.await.expect("join").expect("transfer");

        assert_eq!(result.transfer.from_account_id, from.id);
        assert_eq!(result.transfer.to_account_id, to.id);
        assert_eq!(result.transfer.amount, amount);
        assert!(result.transfer.id > 0);
        assert_eq!(result.from_entry.account_id, from.id);
        assert_eq!(result.from_entry.amount, -amount);
        assert_eq!(result.to_entry.account_id, to.id);
        assert_eq!(result.to_entry.amount, amount);
        assert_eq!(result.from_account.id, from.id);
        assert_eq!(result.to_account.id, to.id);

        let ctx = TxContext::background();
        engine.store().get_transfer(&ctx, result.transfer.id).await.expect("transfer row");
        engine.store().get_entry(&ctx, result.from_entry.id).await.expect("from entry");
        engine.store().get_entry(&ctx, result.to_entry.id).await.expect("to entry");

        // Each committed transfer observes a distinct serial position
        let diff_from = from.balance - result.from_account.balance;
        let diff_to = result.to_account.balance - to.balance;
        assert_eq!(diff_from, diff_to);
        assert!(diff_from > 0);
        assert_eq!(diff_from % amount, 0);
        let k = diff_from / amount;
        assert!((1..=n).contains(&k));
        assert!(seen.insert(k), "position {} observed twice", k);
    }

    assert_eq!(balance_of(engine, from.id).await, 1000 - n * amount);
    assert_eq!(balance_of(engine, to.id).await, 1000 + n * amount);

    let transfers = engine
        .store()
        .list_transfers(
            &TxContext::background(),
            ListTransfersParams {
                from_account_id: from.id,
                to_account_id: to.id,
                limit: 100,
                offset: 0,
            },
        )
        .await
        .expect("transfers");
    let ids: HashSet<i64> = transfers.iter().map(|t| t.id).collect();
    assert_eq!(transfers.len(), n as usize);
    assert_eq!(ids.len(), n as usize);
}

/// 10 concurrent transfers alternating direction over one pair
pub async fn opposite_transfers_do_not_deadlock(engine: &TransferEngine) {
    let a = create_account(engine, 1000, "EUR").await;
    let b = create_account(engine, 1000, "EUR").await;
    let n = 10;

    let mut handles = Vec::new();
    for i in 0..n {
        let (from, to) = if i % 2 == 1 { (b.id, a.id) } else { (a.id, b.id) };
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .transfer_funds(
                    &TxContext::background(),
                    TransferTxParams {
                        from_account_id: from,
                        to_account_id: to,
                        amount: 10,
                    },
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("transfer");
    }

    assert_eq!(balance_of(engine, a.id).await, 1000);
    assert_eq!(balance_of(engine, b.id).await, 1000);
}

/// Random transfers among a few accounts keep the total constant
pub async fn concurrent_transfers_conserve_total(engine: &TransferEngine) {
    let mut accounts = Vec::new();
    for _ in 0..4 {
        accounts.push(create_account(engine, 500, "IDR").await);
    }
    let ids: Vec<i64> = accounts.iter().map(|a| a.id).collect();
    let total_before: i64 = accounts.iter().map(|a| a.balance).sum();

    let mut handles = Vec::new();
    for i in 0..20 {
        let from = ids[i % ids.len()];
        let to = ids[(i * 3 + 1) % ids.len()];
        if from == to {
            continue;
        }
        let engine = engine.clone();
        let amount = simple_bank::random::random_int(1, 50);
        handles.push(tokio::spawn(async move {
            engine
                .transfer_funds(
                    &TxContext::background(),
                    TransferTxParams {
                        from_account_id: from,
                        to_account_id: to,
                        amount,
                    },
                )
                .await
        }));
    }
    for handle in handles {
        match handle.await.expect("join") {
            Ok(_) | Err(LedgerError::InsufficientFunds { .. }) => {}
            Err(e) => panic!("unexpected transfer error: {}", e),
        }
    }

    let mut total_after = 0;
    for id in &ids {
        let balance = balance_of(engine, *id).await;
        assert!(balance >= 0, "account {} overdrawn: {}", id, balance);
        total_after += balance;
    }
    assert_eq!(total_before, total_after);

    // Every account's entries reconcile with its balance
    for account in &accounts {
        let entries = engine
            .store()
            .list_entries(
                &TxContext::background(),
                ListEntriesParams {
                    account_id: account.id,
                    limit: 1000,
                    offset: 0,
                },
            )
            .await
            .expect("entries");
        let delta: i64 = entries.iter().map(|e| e.amount).sum();
        assert_eq!(account.balance + delta, balance_of(engine, account.id).await);
    }
}

/// Rejected calls leave nothing behind
pub async fn rejected_transfers_change_nothing(engine: &TransferEngine) {
    let from = create_account(engine, 100, "USD").await;
    let to = create_account(engine, 100, "USD").await;
    let ctx = TxContext::background();

    let invalid = [
        (from.id, to.id, 0),
        (from.id, to.id, -5),
        (from.id, from.id, 10),
    ];
    for (f, t, amount) in invalid {
        let res = engine
            .transfer_funds(
                &ctx,
                TransferTxParams {
                    from_account_id: f,
                    to_account_id: t,
                    amount,
                },
            )
            .await;
        assert!(matches!(res, Err(LedgerError::Validation(_))), "{:?}", res);
    }

    let missing = engine
        .transfer_funds(
            &ctx,
            TransferTxParams {
                from_account_id: from.id,
                to_account_id: i64::MAX,
                amount: 10,
            },
        )
        .await;
    assert!(matches!(missing, Err(LedgerError::NotFound(_))));

    assert_eq!(balance_of(engine, from.id).await, 100);
    assert_eq!(balance_of(engine, to.id).await, 100);
    let transfers = engine
        .store()
        .list_transfers(
            &ctx,
            ListTransfersParams {
                from_account_id: from.id,
                to_account_id: from.id,
                limit: 100,
                offset: 0,
            },
        )
        .await
        .expect("transfers");
    assert!(transfers.is_empty());
}

/// A committed result is immediately readable with the same values
pub async fn committed_result_is_readable(engine: &TransferEngine) {
    let from = create_random_account(engine).await;
    let to = create_account(engine, 0, &from.currency).await;
    let amount = from.balance.max(1);
    let ctx = TxContext::background();

    let res = engine
        .transfer_funds(
            &ctx,
            TransferTxParams {
                from_account_id: from.id,
                to_account_id: to.id,
                amount,
            },
        )
        .await;
    if from.balance == 0 {
        // Nothing to send from an empty account
        assert!(matches!(res, Err(LedgerError::InsufficientFunds { .. })));
        return;
    }
    let result = res.expect("transfer");

    assert_eq!(
        engine.store().get_transfer(&ctx, result.transfer.id).await,
        Ok(result.transfer.clone())
    );
    assert_eq!(
        engine.store().get_entry(&ctx, result.from_entry.id).await,
        Ok(result.from_entry.clone())
    );
    assert_eq!(
        engine.store().get_entry(&ctx, result.to_entry.id).await,
        Ok(result.to_entry.clone())
    );
    assert_eq!(balance_of(engine, from.id).await, result.from_account.balance);
    assert_eq!(balance_of(engine, to.id).await, result.to_account.balance);
    assert_eq!(result.from_account.balance, 0);
    assert_eq!(result.to_account.balance, amount);
}
