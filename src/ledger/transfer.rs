//! Transfer Engine
//!
//! Moves funds between two accounts in one transaction:
//!
//! ```text
//! validate ──▶ BEGIN ──▶ read both accounts
//!                    ──▶ INSERT transfer
//!                    ──▶ INSERT entry (from, -amount)
//!                    ──▶ INSERT entry (to,   +amount)
//!                    ──▶ UPDATE balances, lower account id first
//!                    ──▶ overdraft check ──▶ COMMIT
//! ```
//!
//! # Deadlock freedom
//!
//! Balance updates take row locks. Every transfer locks its two accounts in
//! ascending id order whatever its direction, so two transfers over the same
//! pair (A→B and B→A) always contend on the same first lock and can never
//! wait on each other in a cycle.
//!
//! The engine holds no in-process lock and keeps no state between calls.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::context::TxContext;
use super::error::{LedgerError, ValidationError};
use super::models::{
    Account, AddAccountBalanceParams, CreateEntryParams, CreateTransferParams, TransferTxParams,
    TransferTxResult,
};
use super::store::{Store, TxHandle};

/// What to do when a transfer would leave the source balance negative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverdraftPolicy {
    /// Roll the transfer back with [`LedgerError::InsufficientFunds`]
    #[default]
    Reject,
    /// Let balances go negative
    Allow,
}

impl TransferTxParams {
    /// Caller-side preconditions, checked before any transaction is opened
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.from_account_id <= 0 {
            return Err(ValidationError::InvalidAccountId(self.from_account_id));
        }
        if self.to_account_id <= 0 {
            return Err(ValidationError::InvalidAccountId(self.to_account_id));
        }
        if self.from_account_id == self.to_account_id {
            return Err(ValidationError::SameAccount(self.from_account_id));
        }
        if self.amount <= 0 {
            return Err(ValidationError::InvalidAmount(self.amount));
        }
        Ok(())
    }
}

/// Fund-transfer engine
#[derive(Clone)]
pub struct TransferEngine {
    store: Store,
    overdraft: OverdraftPolicy,
}

impl TransferEngine {
    pub fn new(store: Store, overdraft: OverdraftPolicy) -> Self {
        Self { store, overdraft }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Transfer `arg.amount` from one account to another
    ///
    /// All-or-nothing: on any error no transfer, entry or balance change from
    /// this call is visible. Balances in the result are the post-transfer
    /// values read under the row locks of this transaction.
    pub async fn transfer_funds(
        &self,
        ctx: &TxContext,
        arg: TransferTxParams,
    ) -> Result<TransferTxResult, LedgerError> {
        if let Err(e) = arg.validate() {
            debug!(
                from = arg.from_account_id,
                to = arg.to_account_id,
                amount = arg.amount,
                error = %e,
                "Transfer rejected"
            );
            return Err(e.into());
        }

        debug!(
            from = arg.from_account_id,
            to = arg.to_account_id,
            amount = arg.amount,
            "Transfer started"
        );

        let overdraft = self.overdraft;
        let res = self
            .store
            .exec_tx(ctx, move |tx| {
                Box::pin(async move { transfer_tx(tx, arg, overdraft).await })
            })
            .await;

        match &res {
            Ok(result) => info!(
                transfer_id = result.transfer.id,
                from = arg.from_account_id,
                to = arg.to_account_id,
                amount = arg.amount,
                from_balance = result.from_account.balance,
                to_balance = result.to_account.balance,
                "Transfer committed"
            ),
            Err(e) => warn!(
                from = arg.from_account_id,
                to = arg.to_account_id,
                amount = arg.amount,
                code = e.code(),
                error = %e,
                "Transfer failed"
            ),
        }
        res
    }
}

async fn transfer_tx(
    tx: &mut TxHandle,
    arg: TransferTxParams,
    overdraft: OverdraftPolicy,
) -> Result<TransferTxResult, LedgerError> {
    let from = tx
        .get_account(arg.from_account_id)
        .await
        .map_err(|e| LedgerError::lookup(e, "account", arg.from_account_id))?;
    let to = tx
        .get_account(arg.to_account_id)
        .await
        .map_err(|e| LedgerError::lookup(e, "account", arg.to_account_id))?;
    if from.currency != to.currency {
        return Err(ValidationError::CurrencyMismatch {
            from_account_id: from.id,
            from_currency: from.currency,
            to_account_id: to.id,
            to_currency: to.currency,
        }
        .into());
    }

    let transfer = tx
        .create_transfer(CreateTransferParams {
            from_account_id: arg.from_account_id,
            to_account_id: arg.to_account_id,
            amount: arg.amount,
        })
        .await?;

    let from_entry = tx
        .create_entry(CreateEntryParams {
            account_id: arg.from_account_id,
            amount: -arg.amount,
        })
        .await?;

    let to_entry = tx
        .create_entry(CreateEntryParams {
            account_id: arg.to_account_id,
            amount: arg.amount,
        })
        .await?;

    let (from_account, to_account) = if arg.from_account_id < arg.to_account_id {
        add_money(
            tx,
            arg.from_account_id,
            -arg.amount,
            arg.to_account_id,
            arg.amount,
        )
        .await?
    } else {
        let (to_account, from_account) = add_money(
            tx,
            arg.to_account_id,
            arg.amount,
            arg.from_account_id,
            -arg.amount,
        )
        .await?;
        (from_account, to_account)
    };

    if overdraft == OverdraftPolicy::Reject && from_account.balance < 0 {
        return Err(LedgerError::InsufficientFunds {
            account_id: from_account.id,
            balance: from_account.balance,
        });
    }

    Ok(TransferTxResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}

/// Apply two balance deltas in the given order; callers pass the lower id first
async fn add_money(
    tx: &mut TxHandle,
    account_id1: i64,
    amount1: i64,
    account_id2: i64,
    amount2: i64,
) -> Result<(Account, Account), LedgerError> {
    let account1 = tx
        .add_account_balance(AddAccountBalanceParams {
            id: account_id1,
            amount: amount1,
        })
        .await
        .map_err(|e| LedgerError::lookup(e, "account", account_id1))?;
    let account2 = tx
        .add_account_balance(AddAccountBalanceParams {
            id: account_id2,
            amount: amount2,
        })
        .await
        .map_err(|e| LedgerError::lookup(e, "account", account_id2))?;
    Ok((account1, account2))
}
