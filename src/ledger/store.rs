//! Ledger Store
//!
//! The seam between the transfer engine and the relational backend:
//!
//! - [`Queries`]: every row primitive, bound to one open transaction
//! - [`LedgerTx`]: a transaction handle (`Queries` + commit / rollback)
//! - [`LedgerBackend`]: checks transaction handles out of the shared pool
//! - [`Store`]: `exec_tx`, one atomic attempt of a unit of work

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, error, warn};

use super::context::TxContext;
use super::error::{LedgerError, StoreError};
use super::models::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, ListAccountsParams, ListEntriesParams, ListTransfersParams,
    Transfer, UpdateAccountParams, UpdateEntryParams,
};

/// Row primitives, each a single atomic statement
///
/// Every call participates in the transaction the implementor is bound to.
#[async_trait]
pub trait Queries: Send {
    async fn create_account(&mut self, arg: CreateAccountParams) -> Result<Account, StoreError>;

    async fn get_account(&mut self, id: i64) -> Result<Account, StoreError>;

    async fn list_accounts(&mut self, arg: ListAccountsParams)
    -> Result<Vec<Account>, StoreError>;

    async fn update_account(&mut self, arg: UpdateAccountParams) -> Result<Account, StoreError>;

    /// Atomic `balance = balance + amount`, returning the updated row
    ///
    /// Takes the account's row lock for the rest of the transaction.
    async fn add_account_balance(
        &mut self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, StoreError>;

    async fn delete_account(&mut self, id: i64) -> Result<(), StoreError>;

    async fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, StoreError>;

    async fn get_entry(&mut self, id: i64) -> Result<Entry, StoreError>;

    async fn list_entries(&mut self, arg: ListEntriesParams) -> Result<Vec<Entry>, StoreError>;

    /// Administrative correction, never used by transfers
    async fn update_entry(&mut self, arg: UpdateEntryParams) -> Result<Entry, StoreError>;

    async fn create_transfer(&mut self, arg: CreateTransferParams)
    -> Result<Transfer, StoreError>;

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, StoreError>;

    async fn list_transfers(
        &mut self,
        arg: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError>;
}

/// An open transaction
///
/// Dropping a handle without commit must discard its writes and release
/// everything it holds.
#[async_trait]
pub trait LedgerTx: Queries {
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Relational backend shared process-wide
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Begin a transaction on a connection checked out of the pool
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError>;
}

/// Transaction-scoped accessor handed to a unit of work
pub type TxHandle = dyn LedgerTx + 'static;

/// Ledger store: runs units of work atomically against a backend
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn LedgerBackend>,
}

impl Store {
    pub fn new(backend: Arc<dyn LedgerBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn LedgerBackend> {
        &self.backend
    }

    /// Execute `f` inside one database transaction
    ///
    /// Commits when `f` succeeds and `ctx` is still live. Rolls back when `f`
    /// fails or `ctx` fires; a failed rollback is reported together with the
    /// original error. No retries: one call is one attempt.
    pub async fn exec_tx<T, F>(&self, ctx: &TxContext, f: F) -> Result<T, LedgerError>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut TxHandle) -> BoxFuture<'t, Result<T, LedgerError>> + Send,
    {
        ctx.check()?;

        // Waiting for a pooled connection is bounded by the context too
        let mut tx = ctx
            .run(async { self.backend.begin().await.map_err(LedgerError::from) })
            .await?;

        let outcome = {
            let work = f(tx.as_mut());
            ctx.run(work).await
        };
        // The unit of work may finish right as the context fires
        let outcome = outcome.and_then(|value| ctx.check().map(|_| value));

        match outcome {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => match tx.rollback().await {
                Ok(()) => {
                    debug!(backend = self.backend.name(), error = %err, "Transaction rolled back");
                    Err(err)
                }
                Err(rb_err) => {
                    error!(
                        backend = self.backend.name(),
                        error = %err,
                        rollback_error = %rb_err,
                        "Rollback failed"
                    );
                    Err(LedgerError::RollbackFailed {
                        source: Box::new(err),
                        rollback: rb_err,
                    })
                }
            },
        }
    }

    // ------------------------------------------------------------------------
    // Single-statement helpers for administrative CRUD
    // ------------------------------------------------------------------------

    pub async fn create_account(
        &self,
        ctx: &TxContext,
        arg: CreateAccountParams,
    ) -> Result<Account, LedgerError> {
        self.exec_tx(ctx, move |q| {
            Box::pin(async move { Ok(q.create_account(arg).await?) })
        })
        .await
    }

    pub async fn get_account(&self, ctx: &TxContext, id: i64) -> Result<Account, LedgerError> {
        self.exec_tx(ctx, move |q| {
            Box::pin(async move {
                q.get_account(id)
                    .await
                    .map_err(|e| LedgerError::lookup(e, "account", id))
            })
        })
        .await
    }

    pub async fn list_accounts(
        &self,
        ctx: &TxContext,
        arg: ListAccountsParams,
    ) -> Result<Vec<Account>, LedgerError> {
        self.exec_tx(ctx, move |q| {
            Box::pin(async move { Ok(q.list_accounts(arg).await?) })
        })
        .await
    }

    pub async fn update_account(
        &self,
        ctx: &TxContext,
        arg: UpdateAccountParams,
    ) -> Result<Account, LedgerError> {
        self.exec_tx(ctx, move |q| {
            Box::pin(async move {
                q.update_account(arg)
                    .await
                    .map_err(|e| LedgerError::lookup(e, "account", arg.id))
            })
        })
        .await
    }

    pub async fn delete_account(&self, ctx: &TxContext, id: i64) -> Result<(), LedgerError> {
        self.exec_tx(ctx, move |q| {
            Box::pin(async move {
                q.delete_account(id)
                    .await
                    .map_err(|e| LedgerError::lookup(e, "account", id))
            })
        })
        .await
    }

    pub async fn get_entry(&self, ctx: &TxContext, id: i64) -> Result<Entry, LedgerError> {
        self.exec_tx(ctx, move |q| {
            Box::pin(async move {
                q.get_entry(id)
                    .await
                    .map_err(|e| LedgerError::lookup(e, "entry", id))
            })
        })
        .await
    }

    pub async fn list_entries(
        &self,
        ctx: &TxContext,
        arg: ListEntriesParams,
    ) -> Result<Vec<Entry>, LedgerError> {
        self.exec_tx(ctx, move |q| {
            Box::pin(async move { Ok(q.list_entries(arg).await?) })
        })
        .await
    }

    pub async fn get_transfer(&self, ctx: &TxContext, id: i64) -> Result<Transfer, LedgerError> {
        self.exec_tx(ctx, move |q| {
            Box::pin(async move {
                q.get_transfer(id)
                    .await
                    .map_err(|e| LedgerError::lookup(e, "transfer", id))
            })
        })
        .await
    }

    pub async fn list_transfers(
        &self,
        ctx: &TxContext,
        arg: ListTransfersParams,
    ) -> Result<Vec<Transfer>, LedgerError> {
        self.exec_tx(ctx, move |q| {
            Box::pin(async move { Ok(q.list_transfers(arg).await?) })
        })
        .await
    }

    /// Probe the backend by opening and rolling back an empty transaction
    pub async fn ping(&self) -> Result<(), LedgerError> {
        let tx = self.backend.begin().await?;
        if let Err(e) = tx.rollback().await {
            warn!(backend = self.backend.name(), error = %e, "Ping rollback failed");
            return Err(e.into());
        }
        Ok(())
    }
}
