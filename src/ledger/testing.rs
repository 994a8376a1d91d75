//! Fault-injecting backend wrapper for tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::error::StoreError;
use super::models::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, ListAccountsParams, ListEntriesParams, ListTransfersParams,
    Transfer, UpdateAccountParams, UpdateEntryParams,
};
use super::store::{LedgerBackend, LedgerTx, Queries};

#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// `begin` never completes, like an exhausted pool
    StallBegin,
    AddAccountBalance,
    Commit,
    Rollback,
}

#[derive(Default)]
struct Faults {
    stall_begin: AtomicBool,
    add_account_balance: AtomicBool,
    commit: AtomicBool,
    rollback: AtomicBool,
}

impl Faults {
    fn flag(&self, fault: Fault) -> &AtomicBool {
        match fault {
            Fault::StallBegin => &self.stall_begin,
            Fault::AddAccountBalance => &self.add_account_balance,
            Fault::Commit => &self.commit,
            Fault::Rollback => &self.rollback,
        }
    }

    fn is_set(&self, fault: Fault) -> bool {
        self.flag(fault).load(Ordering::SeqCst)
    }
}

fn injected(fault: Fault) -> StoreError {
    StoreError::Backend(format!("injected {:?} failure", fault))
}

/// Delegates to an inner backend, failing the configured primitives
pub struct FaultyBackend {
    inner: Arc<dyn LedgerBackend>,
    faults: Arc<Faults>,
}

impl FaultyBackend {
    pub fn new(inner: Arc<dyn LedgerBackend>) -> Self {
        Self {
            inner,
            faults: Arc::new(Faults::default()),
        }
    }

    pub fn set_fault(&self, fault: Fault, enabled: bool) {
        self.faults.flag(fault).store(enabled, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerBackend for FaultyBackend {
    fn name(&self) -> &'static str {
        "faulty"
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        if self.faults.is_set(Fault::StallBegin) {
            std::future::pending::<()>().await;
        }
        Ok(Box::new(FaultyTx {
            inner: self.inner.begin().await?,
            faults: self.faults.clone(),
        }))
    }
}

struct FaultyTx {
    inner: Box<dyn LedgerTx>,
    faults: Arc<Faults>,
}

#[async_trait]
impl Queries for FaultyTx {
    async fn create_account(&mut self, arg: CreateAccountParams) -> Result<Account, StoreError> {
        self.inner.create_account(arg).await
    }

    async fn get_account(&mut self, id: i64) -> Result<Account, StoreError> {
        self.inner.get_account(id).await
    }

    async fn list_accounts(
        &mut self,
        arg: ListAccountsParams,
    ) -> Result<Vec<Account>, StoreError> {
        self.inner.list_accounts(arg).await
    }

    async fn update_account(&mut self, arg: UpdateAccountParams) -> Result<Account, StoreError> {
        self.inner.update_account(arg).await
    }

    async fn add_account_balance(
        &mut self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        if self.faults.is_set(Fault::AddAccountBalance) {
            return Err(injected(Fault::AddAccountBalance));
        }
        self.inner.add_account_balance(arg).await
    }

    async fn delete_account(&mut self, id: i64) -> Result<(), StoreError> {
        self.inner.delete_account(id).await
    }

    async fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, StoreError> {
        self.inner.create_entry(arg).await
    }

    async fn get_entry(&mut self, id: i64) -> Result<Entry, StoreError> {
        self.inner.get_entry(id).await
    }

    async fn list_entries(&mut self, arg: ListEntriesParams) -> Result<Vec<Entry>, StoreError> {
        self.inner.list_entries(arg).await
    }

    async fn update_entry(&mut self, arg: UpdateEntryParams) -> Result<Entry, StoreError> {
        self.inner.update_entry(arg).await
    }

    async fn create_transfer(
        &mut self,
        arg: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        self.inner.create_transfer(arg).await
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, StoreError> {
        self.inner.get_transfer(id).await
    }

    async fn list_transfers(
        &mut self,
        arg: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError> {
        self.inner.list_transfers(arg).await
    }
}

#[async_trait]
impl LedgerTx for FaultyTx {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.faults.is_set(Fault::Commit) {
            self.inner.rollback().await?;
            return Err(injected(Fault::Commit));
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        if self.faults.is_set(Fault::Rollback) {
            // Inner handle is dropped, which discards its writes
            return Err(injected(Fault::Rollback));
        }
        self.inner.rollback().await
    }
}
