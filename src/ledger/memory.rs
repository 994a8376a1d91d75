//! In-process ledger backend
//!
//! Mirrors the PostgreSQL backend's transactional behaviour without a server:
//!
//! - Writes are staged inside the transaction and published on commit, so
//!   other transactions only ever observe committed rows (read committed)
//! - Updating an account or entry takes that row's lock (an async mutex keyed
//!   by id) and keeps it until commit / rollback / drop (two-phase locking)
//! - Inserting an entry or transfer takes a shared key lock on every account
//!   it references; deleting an account takes that key lock exclusively, so a
//!   delete waits for uncommitted references the way a foreign key does.
//!   Balance updates never touch the key lock.
//! - A lock wait longer than `lock_timeout` fails with
//!   [`StoreError::Contention`], standing in for the server's deadlock detector
//! - Lock table entries are dropped once nobody holds or waits on them

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{
    Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock,
};
use tracing::warn;

use super::error::StoreError;
use super::models::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, ListAccountsParams, ListEntriesParams, ListTransfersParams,
    Transfer, UpdateAccountParams, UpdateEntryParams,
};
use super::store::{LedgerBackend, LedgerTx, Queries};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<i64, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Account(i64),
    Entry(i64),
}

struct MemoryState {
    tables: RwLock<Tables>,
    row_locks: DashMap<RowKey, Arc<Mutex<()>>>,
    /// Per-account key locks, see module docs
    key_locks: DashMap<i64, Arc<RwLock<()>>>,
    account_seq: AtomicI64,
    entry_seq: AtomicI64,
    transfer_seq: AtomicI64,
    lock_timeout: Duration,
}

/// In-process backend, one shared state per instance
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            state: Arc::new(MemoryState {
                tables: RwLock::new(Tables::default()),
                row_locks: DashMap::new(),
                key_locks: DashMap::new(),
                account_seq: AtomicI64::new(1),
                entry_seq: AtomicI64::new(1),
                transfer_seq: AtomicI64::new(1),
                lock_timeout,
            }),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        Ok(Box::new(MemoryTx {
            state: self.state.clone(),
            row_guards: HashMap::new(),
            shared_keys: HashMap::new(),
            exclusive_keys: HashMap::new(),
            accounts: BTreeMap::new(),
            entries: BTreeMap::new(),
            transfers: BTreeMap::new(),
        }))
    }
}

/// Open transaction on a [`MemoryBackend`]
pub struct MemoryTx {
    state: Arc<MemoryState>,
    row_guards: HashMap<RowKey, OwnedMutexGuard<()>>,
    shared_keys: HashMap<i64, OwnedRwLockReadGuard<()>>,
    exclusive_keys: HashMap<i64, OwnedRwLockWriteGuard<()>>,
    /// `None` marks a deleted account
    accounts: BTreeMap<i64, Option<Account>>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
}

impl MemoryTx {
    async fn lock_row(&mut self, key: RowKey) -> Result<(), StoreError> {
        if self.row_guards.contains_key(&key) {
            return Ok(());
        }
        let lock = self.state.row_locks.entry(key).or_default().clone();
        match tokio::time::timeout(self.state.lock_timeout, lock.lock_owned()).await {
            Ok(guard) => {
                self.row_guards.insert(key, guard);
                Ok(())
            }
            Err(_) => {
                prune(&self.state.row_locks, &key);
                warn!(row = ?key, "Row lock wait timed out");
                Err(StoreError::Contention(format!(
                    "lock wait timeout on {:?}",
                    key
                )))
            }
        }
    }

    /// Shared key lock on a referenced account, held until the transaction ends
    async fn share_key(&mut self, account_id: i64) -> Result<(), StoreError> {
        if self.shared_keys.contains_key(&account_id)
            || self.exclusive_keys.contains_key(&account_id)
        {
            return Ok(());
        }
        let lock = self.state.key_locks.entry(account_id).or_default().clone();
        match tokio::time::timeout(self.state.lock_timeout, lock.read_owned()).await {
            Ok(guard) => {
                self.shared_keys.insert(account_id, guard);
                Ok(())
            }
            Err(_) => {
                prune(&self.state.key_locks, &account_id);
                warn!(account_id, "Key share lock wait timed out");
                Err(StoreError::Contention(format!(
                    "lock wait timeout on account {} key",
                    account_id
                )))
            }
        }
    }

    /// Exclusive key lock, waits for every transaction referencing the account
    async fn lock_key(&mut self, account_id: i64) -> Result<(), StoreError> {
        if self.exclusive_keys.contains_key(&account_id) {
            return Ok(());
        }
        // Upgrade: our own share would block the write side
        self.shared_keys.remove(&account_id);
        let lock = self.state.key_locks.entry(account_id).or_default().clone();
        match tokio::time::timeout(self.state.lock_timeout, lock.write_owned()).await {
            Ok(guard) => {
                self.exclusive_keys.insert(account_id, guard);
                Ok(())
            }
            Err(_) => {
                prune(&self.state.key_locks, &account_id);
                warn!(account_id, "Key lock wait timed out");
                Err(StoreError::Contention(format!(
                    "lock wait timeout on account {} key",
                    account_id
                )))
            }
        }
    }

    fn release_locks(&mut self) {
        let rows: Vec<RowKey> = self.row_guards.keys().copied().collect();
        let keys: Vec<i64> = self
            .shared_keys
            .keys()
            .chain(self.exclusive_keys.keys())
            .copied()
            .collect();
        self.row_guards.clear();
        self.shared_keys.clear();
        self.exclusive_keys.clear();
        for key in &rows {
            prune(&self.state.row_locks, key);
        }
        for id in &keys {
            prune(&self.state.key_locks, id);
        }
    }

    async fn account_view(&self, id: i64) -> Option<Account> {
        if let Some(staged) = self.accounts.get(&id) {
            return staged.clone();
        }
        self.state.tables.read().await.accounts.get(&id).cloned()
    }

    async fn entry_view(&self, id: i64) -> Option<Entry> {
        if let Some(staged) = self.entries.get(&id) {
            return Some(staged.clone());
        }
        self.state.tables.read().await.entries.get(&id).cloned()
    }

    async fn transfer_view(&self, id: i64) -> Option<Transfer> {
        if let Some(staged) = self.transfers.get(&id) {
            return Some(staged.clone());
        }
        self.state.tables.read().await.transfers.get(&id).cloned()
    }

    async fn merged_accounts(&self) -> Vec<Account> {
        let mut rows = self.state.tables.read().await.accounts.clone();
        for (id, staged) in &self.accounts {
            match staged {
                Some(account) => {
                    rows.insert(*id, account.clone());
                }
                None => {
                    rows.remove(id);
                }
            }
        }
        rows.into_values().collect()
    }

    async fn merged_entries(&self) -> Vec<Entry> {
        let mut rows = self.state.tables.read().await.entries.clone();
        rows.extend(self.entries.iter().map(|(id, e)| (*id, e.clone())));
        rows.into_values().collect()
    }

    async fn merged_transfers(&self) -> Vec<Transfer> {
        let mut rows = self.state.tables.read().await.transfers.clone();
        rows.extend(self.transfers.iter().map(|(id, t)| (*id, t.clone())));
        rows.into_values().collect()
    }

    async fn require_account(&mut self, id: i64, table: &str) -> Result<(), StoreError> {
        self.share_key(id).await?;
        if self.account_view(id).await.is_none() {
            return Err(StoreError::Backend(format!(
                "insert or update on table \"{}\" violates foreign key constraint: account {} does not exist",
                table, id
            )));
        }
        Ok(())
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        self.release_locks();
    }
}

/// Drop a lock table entry nobody holds or waits on
fn prune<K: Eq + Hash, L>(locks: &DashMap<K, Arc<L>>, key: &K) {
    locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
}

fn page<T>(rows: impl Iterator<Item = T>, limit: i64, offset: i64) -> Vec<T> {
    rows.skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl Queries for MemoryTx {
    async fn create_account(&mut self, arg: CreateAccountParams) -> Result<Account, StoreError> {
        let account = Account {
            id: self.state.account_seq.fetch_add(1, Ordering::SeqCst),
            owner: arg.owner,
            balance: arg.balance,
            currency: arg.currency,
            created_at: Utc::now(),
        };
        self.accounts.insert(account.id, Some(account.clone()));
        Ok(account)
    }

    async fn get_account(&mut self, id: i64) -> Result<Account, StoreError> {
        self.account_view(id).await.ok_or(StoreError::NotFound)
    }

    async fn list_accounts(
        &mut self,
        arg: ListAccountsParams,
    ) -> Result<Vec<Account>, StoreError> {
        let rows = self.merged_accounts().await;
        Ok(page(rows.into_iter(), arg.limit, arg.offset))
    }

    async fn update_account(&mut self, arg: UpdateAccountParams) -> Result<Account, StoreError> {
        self.lock_row(RowKey::Account(arg.id)).await?;
        let mut account = self
            .account_view(arg.id)
            .await
            .ok_or(StoreError::NotFound)?;
        account.balance = arg.balance;
        self.accounts.insert(arg.id, Some(account.clone()));
        Ok(account)
    }

    async fn add_account_balance(
        &mut self,
        arg: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        self.lock_row(RowKey::Account(arg.id)).await?;
        let mut account = self
            .account_view(arg.id)
            .await
            .ok_or(StoreError::NotFound)?;
        account.balance = account
            .balance
            .checked_add(arg.amount)
            .ok_or_else(|| StoreError::Backend("bigint out of range".to_string()))?;
        self.accounts.insert(arg.id, Some(account.clone()));
        Ok(account)
    }

    async fn delete_account(&mut self, id: i64) -> Result<(), StoreError> {
        self.lock_key(id).await?;
        self.lock_row(RowKey::Account(id)).await?;
        if self.account_view(id).await.is_none() {
            return Err(StoreError::NotFound);
        }
        let referenced = self
            .merged_entries()
            .await
            .iter()
            .any(|e| e.account_id == id)
            || self
                .merged_transfers()
                .await
                .iter()
                .any(|t| t.from_account_id == id || t.to_account_id == id);
        if referenced {
            return Err(StoreError::Backend(format!(
                "delete on table \"accounts\" violates foreign key constraint: account {} is still referenced",
                id
            )));
        }
        self.accounts.insert(id, None);
        Ok(())
    }

    async fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, StoreError> {
        self.require_account(arg.account_id, "entries").await?;
        let entry = Entry {
            id: self.state.entry_seq.fetch_add(1, Ordering::SeqCst),
            account_id: arg.account_id,
            amount: arg.amount,
            created_at: Utc::now(),
        };
        self.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn get_entry(&mut self, id: i64) -> Result<Entry, StoreError> {
        self.entry_view(id).await.ok_or(StoreError::NotFound)
    }

    async fn list_entries(&mut self, arg: ListEntriesParams) -> Result<Vec<Entry>, StoreError> {
        let rows = self.merged_entries().await;
        Ok(page(
            rows.into_iter().filter(|e| e.account_id == arg.account_id),
            arg.limit,
            arg.offset,
        ))
    }

    async fn update_entry(&mut self, arg: UpdateEntryParams) -> Result<Entry, StoreError> {
        self.lock_row(RowKey::Entry(arg.id)).await?;
        let mut entry = self.entry_view(arg.id).await.ok_or(StoreError::NotFound)?;
        entry.amount = arg.amount;
        self.entries.insert(arg.id, entry.clone());
        Ok(entry)
    }

    async fn create_transfer(
        &mut self,
        arg: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        if arg.amount <= 0 {
            return Err(StoreError::Backend(
                "new row for relation \"transfers\" violates check constraint \"transfers_amount_check\""
                    .to_string(),
            ));
        }
        self.require_account(arg.from_account_id, "transfers").await?;
        self.require_account(arg.to_account_id, "transfers").await?;
        let transfer = Transfer {
            id: self.state.transfer_seq.fetch_add(1, Ordering::SeqCst),
            from_account_id: arg.from_account_id,
            to_account_id: arg.to_account_id,
            amount: arg.amount,
            created_at: Utc::now(),
        };
        self.transfers.insert(transfer.id, transfer.clone());
        Ok(transfer)
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, StoreError> {
        self.transfer_view(id).await.ok_or(StoreError::NotFound)
    }

    async fn list_transfers(
        &mut self,
        arg: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError> {
        let rows = self.merged_transfers().await;
        Ok(page(
            rows.into_iter().filter(|t| {
                t.from_account_id == arg.from_account_id || t.to_account_id == arg.to_account_id
            }),
            arg.limit,
            arg.offset,
        ))
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        let accounts = std::mem::take(&mut self.accounts);
        let entries = std::mem::take(&mut self.entries);
        let transfers = std::mem::take(&mut self.transfers);

        {
            let mut tables = self.state.tables.write().await;
            for (id, staged) in accounts {
                match staged {
                    Some(account) => {
                        tables.accounts.insert(id, account);
                    }
                    None => {
                        tables.accounts.remove(&id);
                    }
                }
            }
            tables.entries.extend(entries);
            tables.transfers.extend(transfers);
        }

        // Locks are released only once the new values are published
        self.release_locks();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
