//! Ledger core
//!
//! - [`models`] - account / entry / transfer rows and primitive parameters
//! - [`error`] - store and ledger error kinds
//! - [`context`] - per-call cancellation and deadline
//! - [`store`] - transaction executor over a pluggable backend
//! - [`transfer`] - the fund-transfer engine
//! - [`postgres`] - PostgreSQL backend (sqlx)
//! - [`memory`] - in-process backend with simulated row locks

pub mod context;
pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;
pub mod transfer;

#[cfg(test)]
pub mod testing;

pub use context::TxContext;
pub use error::{CancelReason, LedgerError, StoreError, ValidationError};
pub use memory::MemoryBackend;
pub use models::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, ListAccountsParams, ListEntriesParams, ListTransfersParams,
    SUPPORTED_CURRENCIES, Transfer, TransferTxParams, TransferTxResult, UpdateAccountParams,
    UpdateEntryParams, is_supported_currency,
};
pub use postgres::PgBackend;
pub use store::{LedgerBackend, LedgerTx, Queries, Store, TxHandle};
pub use transfer::{OverdraftPolicy, TransferEngine};
