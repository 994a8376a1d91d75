//! Simple Bank - ledger backend
//!
//! Accounts, double-entry ledger rows and atomic fund transfers.
//!
//! # Modules
//!
//! - [`ledger`] - store, transaction executor and transfer engine
//! - [`db`] - PostgreSQL pool and schema
//! - [`gateway`] - axum HTTP API
//! - [`config`] - YAML application config
//! - [`logging`] - tracing subscriber setup
//! - [`random`] - random owners, amounts and currencies

pub mod config;
pub mod db;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod random;

// Convenient re-exports at crate root
pub use ledger::{
    Account, Entry, LedgerError, MemoryBackend, OverdraftPolicy, PgBackend, Store, Transfer,
    TransferEngine, TransferTxParams, TransferTxResult, TxContext,
};
