use std::time::Duration;

use crate::ledger::{Store, TransferEngine, TxContext};

/// Gateway application state (shared)
#[derive(Clone)]
pub struct AppState {
    /// Transfer engine, which also owns the ledger store
    pub engine: TransferEngine,
    /// Per-request transaction deadline
    pub tx_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(engine: TransferEngine, tx_timeout: Option<Duration>) -> Self {
        Self { engine, tx_timeout }
    }

    pub fn store(&self) -> &Store {
        self.engine.store()
    }

    /// Fresh context for one request
    pub fn request_ctx(&self) -> TxContext {
        let ctx = TxContext::background();
        match self.tx_timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        }
    }
}
