//! Per-call cancellation and deadline

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::{CancelReason, LedgerError};

/// Cancellation scope handed to every ledger transaction
///
/// Cloning shares the same token; cancelling any clone cancels all of them.
#[derive(Debug, Clone, Default)]
pub struct TxContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl TxContext {
    /// Context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// Context bound to an external cancellation token
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Copy of this context that also expires after `timeout`
    ///
    /// An earlier existing deadline is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing <= candidate => existing,
            _ => candidate,
        };
        Self {
            token: self.token.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Err` when the context has already fired
    pub fn check(&self) -> Result<(), LedgerError> {
        if self.token.is_cancelled() {
            return Err(LedgerError::Cancelled(CancelReason::Cancelled));
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(LedgerError::Cancelled(CancelReason::DeadlineExceeded));
        }
        Ok(())
    }

    /// Drive `work` until it completes or the context fires
    ///
    /// When the context fires first, `work` is dropped before returning.
    pub async fn run<T, F>(&self, work: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(LedgerError::Cancelled(CancelReason::Cancelled)),
            _ = expired => Err(LedgerError::Cancelled(CancelReason::DeadlineExceeded)),
            res = work => res,
        }
    }
}
