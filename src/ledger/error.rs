//! Ledger Error Types
//!
//! Two layers:
//! - [`StoreError`]: what a single store primitive can report
//! - [`LedgerError`]: what a transaction or a transfer surfaces to callers,
//!   tagged by kind so callers branch on the variant instead of the message

use thiserror::Error;

/// PostgreSQL SQLSTATE for `serialization_failure`
const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";
/// PostgreSQL SQLSTATE for `deadlock_detected`
const SQLSTATE_DEADLOCK_DETECTED: &str = "40P01";

/// Error reported by a store primitive
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("no rows in result set")]
    NotFound,

    /// Transient conflict reported by the backend (serialization / deadlock)
    #[error("transaction conflict: {0}")]
    Contention(String),

    #[error("database error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = e {
            return StoreError::NotFound;
        }
        if let Some(db_err) = e.as_database_error()
            && let Some(code) = db_err.code()
            && (code == SQLSTATE_SERIALIZATION_FAILURE || code == SQLSTATE_DEADLOCK_DETECTED)
        {
            return StoreError::Contention(db_err.message().to_string());
        }
        StoreError::Backend(e.to_string())
    }
}

/// Why a request was rejected before touching the store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("amount must be greater than zero, got {0}")]
    InvalidAmount(i64),

    #[error("source and target account cannot be the same (account {0})")]
    SameAccount(i64),

    #[error("invalid account id {0}")]
    InvalidAccountId(i64),

    #[error("currency mismatch: account {from_account_id} is {from_currency}, account {to_account_id} is {to_currency}")]
    CurrencyMismatch {
        from_account_id: i64,
        from_currency: String,
        to_account_id: i64,
        to_currency: String,
    },
}

/// Why a transaction stopped before commit on the caller's request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Cancelled,
    DeadlineExceeded,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Cancelled => write!(f, "context canceled"),
            CancelReason::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

/// Error surfaced by the transaction executor and the transfer engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("insufficient funds: account {account_id} balance would become {balance}")]
    InsufficientFunds { account_id: i64, balance: i64 },

    /// Backend-level conflict; the whole call may be retried
    #[error("transaction conflict: {0}")]
    Contention(String),

    #[error("store error: {0}")]
    Backend(String),

    #[error("transaction cancelled: {0}")]
    Cancelled(CancelReason),

    /// The unit of work failed and so did the rollback
    #[error("tx err: {source}, rb err: {rollback}")]
    RollbackFailed {
        source: Box<LedgerError>,
        rollback: StoreError,
    },
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => LedgerError::NotFound("row".to_string()),
            StoreError::Contention(msg) => LedgerError::Contention(msg),
            StoreError::Backend(msg) => LedgerError::Backend(msg),
        }
    }
}

impl LedgerError {
    /// Map a lookup failure to a not-found naming the missing row
    pub fn lookup(e: StoreError, entity: &str, id: i64) -> Self {
        match e {
            StoreError::NotFound => LedgerError::NotFound(format!("{} {}", entity, id)),
            other => other.into(),
        }
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "VALIDATION_FAILED",
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::Contention(_) => "TRANSACTION_CONFLICT",
            LedgerError::Backend(_) => "STORE_ERROR",
            LedgerError::Cancelled(_) => "CANCELLED",
            LedgerError::RollbackFailed { .. } => "ROLLBACK_FAILED",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::Validation(_) => 400,
            LedgerError::NotFound(_) => 404,
            LedgerError::InsufficientFunds { .. } => 422,
            LedgerError::Contention(_)
            | LedgerError::Backend(_)
            | LedgerError::Cancelled(_)
            | LedgerError::RollbackFailed { .. } => 500,
        }
    }

    /// Whether re-invoking the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Contention(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert_eq!(StoreError::from(sqlx::Error::RowNotFound), StoreError::NotFound);
    }

    #[test]
    fn test_other_sqlx_errors_map_to_backend() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn test_lookup_names_missing_row() {
        let err = LedgerError::lookup(StoreError::NotFound, "account", 42);
        assert_eq!(err, LedgerError::NotFound("account 42".to_string()));
        assert_eq!(err.to_string(), "account 42 not found");

        let err = LedgerError::lookup(StoreError::Backend("boom".into()), "account", 42);
        assert_eq!(err, LedgerError::Backend("boom".to_string()));
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(LedgerError::from(ValidationError::InvalidAmount(0)).http_status(), 400);
        assert_eq!(LedgerError::NotFound("account 1".into()).http_status(), 404);
        assert_eq!(
            LedgerError::InsufficientFunds {
                account_id: 1,
                balance: -5
            }
            .http_status(),
            422
        );
        assert_eq!(LedgerError::Backend("x".into()).http_status(), 500);
        assert_eq!(LedgerError::Cancelled(CancelReason::Cancelled).http_status(), 500);
    }

    #[test]
    fn test_only_contention_is_retryable() {
        assert!(LedgerError::from(StoreError::Contention("40P01".into())).is_retryable());
        assert!(!LedgerError::Backend("x".into()).is_retryable());
        assert!(!LedgerError::NotFound("x".into()).is_retryable());
    }

    #[test]
    fn test_rollback_failed_reports_both_causes() {
        let err = LedgerError::RollbackFailed {
            source: Box::new(LedgerError::Backend("insert failed".into())),
            rollback: StoreError::Backend("connection reset".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("insert failed"));
        assert!(msg.contains("connection reset"));
        assert_eq!(err.code(), "ROLLBACK_FAILED");
    }
}
