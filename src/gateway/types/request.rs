//! Request DTOs
//!
//! Field rules are declared with `validator`; handlers call `validate()`
//! before touching the ledger.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::ledger::{TransferTxParams, is_supported_currency};

fn validate_currency(currency: &str) -> Result<(), validator::ValidationError> {
    if is_supported_currency(currency) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("unsupported_currency"))
    }
}

/// POST /api/v1/accounts
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAccountRequest {
    #[validate(length(min = 1))]
    #[schema(example = "alice")]
    pub owner: String,
    /// One of USD, EUR, IDR
    #[validate(custom(function = "validate_currency"))]
    #[schema(example = "USD")]
    pub currency: String,
}

/// `{id}` path segment
#[derive(Debug, Deserialize, Validate)]
pub struct IdPath {
    #[validate(range(min = 1))]
    pub id: i64,
}

/// Page selection for list endpoints
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number
    #[validate(range(min = 1))]
    pub page: i64,
    /// Rows per page, 5 to 30
    #[validate(range(min = 5, max = 30))]
    pub limit: i64,
}

impl PageQuery {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// POST /api/v1/transfers
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTransferRequest {
    #[validate(range(min = 1))]
    #[schema(example = 1)]
    pub from_account_id: i64,
    #[validate(range(min = 1))]
    #[schema(example = 2)]
    pub to_account_id: i64,
    /// Minor units, strictly positive
    #[validate(range(min = 1))]
    #[schema(example = 10)]
    pub amount: i64,
}

impl From<CreateTransferRequest> for TransferTxParams {
    fn from(req: CreateTransferRequest) -> Self {
        TransferTxParams {
            from_account_id: req.from_account_id,
            to_account_id: req.to_account_id,
            amount: req.amount,
        }
    }
}
