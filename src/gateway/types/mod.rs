//! Gateway types module
//!
//! ## Input Types
//! - [`CreateAccountRequest`], [`CreateTransferRequest`]: JSON bodies
//! - [`IdPath`], [`PageQuery`]: path and query extractors
//!
//! ## Output Types
//! - [`ApiResponse<T>`]: Unified API response wrapper
//! - [`ApiError`]: handler error, rendered as `ApiResponse<()>`

pub mod request;
pub mod response;

pub use request::{CreateAccountRequest, CreateTransferRequest, IdPath, PageQuery};
pub use response::{ApiError, ApiResponse, ApiResult, error_codes, ok};
