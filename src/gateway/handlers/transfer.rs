//! Transfer handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::{JsonRejection, PathRejection}},
};
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, CreateTransferRequest, IdPath, ok};
use crate::ledger::{Transfer, TransferTxResult};

/// Create transfer endpoint
///
/// POST /api/v1/transfers
///
/// Runs one transfer transaction. Contention is not retried here; the
/// response code tells the client whether a retry may succeed.
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    request_body = CreateTransferRequest,
    responses(
        (status = 200, description = "Transfer committed", body = TransferTxResult, content_type = "application/json"),
        (status = 400, description = "Invalid parameters or currency mismatch"),
        (status = 404, description = "Account not found"),
        (status = 422, description = "Insufficient funds"),
        (status = 500, description = "Store failure or transaction conflict")
    ),
    tag = "Transfer"
)]
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateTransferRequest>, JsonRejection>,
) -> ApiResult<TransferTxResult> {
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    req.validate()?;

    let result = state
        .engine
        .transfer_funds(&state.request_ctx(), req.into())
        .await?;
    ok(result)
}

/// Get transfer endpoint
///
/// GET /api/v1/transfers/{id}
#[utoipa::path(
    get,
    path = "/api/v1/transfers/{id}",
    params(
        ("id" = i64, Path, description = "Transfer ID")
    ),
    responses(
        (status = 200, description = "Transfer", body = Transfer, content_type = "application/json"),
        (status = 400, description = "Invalid transfer ID"),
        (status = 404, description = "Transfer not found")
    ),
    tag = "Transfer"
)]
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    path: Result<Path<IdPath>, PathRejection>,
) -> ApiResult<Transfer> {
    let Path(path) = path.map_err(|e| ApiError::bad_request(e.body_text()))?;
    path.validate()?;

    let transfer = state
        .store()
        .get_transfer(&state.request_ctx(), path.id)
        .await?;
    ok(transfer)
}
