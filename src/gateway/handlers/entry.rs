//! Entry handlers

use std::sync::Arc;

use axum::extract::{Path, State, rejection::PathRejection};
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, IdPath, ok};
use crate::ledger::Entry;

/// Get entry endpoint
///
/// GET /api/v1/entries/{id}
#[utoipa::path(
    get,
    path = "/api/v1/entries/{id}",
    params(
        ("id" = i64, Path, description = "Entry ID")
    ),
    responses(
        (status = 200, description = "Entry", body = Entry, content_type = "application/json"),
        (status = 400, description = "Invalid entry ID"),
        (status = 404, description = "Entry not found")
    ),
    tag = "Account"
)]
pub async fn get_entry(
    State(state): State<Arc<AppState>>,
    path: Result<Path<IdPath>, PathRejection>,
) -> ApiResult<Entry> {
    let Path(path) = path.map_err(|e| ApiError::bad_request(e.body_text()))?;
    path.validate()?;

    let entry = state.store().get_entry(&state.request_ctx(), path.id).await?;
    ok(entry)
}
