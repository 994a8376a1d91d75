//! Account handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::{JsonRejection, PathRejection, QueryRejection}},
};
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{
    ApiError, ApiResult, CreateAccountRequest, IdPath, PageQuery, ok,
};
use crate::ledger::{Account, CreateAccountParams, Entry, ListAccountsParams, ListEntriesParams};

/// Create account endpoint
///
/// POST /api/v1/accounts
///
/// New accounts always start with a zero balance.
#[utoipa::path(
    post,
    path = "/api/v1/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 200, description = "Account created", body = Account, content_type = "application/json"),
        (status = 400, description = "Invalid parameters")
    ),
    tag = "Account"
)]
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> ApiResult<Account> {
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    req.validate()?;

    let account = state
        .store()
        .create_account(
            &state.request_ctx(),
            CreateAccountParams {
                owner: req.owner,
                balance: 0,
                currency: req.currency,
            },
        )
        .await?;
    tracing::info!(account_id = account.id, currency = %account.currency, "Account created");
    ok(account)
}

/// Get account endpoint
///
/// GET /api/v1/accounts/{id}
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{id}",
    params(
        ("id" = i64, Path, description = "Account ID")
    ),
    responses(
        (status = 200, description = "Account", body = Account, content_type = "application/json"),
        (status = 400, description = "Invalid account ID"),
        (status = 404, description = "Account not found")
    ),
    tag = "Account"
)]
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    path: Result<Path<IdPath>, PathRejection>,
) -> ApiResult<Account> {
    let Path(path) = path.map_err(|e| ApiError::bad_request(e.body_text()))?;
    path.validate()?;

    let account = state
        .store()
        .get_account(&state.request_ctx(), path.id)
        .await?;
    ok(account)
}

/// List accounts endpoint
///
/// GET /api/v1/accounts?page=&limit=
#[utoipa::path(
    get,
    path = "/api/v1/accounts",
    params(PageQuery),
    responses(
        (status = 200, description = "Accounts ordered by id", body = [Account], content_type = "application/json"),
        (status = 400, description = "Invalid page")
    ),
    tag = "Account"
)]
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Vec<Account>> {
    let Query(page) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    page.validate()?;

    let accounts = state
        .store()
        .list_accounts(
            &state.request_ctx(),
            ListAccountsParams {
                limit: page.limit,
                offset: page.offset(),
            },
        )
        .await?;
    ok(accounts)
}

/// List entries of one account
///
/// GET /api/v1/accounts/{id}/entries?page=&limit=
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{id}/entries",
    params(
        ("id" = i64, Path, description = "Account ID"),
        PageQuery
    ),
    responses(
        (status = 200, description = "Entries ordered by id", body = [Entry], content_type = "application/json"),
        (status = 400, description = "Invalid account ID or page"),
        (status = 404, description = "Account not found")
    ),
    tag = "Account"
)]
pub async fn list_account_entries(
    State(state): State<Arc<AppState>>,
    path: Result<Path<IdPath>, PathRejection>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Vec<Entry>> {
    let Path(path) = path.map_err(|e| ApiError::bad_request(e.body_text()))?;
    path.validate()?;
    let Query(page) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    page.validate()?;

    let ctx = state.request_ctx();
    // 404 for unknown accounts rather than an empty page
    state.store().get_account(&ctx, path.id).await?;
    let entries = state
        .store()
        .list_entries(
            &ctx,
            ListEntriesParams {
                account_id: path.id,
                limit: page.limit,
                offset: page.offset(),
            },
        )
        .await?;
    ok(entries)
}
