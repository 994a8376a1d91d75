//! Health check handler

use std::sync::Arc;

use axum::extract::State;
use utoipa::ToSchema;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, ok};

/// Health check response data
#[derive(serde::Serialize, ToSchema)]
pub struct HealthResponse {
    /// Server timestamp in milliseconds
    #[schema(example = 1703494800000_i64)]
    pub timestamp_ms: i64,
    /// Ledger backend in use
    #[schema(example = "postgres")]
    pub backend: &'static str,
}

/// Health check endpoint
///
/// Opens and rolls back an empty transaction on the ledger backend.
/// Failure details go to the log only.
///
/// - Healthy: 200 OK + {code: 0, data: {timestamp_ms, backend}}
/// - Unhealthy: 503 Service Unavailable + {code: 5001, msg: "unavailable"}
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse, content_type = "application/json"),
        (status = 503, description = "Service unavailable")
    ),
    tag = "System"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    let backend = state.store().backend().name();
    if let Err(e) = state.store().ping().await {
        tracing::error!(backend, error = %e, "[HEALTH] Ledger backend ping failed");
        return Err(ApiError::service_unavailable("unavailable"));
    }
    ok(HealthResponse {
        timestamp_ms: chrono::Utc::now().timestamp_millis(),
        backend,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::types::error_codes;
    use crate::ledger::testing::{Fault, FaultyBackend};
    use crate::ledger::{MemoryBackend, OverdraftPolicy, Store, TransferEngine};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health_reports_unavailable_backend() {
        let backend = Arc::new(FaultyBackend::new(Arc::new(MemoryBackend::new())));
        backend.set_fault(Fault::Rollback, true);
        let engine = TransferEngine::new(Store::new(backend), OverdraftPolicy::Reject);
        let state = Arc::new(AppState::new(engine, None));

        match health_check(State(state)).await {
            Err(err) => {
                assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(err.code, error_codes::SERVICE_UNAVAILABLE);
            }
            Ok(_) => panic!("expected 503 from a failing backend"),
        }
    }
}
