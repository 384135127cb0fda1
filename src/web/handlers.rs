use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use std::sync::Arc;

/// Liveness probe - always returns OK if the process is running
pub async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe - checks that provider signing keys are loaded
///
/// Keys are fetched once during startup and never refreshed.
pub async fn readyz_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.client_app.token_validator().has_keys() {
        (StatusCode::OK, "ready")
    } else {
        tracing::warn!("Readiness check failed: no signing keys loaded");
        (StatusCode::SERVICE_UNAVAILABLE, "not ready: no signing keys")
    }
}
