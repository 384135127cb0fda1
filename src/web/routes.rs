use super::handlers::{healthz_handler, readyz_handler};
use crate::{
    auth::{callback_handler, login_handler, logout_handler, userinfo_handler},
    AppState,
};
use axum::{routing::get, Extension, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn create_router(state: Arc<AppState>) -> Router {
    let token_validator = state.client_app.token_validator();

    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .route("/auth/login", get(login_handler))
        .route("/auth/callback", get(callback_handler))
        // POST for form submission, GET for plain links
        .route("/auth/logout", get(logout_handler).post(logout_handler))
        .route("/auth/userinfo", get(userinfo_handler))
        .layer(Extension(token_validator))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
