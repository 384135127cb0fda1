//! Authentication handlers for login, callback, logout, and userinfo
//!
//! This module contains the Axum HTTP handlers for the OIDC flow:
//! - `login_handler`: validates `return_url` and redirects to the provider
//! - `callback_handler`: completes the code flow and returns to the destination
//! - `logout_handler`: clears the session and redirects to provider end-session
//! - `userinfo_handler`: claims of the current session

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::client::CallbackParams;
use super::error::GatewayError;
use super::extractors::SessionUser;
use super::helpers::found;
use super::session::{clear_session_cookies, join_session_cookie, SESSION_COOKIE_NAME};

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub return_url: Option<String>,
}

/// Login handler - initiates the OIDC authorization code flow
pub async fn login_handler(
    State(state): State<Arc<crate::AppState>>,
    Query(query): Query<LoginQuery>,
) -> Result<Response, GatewayError> {
    tracing::info!(has_return_url = query.return_url.is_some(), "Login requested");

    let redirect = state.client_app.login(query.return_url.as_deref()).await?;
    found(redirect.authorization_url.as_str(), &[])
}

/// Callback handler - handles the provider callback and token exchange
pub async fn callback_handler(
    State(state): State<Arc<crate::AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, GatewayError> {
    tracing::info!("OAuth callback received");

    let outcome = state.client_app.callback(params).await?;
    let cookies = state.client_app.session_cookies(&outcome.session)?;

    tracing::info!(
        sub = %outcome.session.claims.sub,
        user = %outcome.session.claims.display_name(),
        destination = %outcome.destination,
        session_cookies = cookies.len(),
        "Authentication successful, redirecting to original destination"
    );

    found(&outcome.destination, &cookies)
}

/// Logout handler - clears the session cookie and ends the provider session
pub async fn logout_handler(
    State(state): State<Arc<crate::AppState>>,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    // Do not log the token itself
    let id_token = join_session_cookie(&headers, SESSION_COOKIE_NAME);
    tracing::info!(
        event = "logout_start",
        has_session = id_token.is_some(),
        "Logout requested"
    );

    let target = state.client_app.logout_url(id_token.as_deref());
    let cookies = clear_session_cookies(
        &headers,
        SESSION_COOKIE_NAME,
        state.client_app.cookie_attributes(),
    );

    tracing::info!(
        event = "session_cookie_cleared",
        cleared = cookies.len(),
        "Cleared session cookie"
    );

    found(&target, &cookies)
}

/// Userinfo handler - returns the claims of the current session
pub async fn userinfo_handler(SessionUser { claims }: SessionUser) -> impl IntoResponse {
    Json(claims)
}
