//! Pure helper functions for authentication
//!
//! This module contains stateless helpers for HTTP clients, URL building,
//! cookie extraction, and redirect responses.

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use url::Url;

use super::error::GatewayError;
use super::jwt::is_jwt_expired;

// =============================================================================
// HTTP Client Builders
// =============================================================================

/// Create a reqwest client for provider calls using config timeouts
///
/// `insecure_skip_verify` disables certificate validation and must only be
/// set for local/test providers.
pub fn create_http_client(
    connect_timeout: Duration,
    request_timeout: Duration,
    insecure_skip_verify: bool,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none()) // Security: prevent SSRF
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .danger_accept_invalid_certs(insecure_skip_verify)
        .build()
}

// =============================================================================
// URL Builders
// =============================================================================

/// Build the provider end-session URL
///
/// Prefers `id_token_hint` when a non-expired ID token is available and
/// falls back to `client_id` otherwise.
pub fn build_end_session_url(
    end_session_endpoint: &Url,
    post_logout_redirect_uri: &str,
    client_id: &str,
    id_token: Option<&str>,
) -> String {
    let valid_id_token = id_token
        .filter(|t| !t.trim().is_empty())
        .filter(|t| {
            if is_jwt_expired(t) {
                tracing::info!("id_token expired, using client_id for end-session");
                false
            } else {
                true
            }
        });

    let hint = match valid_id_token {
        Some(id_token) => format!("id_token_hint={}", urlencoding::encode(id_token)),
        None => format!("client_id={}", urlencoding::encode(client_id)),
    };

    let separator = if end_session_endpoint.query().is_some() {
        '&'
    } else {
        '?'
    };

    format!(
        "{}{}{}&post_logout_redirect_uri={}",
        end_session_endpoint,
        separator,
        hint,
        urlencoding::encode(post_logout_redirect_uri)
    )
}

// =============================================================================
// Cookie Extraction
// =============================================================================

/// Extract a cookie value from headers
///
/// Handles multiple Cookie headers (some proxies fold/duplicate headers).
/// Uses `get_all` to collect all Cookie header values.
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);

    for header_value in headers.get_all(header::COOKIE) {
        if let Ok(cookie_str) = header_value.to_str() {
            if let Some(value) = cookie_str
                .split(';')
                .map(|c| c.trim())
                .find(|c| c.starts_with(&prefix))
                .and_then(|c| c.strip_prefix(&prefix))
            {
                return Some(value.to_string());
            }
        }
    }
    None
}

// =============================================================================
// Responses
// =============================================================================

/// Create a HeaderValue from a string without panicking on malformed input
pub fn header_value(s: &str) -> Result<HeaderValue, GatewayError> {
    HeaderValue::from_str(s).map_err(|e| {
        tracing::error!(
            error = %e,
            value_len = s.len(),
            "Failed to create header value - possible malformed token"
        );
        GatewayError::Internal(format!("invalid header value: {}", e))
    })
}

/// `302 Found` to `location`, setting each of `cookies`
pub fn found(location: &str, cookies: &[String]) -> Result<Response, GatewayError> {
    let mut response = StatusCode::FOUND.into_response();
    response
        .headers_mut()
        .insert(header::LOCATION, header_value(location)?);
    for cookie in cookies {
        response
            .headers_mut()
            .append(header::SET_COOKIE, header_value(cookie)?);
    }
    Ok(response)
}

// =============================================================================
// Tests
// =============================================================================
