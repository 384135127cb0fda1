//! Error type for the authentication gateway
//!
//! Every variant maps to a fixed, generic client response. Detail strings are
//! for server-side logs only and never leave the process.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Why a token exchange with the provider failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeFailure {
    /// Provider answered with an OAuth2 error (bad code, redirect_uri mismatch, ...)
    #[error("rejected by provider: {0}")]
    Rejected(String),
    /// Provider unreachable, timed out, or answered with garbage
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid redirect destination: {0}")]
    InvalidRedirect(String),

    #[error("login state mismatch: {0}")]
    StateMismatch(String),

    #[error("provider denied authorization: {0}")]
    ProviderDenied(String),

    #[error("callback is missing the authorization code")]
    MissingCode,

    #[error("token exchange failed: {0}")]
    TokenExchange(ExchangeFailure),

    #[error("token validation failed: {0}")]
    TokenValidation(String),

    #[error("state store error: {0}")]
    StateStore(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRedirect(_) | GatewayError::MissingCode => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::StateMismatch(_)
            | GatewayError::ProviderDenied(_)
            | GatewayError::TokenValidation(_) => StatusCode::UNAUTHORIZED,
            GatewayError::TokenExchange(ExchangeFailure::Rejected(_)) => StatusCode::BAD_REQUEST,
            GatewayError::TokenExchange(ExchangeFailure::Unavailable(_)) => StatusCode::BAD_GATEWAY,
            GatewayError::Configuration(_)
            | GatewayError::StateStore(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for the client response
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Configuration(_) => "CONFIGURATION_ERROR",
            GatewayError::InvalidRedirect(_) => "INVALID_REDIRECT",
            GatewayError::StateMismatch(_) => "STATE_MISMATCH",
            GatewayError::ProviderDenied(_) => "ACCESS_DENIED",
            GatewayError::MissingCode => "MISSING_CODE",
            GatewayError::TokenExchange(_) => "TOKEN_EXCHANGE_FAILED",
            GatewayError::TokenValidation(_) => "TOKEN_INVALID",
            GatewayError::StateStore(_) | GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            GatewayError::InvalidRedirect(_) => "Invalid return_url",
            GatewayError::StateMismatch(_) => "Login session expired or invalid, please log in again",
            GatewayError::ProviderDenied(_) => "Authorization was denied",
            GatewayError::MissingCode => "Missing authorization code",
            GatewayError::TokenExchange(_) => "Login failed",
            GatewayError::TokenValidation(_) => "Login failed",
            GatewayError::Configuration(_)
            | GatewayError::StateStore(_)
            | GatewayError::Internal(_) => "Internal server error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(json!({
                "error": self.public_message(),
                "code": self.code(),
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GatewayError::InvalidRedirect("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::StateMismatch("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::TokenExchange(ExchangeFailure::Rejected("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::TokenExchange(ExchangeFailure::Unavailable("x".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::TokenValidation("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_exchange_failure_messages() {
        let rejected = GatewayError::TokenExchange(ExchangeFailure::Rejected("invalid_grant".into()));
        assert_eq!(
            rejected.to_string(),
            "token exchange failed: rejected by provider: invalid_grant"
        );
        assert_eq!(
            ExchangeFailure::Unavailable("timed out".into()).to_string(),
            "provider unavailable: timed out"
        );
    }

    #[tokio::test]
    async fn test_response_hides_detail() {
        let response = GatewayError::TokenExchange(ExchangeFailure::Rejected(
            "invalid_grant: code already used at https://idp.internal".into(),
        ))
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("TOKEN_EXCHANGE_FAILED"));
        assert!(!text.contains("invalid_grant"));
        assert!(!text.contains("idp.internal"));
    }
}
