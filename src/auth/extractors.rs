use crate::auth::jwt::{IdTokenClaims, IdTokenValidator};
use crate::auth::session::{join_session_cookie, SESSION_COOKIE_NAME};
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Rejection for requests without a usable session
#[derive(Debug)]
pub enum AuthError {
    Unauthenticated(String),
    Internal(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::Unauthenticated(msg) => {
                tracing::debug!(reason = %msg, "Session rejected");
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({
                        "error": "Authentication required",
                        "code": "UNAUTHENTICATED"
                    })),
                )
                    .into_response()
            }

            AuthError::Internal(msg) => {
                tracing::error!(reason = %msg, "Session extraction failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error",
                        "code": "INTERNAL_ERROR"
                    })),
                )
                    .into_response()
            }
        }
    }
}

/// Session user extractor - validates the ID token from the session cookie
///
/// Usage:
/// ```rust,ignore
/// async fn handler(SessionUser { claims }: SessionUser) {
///     println!("User: {}", claims.sub);
/// }
/// ```
pub struct SessionUser {
    pub claims: IdTokenClaims,
}

impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // 1. Reassemble the (possibly split) session cookie
        let token = join_session_cookie(&parts.headers, SESSION_COOKIE_NAME).ok_or_else(|| {
            AuthError::Unauthenticated("Missing session cookie".to_string())
        })?;

        // 2. Get IdTokenValidator from extensions
        let validator = parts
            .extensions
            .get::<Arc<IdTokenValidator>>()
            .ok_or_else(|| AuthError::Internal("Missing IdTokenValidator extension".to_string()))?;

        // 3. Validate signature and claims
        let claims = validator
            .validate(&token)
            .map_err(|e| AuthError::Unauthenticated(format!("Invalid session: {}", e)))?;

        tracing::debug!(user = %claims.sub, "User authenticated via session cookie");

        Ok(SessionUser { claims })
    }
}
