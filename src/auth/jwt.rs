use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{decode, decode_header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::discovery::SigningKeys;
use super::error::GatewayError;

/// Claims the gateway reads from a provider-issued ID token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    pub iss: String,
    pub exp: u64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl IdTokenClaims {
    /// Best human-readable identifier for logs and UI
    pub fn display_name(&self) -> &str {
        self.preferred_username
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.sub)
    }
}

pub struct IdTokenValidator {
    /// Issuer as reported by discovery
    expected_issuer: String,
    /// Expected audience (the client_id)
    expected_audience: String,
    keys: SigningKeys,
}

impl IdTokenValidator {
    pub fn new(expected_issuer: String, expected_audience: String, keys: SigningKeys) -> Self {
        tracing::info!(
            expected_issuer = %expected_issuer,
            expected_audience = %expected_audience,
            key_count = keys.len(),
            "ID token validator initialized with issuer and audience validation"
        );

        Self {
            expected_issuer,
            expected_audience,
            keys,
        }
    }

    /// Whether verification keys are loaded (for readiness checks)
    pub fn has_keys(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Verify signature, issuer, audience, and expiry of an ID token
    pub fn validate(&self, token: &str) -> Result<IdTokenClaims, GatewayError> {
        tracing::debug!(token_len = token.len(), "Validating ID token");

        let header = decode_header(token)
            .map_err(|e| GatewayError::TokenValidation(format!("Invalid token header: {}", e)))?;

        if !self.keys.algorithms().contains(&header.alg) {
            tracing::error!(
                event = "token_validation_failed",
                alg = ?header.alg,
                allowed = ?self.keys.algorithms(),
                token_hash = %token_hash(token),
                "ID token signed with an algorithm the provider does not advertise"
            );
            return Err(GatewayError::TokenValidation(format!(
                "Algorithm {:?} not allowed",
                header.alg
            )));
        }

        let Some(decoding_key) = self.keys.find(header.kid.as_deref()) else {
            tracing::error!(
                event = "token_validation_failed",
                kid = ?header.kid,
                available_kids = ?self.keys.key_ids(),
                token_hash = %token_hash(token),
                "Unknown key ID - kid not found in provider JWKS"
            );
            return Err(GatewayError::TokenValidation(format!(
                "Unknown key ID: {:?}",
                header.kid
            )));
        };

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = true;
        validation.set_issuer(&[&self.expected_issuer]);
        validation.set_audience(&[&self.expected_audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let token_data = match decode::<IdTokenClaims>(token, decoding_key, &validation) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(
                    event = "token_validation_failed",
                    error = ?e,
                    kid = ?header.kid,
                    alg = ?header.alg,
                    token_hash = %token_hash(token),
                    token_len = token.len(),
                    "ID token validation failed - potential security incident"
                );
                return Err(GatewayError::TokenValidation(e.to_string()));
            }
        };

        tracing::info!(
            sub = %token_data.claims.sub,
            username = ?token_data.claims.preferred_username,
            groups = ?token_data.claims.groups,
            "ID token validated successfully"
        );

        Ok(token_data.claims)
    }
}

/// Check if a JWT is expired without verifying its signature.
///
/// Used only to decide whether a stored ID token is still worth sending as
/// a logout hint. Returns true when the token is expired or malformed.
pub fn is_jwt_expired(token: &str) -> bool {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return true;
    };

    let Ok(bytes) = URL_SAFE_NO_PAD.decode(payload) else {
        return true;
    };

    let exp = serde_json::from_slice::<serde_json::Value>(&bytes)
        .ok()
        .and_then(|json| json.get("exp").and_then(|v| v.as_u64()));

    let Some(exp) = exp else {
        return true;
    };

    // 5 second buffer for clock skew
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    exp.saturating_add(5) < now
}

/// Stable, non-reversible token fingerprint for audit logs
fn token_hash(token: &str) -> String {
    format!("{:x}", md5::compute(token))
}
