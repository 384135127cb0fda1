//! Settings snapshot consumed by the authentication gateway
//!
//! The gateway never reads settings from a global. Callers build a
//! [`SettingsSnapshot`] (usually from [`crate::config::Config`]) and hand it
//! to [`crate::auth::ClientApp`] at construction time.

/// Scopes requested when the operator does not configure any.
pub const DEFAULT_SCOPES: &[&str] = &["openid", "profile", "email"];

/// Scope every OIDC authorization request must carry.
pub const OPENID_SCOPE: &str = "openid";

#[derive(Debug, Clone, PartialEq)]
pub struct SettingsSnapshot {
    /// Identity provider issuer URL (public, as it appears in tokens)
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
    pub requested_scopes: Vec<String>,
    /// Externally visible base URL of the gateway
    pub url: String,
    /// Disable certificate checks for calls to the issuer. Local/test only.
    pub oidc_tls_insecure_skip_verify: bool,
    /// Extra origins accepted as post-login destinations
    pub additional_urls: Vec<String>,
    /// Internal address of a federation broker serving the issuer.
    ///
    /// Server-to-server calls that target the issuer's origin are sent here
    /// instead; browser redirects keep using the public issuer URL.
    pub broker_url: Option<String>,
}

impl SettingsSnapshot {
    /// Scopes sent in the authorization request, always including `openid`
    pub fn scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = if self.requested_scopes.is_empty() {
            DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
        } else {
            self.requested_scopes.clone()
        };

        if !scopes.iter().any(|s| s == OPENID_SCOPE) {
            scopes.push(OPENID_SCOPE.to_string());
        }
        scopes
    }
}
