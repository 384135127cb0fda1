//! Post-login destination validation
//!
//! Guards `/auth/login?return_url=...` against open-redirect abuse. A
//! destination is accepted when it is a host-less relative path, or an
//! absolute http(s) URL whose origin is the gateway's own origin or one of
//! the operator-configured additional origins.

use url::{Origin, Url};

use super::error::GatewayError;

#[derive(Debug, Clone)]
pub struct RedirectValidator {
    base_url: Url,
    allowed_origins: Vec<Origin>,
}

impl RedirectValidator {
    /// Build a validator for `base_url` plus an optional allow-list.
    ///
    /// Allow-list entries that do not parse as absolute URLs are skipped with
    /// a warning rather than failing startup.
    pub fn new(base_url: Url, additional_urls: &[String]) -> Self {
        let mut allowed_origins = vec![base_url.origin()];
        for raw in additional_urls {
            match Url::parse(raw) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {
                    allowed_origins.push(url.origin())
                }
                _ => tracing::warn!(url = %raw, "Ignoring invalid additional URL in redirect allow-list"),
            }
        }

        Self {
            base_url,
            allowed_origins,
        }
    }

    /// Resolve a caller-supplied `return_url` to a trusted destination.
    ///
    /// Absent or empty input defaults to the base URL.
    pub fn validate(&self, destination: Option<&str>) -> Result<String, GatewayError> {
        let destination = match destination.map(str::trim) {
            None | Some("") => return Ok(self.base_url.to_string()),
            Some(d) => d,
        };

        if destination.chars().any(|c| c.is_control() || c == '\\') {
            return Err(GatewayError::InvalidRedirect(
                "destination contains control characters or backslashes".to_string(),
            ));
        }

        if is_host_less_path(destination) {
            return Ok(destination.to_string());
        }

        let url = Url::parse(destination)
            .map_err(|e| GatewayError::InvalidRedirect(format!("not an absolute URL: {}", e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(GatewayError::InvalidRedirect(format!(
                "scheme '{}' is not allowed",
                url.scheme()
            )));
        }

        if !url.username().is_empty() || url.password().is_some() {
            return Err(GatewayError::InvalidRedirect(
                "destination carries user info".to_string(),
            ));
        }

        let origin = url.origin();
        if self.allowed_origins.contains(&origin) {
            Ok(destination.to_string())
        } else {
            Err(GatewayError::InvalidRedirect(format!(
                "origin {} is not allowed",
                origin.ascii_serialization()
            )))
        }
    }
}

/// `/path` is same-origin; `//host/path` is protocol-relative and is not.
fn is_host_less_path(destination: &str) -> bool {
    destination.starts_with('/') && !destination.starts_with("//")
}
