use std::env;
use std::time::Duration;

use crate::auth::{ClientAppOptions, DEFAULT_MAX_PENDING_LOGINS};
use crate::settings::SettingsSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Environment configuration
    pub environment: Environment,

    // Server configuration
    pub server_host: String,
    pub server_port: u16,

    // Public URL the gateway is reachable at (callback is derived from it)
    pub gateway_url: String,

    // OIDC provider configuration
    pub oidc_issuer: String,
    pub client_id: String,
    pub client_secret: String,
    pub requested_scopes: Vec<String>,
    pub oidc_tls_insecure_skip_verify: bool,

    // Internal broker address for server-to-server calls (e.g. in-cluster Dex)
    pub oidc_broker_url: Option<String>,

    // Extra origins allowed as post-login destinations
    pub additional_urls: Vec<String>,

    // HTTP client timeout configuration (in seconds)
    pub http_connect_timeout_secs: u64,
    pub http_request_timeout_secs: u64,

    // Login state lifetime and sweep cadence (in seconds)
    pub login_state_ttl_secs: u64,
    pub login_state_sweep_interval_secs: u64,

    // Upper bound on pending logins held in memory
    pub login_state_max_pending: usize,
}

impl Config {
    /// Load configuration from environment variables using std::env::var
    pub fn load() -> anyhow::Result<Self> {
        let environment = parse_environment(
            &env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        );

        // Required variables
        let gateway_url = env::var("GATEWAY_URL")
            .map_err(|_| anyhow::anyhow!("GATEWAY_URL environment variable is required"))?;

        let oidc_issuer = env::var("OIDC_ISSUER")
            .map_err(|_| anyhow::anyhow!("OIDC_ISSUER environment variable is required"))?;

        let client_id = env::var("OIDC_CLIENT_ID")
            .map_err(|_| anyhow::anyhow!("OIDC_CLIENT_ID environment variable is required"))?;

        let client_secret = env::var("OIDC_CLIENT_SECRET")
            .map_err(|_| anyhow::anyhow!("OIDC_CLIENT_SECRET environment variable is required"))?;

        // Optional variables with defaults
        let requested_scopes = env::var("OIDC_REQUESTED_SCOPES")
            .map(|s| split_list(&s))
            .unwrap_or_default();

        let oidc_tls_insecure_skip_verify = env::var("OIDC_TLS_INSECURE_SKIP_VERIFY")
            .map(|s| parse_bool(&s))
            .unwrap_or(false);

        let oidc_broker_url = env::var("OIDC_BROKER_URL").ok().filter(|s| !s.is_empty());

        let additional_urls = env::var("ADDITIONAL_URLS")
            .map(|s| split_list(&s))
            .unwrap_or_default();

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = env::var("SERVER_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8080);

        let http_connect_timeout_secs = parse_u64_var("HTTP_CONNECT_TIMEOUT_SECS", 10);
        let http_request_timeout_secs = parse_u64_var("HTTP_REQUEST_TIMEOUT_SECS", 30);
        let login_state_ttl_secs = parse_u64_var("LOGIN_STATE_TTL_SECS", 300);
        let login_state_sweep_interval_secs = parse_u64_var("LOGIN_STATE_SWEEP_INTERVAL_SECS", 60);
        let login_state_max_pending =
            parse_u64_var("LOGIN_STATE_MAX_PENDING", DEFAULT_MAX_PENDING_LOGINS as u64) as usize;

        let config = Config {
            environment,
            server_host,
            server_port,
            gateway_url,
            oidc_issuer,
            client_id,
            client_secret,
            requested_scopes,
            oidc_tls_insecure_skip_verify,
            oidc_broker_url,
            additional_urls,
            http_connect_timeout_secs,
            http_request_timeout_secs,
            login_state_ttl_secs,
            login_state_sweep_interval_secs,
            login_state_max_pending,
        };
        config.validate()?;

        Ok(config)
    }

    /// Reject combinations that must never reach a production deployment
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.oidc_tls_insecure_skip_verify {
            if self.is_production() {
                anyhow::bail!(
                    "OIDC_TLS_INSECURE_SKIP_VERIFY must not be enabled in production"
                );
            }
            tracing::warn!(
                event = "tls_verification_disabled",
                issuer = %self.oidc_issuer,
                "OIDC_TLS_INSECURE_SKIP_VERIFY is enabled - certificate validation for the \
                 identity provider is OFF. Never use this outside local/test deployments."
            );
        }

        if self.login_state_ttl_secs == 0 {
            anyhow::bail!("LOGIN_STATE_TTL_SECS must be greater than zero");
        }

        if self.login_state_max_pending == 0 {
            anyhow::bail!("LOGIN_STATE_MAX_PENDING must be greater than zero");
        }

        Ok(())
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Immutable settings handed to the authentication gateway
    pub fn settings_snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            issuer: self.oidc_issuer.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            requested_scopes: self.requested_scopes.clone(),
            url: self.gateway_url.clone(),
            oidc_tls_insecure_skip_verify: self.oidc_tls_insecure_skip_verify,
            additional_urls: self.additional_urls.clone(),
            broker_url: self.oidc_broker_url.clone(),
        }
    }

    /// Timeouts and state lifetime for the gateway
    pub fn client_app_options(&self) -> ClientAppOptions {
        ClientAppOptions {
            connect_timeout: Duration::from_secs(self.http_connect_timeout_secs),
            request_timeout: Duration::from_secs(self.http_request_timeout_secs),
            state_ttl: Duration::from_secs(self.login_state_ttl_secs),
        }
    }

    pub fn login_state_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.login_state_sweep_interval_secs.max(1))
    }

    /// Get bind address for server
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_environment(value: &str) -> Environment {
    match value.to_lowercase().as_str() {
        "production" | "prod" => Environment::Production,
        _ => Environment::Development,
    }
}

fn parse_u64_var(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Split a comma and/or whitespace separated list, dropping empty entries
fn split_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
