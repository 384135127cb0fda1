//! OIDC client app: builds login redirects and completes callbacks
//!
//! Construction performs provider discovery and fails with
//! [`GatewayError::Configuration`] when the issuer is unusable. After that
//! the app is immutable and safe to share across concurrent requests; the
//! only shared mutable state lives in the injected [`StateStore`].

use oauth2::{
    basic::{BasicErrorResponseType, BasicTokenType},
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointSet, ExtraTokenFields,
    RedirectUrl, RequestTokenError, Scope, StandardErrorResponse, StandardRevocableToken,
    StandardTokenIntrospectionResponse, StandardTokenResponse, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::discovery::{ProviderMetadata, ProviderRoute};
use super::error::{ExchangeFailure, GatewayError};
use super::helpers::{build_end_session_url, create_http_client};
use super::jwt::IdTokenValidator;
use super::redirect::RedirectValidator;
use super::session::{session_cookies, CookieAttributes, Session, SESSION_COOKIE_NAME};
use super::state::{InMemoryStateStore, StateStore};
use crate::settings::SettingsSnapshot;

/// Path of the callback route, relative to the base URL
pub const CALLBACK_PATH: &str = "/auth/callback";

/// State token entropy in bytes (256 bits)
const STATE_TOKEN_BYTES: u32 = 32;

// =============================================================================
// Types
// =============================================================================

/// Custom extra fields to capture id_token from OIDC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcTokenFields {
    pub id_token: Option<String>,
}

impl ExtraTokenFields for OidcTokenFields {}

type OidcTokenResponse = StandardTokenResponse<OidcTokenFields, BasicTokenType>;

/// Type alias for our configured OAuth client with OIDC support
type ConfiguredOAuthClient = oauth2::Client<
    StandardErrorResponse<BasicErrorResponseType>,
    OidcTokenResponse,
    StandardTokenIntrospectionResponse<OidcTokenFields, BasicTokenType>,
    StandardRevocableToken,
    StandardErrorResponse<oauth2::RevocationErrorResponseType>,
    EndpointSet,            // HasAuthUrl
    oauth2::EndpointNotSet, // HasDeviceAuthUrl
    oauth2::EndpointNotSet, // HasIntrospectionUrl
    oauth2::EndpointNotSet, // HasRevocationUrl
    EndpointSet,            // HasTokenUrl
>;

#[derive(Debug, Clone)]
pub struct ClientAppOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Lifetime of a pending login
    pub state_ttl: Duration,
}

impl Default for ClientAppOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            state_ttl: Duration::from_secs(300),
        }
    }
}

/// Result of a successful login request
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    pub authorization_url: Url,
    pub state: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Result of a successful callback
#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub session: Session,
    /// Destination bound to the state token at login time
    pub destination: String,
}

pub struct ClientApp {
    client_id: String,
    base_url: Url,
    callback_url: String,
    scopes: Vec<String>,
    oauth_client: ConfiguredOAuthClient,
    end_session_endpoint: Option<Url>,
    http_client: reqwest::Client,
    redirect_validator: RedirectValidator,
    token_validator: Arc<IdTokenValidator>,
    state_store: Arc<dyn StateStore>,
    options: ClientAppOptions,
    cookie_attributes: CookieAttributes,
}

// =============================================================================
// Construction
// =============================================================================

/// Whether the gateway builds its provider client without TLS certificate
/// verification.
///
/// Only direct calls to the issuer qualify: a broker always gets a
/// verifying client, and a caller-supplied transport keeps its own TLS
/// settings.
fn provider_skip_verify(
    settings: &SettingsSnapshot,
    route: &ProviderRoute,
    custom_transport: bool,
) -> bool {
    settings.oidc_tls_insecure_skip_verify && !route.is_brokered() && !custom_transport
}

impl ClientApp {
    /// Create a client app with default options and an in-memory state store.
    ///
    /// `transport` overrides the HTTP client used for provider calls (tests,
    /// custom TLS). `base_url` is the externally visible URL the gateway is
    /// mounted at; when empty, `settings.url` is used.
    pub async fn new(
        settings: SettingsSnapshot,
        transport: Option<reqwest::Client>,
        base_url: &str,
    ) -> Result<Self, GatewayError> {
        Self::with_options(
            settings,
            transport,
            base_url,
            ClientAppOptions::default(),
            Arc::new(InMemoryStateStore::new()),
        )
        .await
    }

    pub async fn with_options(
        settings: SettingsSnapshot,
        transport: Option<reqwest::Client>,
        base_url: &str,
        options: ClientAppOptions,
        state_store: Arc<dyn StateStore>,
    ) -> Result<Self, GatewayError> {
        let raw_base_url = if base_url.trim().is_empty() {
            settings.url.as_str()
        } else {
            base_url
        };
        let base_url = Url::parse(raw_base_url).map_err(|e| {
            GatewayError::Configuration(format!("Invalid base URL '{}': {}", raw_base_url, e))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(GatewayError::Configuration(format!(
                "Base URL must be http(s), got '{}'",
                raw_base_url
            )));
        }

        let route = ProviderRoute::new(&settings.issuer, settings.broker_url.as_deref())?;

        let skip_verify = provider_skip_verify(&settings, &route, transport.is_some());
        if settings.oidc_tls_insecure_skip_verify {
            tracing::warn!(
                event = "tls_verification_disabled",
                issuer = %settings.issuer,
                applied = skip_verify,
                "TLS certificate verification disabled for OIDC provider calls"
            );
        }

        let http_client = match transport {
            Some(client) => client,
            None => create_http_client(options.connect_timeout, options.request_timeout, skip_verify)
                .map_err(|e| {
                    GatewayError::Configuration(format!("Failed to build HTTP client: {}", e))
                })?,
        };

        let provider = tokio::time::timeout(
            options.request_timeout,
            ProviderMetadata::discover(&route, &http_client),
        )
        .await
        .map_err(|_| {
            GatewayError::Configuration(format!(
                "OIDC discovery for {} timed out after {:?}",
                settings.issuer, options.request_timeout
            ))
        })??;

        let callback_url = format!(
            "{}{}",
            base_url.as_str().trim_end_matches('/'),
            CALLBACK_PATH
        );

        let oauth_client = oauth2::Client::new(ClientId::new(settings.client_id.clone()))
            .set_client_secret(ClientSecret::new(settings.client_secret.clone()))
            // Browser-facing: always the public endpoint
            .set_auth_uri(AuthUrl::from_url(provider.authorization_endpoint.clone()))
            // Server-to-server: through the broker when one is configured
            .set_token_uri(TokenUrl::from_url(
                route.backchannel(&provider.token_endpoint),
            ))
            .set_redirect_uri(RedirectUrl::new(callback_url.clone()).map_err(|e| {
                GatewayError::Configuration(format!("Invalid callback URL: {}", e))
            })?);

        let token_validator = Arc::new(IdTokenValidator::new(
            provider.issuer.clone(),
            settings.client_id.clone(),
            provider.signing_keys.clone(),
        ));

        let redirect_validator = RedirectValidator::new(base_url.clone(), &settings.additional_urls);
        let cookie_attributes = CookieAttributes {
            secure: base_url.scheme() == "https",
        };

        tracing::info!(
            issuer = %provider.issuer,
            callback_url = %callback_url,
            scopes = ?settings.scopes(),
            state_ttl_secs = options.state_ttl.as_secs(),
            "OIDC client app initialized"
        );

        Ok(Self {
            client_id: settings.client_id.clone(),
            base_url,
            callback_url,
            scopes: settings.scopes(),
            oauth_client,
            end_session_endpoint: provider.end_session_endpoint,
            http_client,
            redirect_validator,
            token_validator,
            state_store,
            options,
            cookie_attributes,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    pub fn token_validator(&self) -> Arc<IdTokenValidator> {
        self.token_validator.clone()
    }

    pub fn cookie_attributes(&self) -> CookieAttributes {
        self.cookie_attributes
    }
}

// =============================================================================
// Operations
// =============================================================================

impl ClientApp {
    /// Start a login: validate the destination, bind it to a fresh state
    /// token, and build the provider authorization URL.
    ///
    /// Nothing is stored when the destination is rejected.
    pub async fn login(&self, return_url: Option<&str>) -> Result<LoginRedirect, GatewayError> {
        let destination = match self.redirect_validator.validate(return_url) {
            Ok(destination) => destination,
            Err(e) => {
                tracing::warn!(
                    event = "login_redirect_rejected",
                    return_url = ?return_url,
                    error = %e,
                    "Rejected login return_url - possible open-redirect attempt"
                );
                return Err(e);
            }
        };

        let (authorization_url, csrf_token) = self
            .oauth_client
            .authorize_url(|| CsrfToken::new_random_len(STATE_TOKEN_BYTES))
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .url();

        let state = csrf_token.secret().clone();
        self.state_store
            .put(&state, &destination, self.options.state_ttl)
            .await?;

        tracing::info!(
            destination = %destination,
            authorization_endpoint = %authorization_url.origin().ascii_serialization(),
            "Redirecting to identity provider for authentication"
        );

        Ok(LoginRedirect {
            authorization_url,
            state,
        })
    }

    /// Complete a login: consume the state, exchange the code, and validate
    /// the ID token.
    ///
    /// The state is consumed before anything else is checked, so it can
    /// never authorize a second callback whatever the outcome of this one.
    pub async fn callback(&self, params: CallbackParams) -> Result<CallbackOutcome, GatewayError> {
        let Some(state) = params.state.as_deref().filter(|s| !s.is_empty()) else {
            tracing::warn!(
                event = "login_state_mismatch",
                "Callback without state parameter - possible CSRF"
            );
            return Err(GatewayError::StateMismatch(
                "callback carried no state".to_string(),
            ));
        };

        let Some(destination) = self.state_store.take_if_valid(state).await? else {
            tracing::warn!(
                event = "login_state_mismatch",
                state_len = state.len(),
                "Unknown, expired, or replayed login state - possible CSRF or replay"
            );
            return Err(GatewayError::StateMismatch(
                "state is unknown, expired, or already used".to_string(),
            ));
        };

        if let Some(error) = params.error {
            tracing::warn!(
                error = %error,
                description = ?params.error_description,
                "OAuth authorization failed at provider"
            );
            return Err(GatewayError::ProviderDenied(error));
        }

        let Some(code) = params.code.filter(|c| !c.is_empty()) else {
            tracing::warn!("No authorization code received");
            return Err(GatewayError::MissingCode);
        };

        tracing::debug!(code_length = code.len(), "Authorization code received");

        let token_response = self.exchange_code(code).await?;

        let Some(id_token) = token_response.extra_fields().id_token.clone() else {
            tracing::error!(
                event = "token_validation_failed",
                "Provider token response carried no id_token"
            );
            return Err(GatewayError::TokenValidation(
                "provider did not return an id_token".to_string(),
            ));
        };

        let claims = self.token_validator.validate(&id_token)?;

        let session = Session {
            expires_at: claims.exp,
            claims,
            id_token,
            access_token: token_response.access_token().secret().clone(),
        };

        Ok(CallbackOutcome {
            session,
            destination,
        })
    }

    async fn exchange_code(&self, code: String) -> Result<OidcTokenResponse, GatewayError> {
        tracing::info!("Exchanging authorization code for tokens");

        let request = self
            .oauth_client
            .exchange_code(AuthorizationCode::new(code))
            .request_async(&self.http_client);

        let failure = match tokio::time::timeout(self.options.request_timeout, request).await {
            Ok(Ok(token_response)) => {
                tracing::info!(
                    has_id_token = token_response.extra_fields().id_token.is_some(),
                    "Successfully obtained tokens"
                );
                return Ok(token_response);
            }
            Ok(Err(RequestTokenError::ServerResponse(response))) => {
                ExchangeFailure::Rejected(response.to_string())
            }
            Ok(Err(RequestTokenError::Request(e))) => ExchangeFailure::Unavailable(e.to_string()),
            Ok(Err(RequestTokenError::Parse(e, _body))) => {
                ExchangeFailure::Unavailable(format!("unparseable token response: {}", e))
            }
            Ok(Err(RequestTokenError::Other(detail))) => ExchangeFailure::Unavailable(detail),
            Err(_) => ExchangeFailure::Unavailable(format!(
                "timed out after {:?}",
                self.options.request_timeout
            )),
        };

        tracing::error!(
            event = "token_exchange_failed",
            error = %failure,
            "Failed to exchange code for tokens"
        );
        Err(GatewayError::TokenExchange(failure))
    }

    /// `Set-Cookie` values establishing `session`
    pub fn session_cookies(&self, session: &Session) -> Result<Vec<String>, GatewayError> {
        session_cookies(
            SESSION_COOKIE_NAME,
            &session.id_token,
            self.cookie_attributes,
            session.max_age_secs(),
        )
    }

    /// Where to send the browser on logout
    pub fn logout_url(&self, id_token: Option<&str>) -> String {
        match &self.end_session_endpoint {
            Some(endpoint) => build_end_session_url(
                endpoint,
                self.base_url.as_str(),
                &self.client_id,
                id_token,
            ),
            None => self.base_url.to_string(),
        }
    }
}
