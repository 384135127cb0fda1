//! OIDC provider discovery
//!
//! Resolves the issuer's discovery document and signing keys once, at
//! gateway construction. The result is immutable for the life of the
//! [`crate::auth::ClientApp`] that owns it.

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::str::FromStr;
use url::Url;

use super::error::GatewayError;

const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Where server-to-server calls to the provider are sent.
///
/// Without a broker every call goes to the public URL. With a broker, calls
/// whose target shares the issuer's origin are rewritten onto the broker's
/// internal address (path and query preserved).
#[derive(Debug, Clone)]
pub struct ProviderRoute {
    issuer: Url,
    broker: Option<Url>,
}

impl ProviderRoute {
    pub fn new(issuer: &str, broker_url: Option<&str>) -> Result<Self, GatewayError> {
        let issuer = Url::parse(issuer).map_err(|e| {
            GatewayError::Configuration(format!("Invalid issuer URL '{}': {}", issuer, e))
        })?;

        let broker = broker_url
            .map(|raw| {
                Url::parse(raw).map_err(|e| {
                    GatewayError::Configuration(format!("Invalid broker URL '{}': {}", raw, e))
                })
            })
            .transpose()?;

        Ok(Self { issuer, broker })
    }

    pub fn issuer(&self) -> &Url {
        &self.issuer
    }

    pub fn is_brokered(&self) -> bool {
        self.broker.is_some()
    }

    /// URL to use when the gateway itself calls `public`
    pub fn backchannel(&self, public: &Url) -> Url {
        match &self.broker {
            Some(broker) if public.origin() == self.issuer.origin() => {
                let mut rewritten = broker.clone();
                rewritten.set_path(public.path());
                rewritten.set_query(public.query());
                rewritten
            }
            _ => public.clone(),
        }
    }

    fn discovery_url(&self) -> Result<Url, GatewayError> {
        let raw = format!(
            "{}{}",
            self.issuer.as_str().trim_end_matches('/'),
            DISCOVERY_PATH
        );
        Url::parse(&raw)
            .map_err(|e| GatewayError::Configuration(format!("Invalid discovery URL: {}", e)))
    }
}

/// Subset of the discovery document the gateway relies on
#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    issuer: String,
    authorization_endpoint: String,
    token_endpoint: String,
    jwks_uri: String,
    #[serde(default)]
    end_session_endpoint: Option<String>,
    #[serde(default)]
    id_token_signing_alg_values_supported: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<serde_json::Value>,
}

#[derive(Clone)]
pub struct SigningKey {
    pub kid: Option<String>,
    pub key: DecodingKey,
}

/// Verification keys plus the algorithms the provider signs ID tokens with
#[derive(Clone)]
pub struct SigningKeys {
    keys: Vec<SigningKey>,
    algorithms: Vec<Algorithm>,
}

impl SigningKeys {
    pub fn new(keys: Vec<SigningKey>, algorithms: Vec<Algorithm>) -> Self {
        Self { keys, algorithms }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    /// Select the key for a token's `kid`; a token without `kid` only
    /// matches when the provider publishes exactly one key.
    pub fn find(&self, kid: Option<&str>) -> Option<&DecodingKey> {
        match kid {
            Some(kid) => self
                .keys
                .iter()
                .find(|k| k.kid.as_deref() == Some(kid))
                .map(|k| &k.key),
            None if self.keys.len() == 1 => self.keys.first().map(|k| &k.key),
            None => None,
        }
    }

    pub fn key_ids(&self) -> Vec<&str> {
        self.keys.iter().filter_map(|k| k.kid.as_deref()).collect()
    }
}

#[derive(Clone)]
pub struct ProviderMetadata {
    /// Issuer exactly as the provider reports it (and puts in `iss`)
    pub issuer: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub jwks_uri: Url,
    pub end_session_endpoint: Option<Url>,
    pub signing_keys: SigningKeys,
}

impl ProviderMetadata {
    /// Fetch and validate the discovery document and JWKS
    pub async fn discover(
        route: &ProviderRoute,
        client: &reqwest::Client,
    ) -> Result<Self, GatewayError> {
        let url = route.backchannel(&route.discovery_url()?);
        tracing::info!(url = %url, brokered = route.is_brokered(), "Fetching OIDC discovery document");

        let response = client.get(url.clone()).send().await.map_err(|e| {
            GatewayError::Configuration(format!("Failed to fetch OIDC discovery from {}: {}", url, e))
        })?;

        if !response.status().is_success() {
            return Err(GatewayError::Configuration(format!(
                "OIDC discovery at {} returned {}",
                url,
                response.status()
            )));
        }

        let document: DiscoveryDocument = response.json().await.map_err(|e| {
            GatewayError::Configuration(format!("Failed to parse OIDC discovery document: {}", e))
        })?;

        if document.issuer.trim_end_matches('/') != route.issuer().as_str().trim_end_matches('/') {
            return Err(GatewayError::Configuration(format!(
                "Discovery issuer '{}' does not match configured issuer '{}'",
                document.issuer,
                route.issuer()
            )));
        }

        let authorization_endpoint =
            parse_endpoint("authorization_endpoint", &document.authorization_endpoint)?;
        let token_endpoint = parse_endpoint("token_endpoint", &document.token_endpoint)?;
        let jwks_uri = parse_endpoint("jwks_uri", &document.jwks_uri)?;
        let end_session_endpoint = document
            .end_session_endpoint
            .as_deref()
            .map(|raw| parse_endpoint("end_session_endpoint", raw))
            .transpose()?;

        let algorithms = supported_algorithms(&document.id_token_signing_alg_values_supported)?;
        let keys = fetch_signing_keys(client, &route.backchannel(&jwks_uri)).await?;
        let signing_keys = SigningKeys::new(keys, algorithms);

        tracing::info!(
            issuer = %document.issuer,
            authorization_endpoint = %authorization_endpoint,
            token_endpoint = %token_endpoint,
            key_ids = ?signing_keys.key_ids(),
            algorithms = ?signing_keys.algorithms(),
            "OIDC provider discovered"
        );

        Ok(Self {
            issuer: document.issuer,
            authorization_endpoint,
            token_endpoint,
            jwks_uri,
            end_session_endpoint,
            signing_keys,
        })
    }
}

fn parse_endpoint(field: &str, raw: &str) -> Result<Url, GatewayError> {
    let url = Url::parse(raw).map_err(|e| {
        GatewayError::Configuration(format!("Invalid {} '{}' in discovery: {}", field, raw, e))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(GatewayError::Configuration(format!(
            "{} must be an http(s) URL, got '{}'",
            field, raw
        )));
    }
    Ok(url)
}

/// Asymmetric algorithms advertised by the provider. An empty list means
/// the OIDC default, RS256.
fn supported_algorithms(advertised: &[String]) -> Result<Vec<Algorithm>, GatewayError> {
    if advertised.is_empty() {
        return Ok(vec![Algorithm::RS256]);
    }

    let algorithms: Vec<Algorithm> = advertised
        .iter()
        .filter_map(|name| Algorithm::from_str(name).ok())
        .filter(|alg| !matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512))
        .collect();

    if algorithms.is_empty() {
        return Err(GatewayError::Configuration(format!(
            "Provider advertises no supported ID token signing algorithm: {:?}",
            advertised
        )));
    }
    Ok(algorithms)
}

async fn fetch_signing_keys(
    client: &reqwest::Client,
    url: &Url,
) -> Result<Vec<SigningKey>, GatewayError> {
    tracing::info!(url = %url, "Fetching JWKS");

    let response = client.get(url.clone()).send().await.map_err(|e| {
        GatewayError::Configuration(format!("Failed to fetch JWKS from {}: {}", url, e))
    })?;

    if !response.status().is_success() {
        return Err(GatewayError::Configuration(format!(
            "JWKS endpoint {} returned {}",
            url,
            response.status()
        )));
    }

    let jwks: JwksResponse = response
        .json()
        .await
        .map_err(|e| GatewayError::Configuration(format!("Failed to parse JWKS: {}", e)))?;

    let keys: Vec<SigningKey> = jwks.keys.into_iter().filter_map(parse_signing_key).collect();

    if keys.is_empty() {
        return Err(GatewayError::Configuration(
            "JWKS contains no usable signing keys".to_string(),
        ));
    }

    tracing::info!(key_count = keys.len(), "JWKS fetched successfully");
    Ok(keys)
}

fn parse_signing_key(raw: serde_json::Value) -> Option<SigningKey> {
    let jwk: Jwk = match serde_json::from_value(raw) {
        Ok(jwk) => jwk,
        Err(e) => {
            tracing::warn!(error = %e, "Skipping unparseable JWK");
            return None;
        }
    };

    let kid = jwk.common.key_id.clone();

    if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
        tracing::debug!(kid = ?kid, "Skipping encryption key");
        return None;
    }
    if matches!(jwk.algorithm, AlgorithmParameters::OctetKey(_)) {
        tracing::warn!(kid = ?kid, "Skipping symmetric key in JWKS");
        return None;
    }

    match DecodingKey::from_jwk(&jwk) {
        Ok(key) => {
            tracing::debug!(kid = ?kid, "Added key to signing key set");
            Some(SigningKey { kid, key })
        }
        Err(e) => {
            tracing::warn!(kid = ?kid, error = %e, "Skipping JWK that cannot be used for verification");
            None
        }
    }
}
