//! Session credential handed to the browser after a successful callback
//!
//! The session is the provider's ID token stored in an HttpOnly cookie. The
//! gateway does not persist sessions; each request carries its own.
//!
//! Browsers cap a single cookie at roughly 4KB, so long tokens are split:
//! `gateway.token=<count>:<chunk0>`, `gateway.token-1=<chunk1>`, ... A token
//! that fits in one cookie is written without the count prefix. JWTs never
//! contain `:`, so the prefix is unambiguous.

use axum::http::HeaderMap;
use std::time::{SystemTime, UNIX_EPOCH};

use super::error::GatewayError;
use super::helpers::extract_cookie;
use super::jwt::IdTokenClaims;

pub const SESSION_COOKIE_NAME: &str = "gateway.token";

/// Upper bound for `name=value; attributes`
const MAX_COOKIE_LENGTH: usize = 4093;
const MAX_COOKIE_CHUNKS: usize = 20;

#[derive(Debug, Clone)]
pub struct Session {
    pub claims: IdTokenClaims,
    pub id_token: String,
    pub access_token: String,
    /// Expiry as seconds since the Unix epoch
    pub expires_at: u64,
}

impl Session {
    /// Seconds until the session expires (zero once expired)
    pub fn max_age_secs(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.expires_at.saturating_sub(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieAttributes {
    pub secure: bool,
}

impl CookieAttributes {
    fn render(&self, max_age: u64) -> String {
        format!(
            "; HttpOnly; Path=/; Max-Age={}; SameSite=Lax{}",
            max_age,
            if self.secure { "; Secure" } else { "" }
        )
    }
}

fn chunk_name(name: &str, index: usize) -> String {
    if index == 0 {
        name.to_string()
    } else {
        format!("{}-{}", name, index)
    }
}

/// Build the `Set-Cookie` values that carry `value`
pub fn session_cookies(
    name: &str,
    value: &str,
    attributes: CookieAttributes,
    max_age: u64,
) -> Result<Vec<String>, GatewayError> {
    let attrs = attributes.render(max_age);

    // Room for "-NN" index suffix, "=", and the "NN:" count prefix
    let overhead = name.len() + 3 + 1 + 3 + attrs.len();
    let chunk_len = MAX_COOKIE_LENGTH
        .checked_sub(overhead)
        .filter(|len| *len > 0)
        .ok_or_else(|| GatewayError::Internal("cookie attributes too long".to_string()))?;

    if value.len() <= chunk_len {
        return Ok(vec![format!("{}={}{}", name, value, attrs)]);
    }

    let chunks: Vec<&str> = value
        .as_bytes()
        .chunks(chunk_len)
        .map(|c| std::str::from_utf8(c).unwrap_or_default())
        .collect();

    if chunks.len() > MAX_COOKIE_CHUNKS {
        return Err(GatewayError::Internal(format!(
            "session token needs {} cookies, limit is {}",
            chunks.len(),
            MAX_COOKIE_CHUNKS
        )));
    }

    let count = chunks.len();
    Ok(chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            if i == 0 {
                format!("{}={}:{}{}", name, count, chunk, attrs)
            } else {
                format!("{}={}{}", chunk_name(name, i), chunk, attrs)
            }
        })
        .collect())
}

/// Number of cookies the stored value is split across (1 when unsplit)
fn chunk_count(first: &str) -> Option<usize> {
    match first.split_once(':') {
        Some((count, _)) => count.parse::<usize>().ok().filter(|n| (1..=MAX_COOKIE_CHUNKS).contains(n)),
        None => Some(1),
    }
}

/// Reassemble a possibly split session cookie from request headers
pub fn join_session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let first = extract_cookie(headers, name)?;
    let count = chunk_count(&first)?;

    if count == 1 {
        return match first.split_once(':') {
            Some((_, chunk)) => Some(chunk.to_string()),
            None => Some(first),
        };
    }

    let mut value = first.split_once(':')?.1.to_string();
    for i in 1..count {
        value.push_str(&extract_cookie(headers, &chunk_name(name, i))?);
    }
    Some(value)
}

/// `Set-Cookie` values expiring every chunk of the session cookie
pub fn clear_session_cookies(
    headers: &HeaderMap,
    name: &str,
    attributes: CookieAttributes,
) -> Vec<String> {
    let count = extract_cookie(headers, name)
        .and_then(|first| chunk_count(&first))
        .unwrap_or(1);
    let attrs = attributes.render(0);

    (0..count)
        .map(|i| format!("{}={}", chunk_name(name, i), attrs))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const ATTRS: CookieAttributes = CookieAttributes { secure: true };

    /// Turn Set-Cookie values into a request Cookie header
    fn as_request_headers(set_cookies: &[String]) -> HeaderMap {
        let pairs: Vec<&str> = set_cookies
            .iter()
            .map(|c| c.split(';').next().unwrap())
            .collect();
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_str(&pairs.join("; ")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_short_value_single_cookie() {
        let cookies = session_cookies(SESSION_COOKIE_NAME, "abc.def.ghi", ATTRS, 60).unwrap();
        assert_eq!(
            cookies,
            vec!["gateway.token=abc.def.ghi; HttpOnly; Path=/; Max-Age=60; SameSite=Lax; Secure"]
        );
    }

    #[test]
    fn test_insecure_attributes() {
        let cookies =
            session_cookies("t", "v", CookieAttributes { secure: false }, 10).unwrap();
        assert!(!cookies[0].contains("Secure"));
    }

    #[test]
    fn test_long_value_is_split_and_rejoined() {
        let value = "x".repeat(10_000);
        let cookies = session_cookies(SESSION_COOKIE_NAME, &value, ATTRS, 60).unwrap();

        assert_eq!(cookies.len(), 3);
        assert!(cookies[0].starts_with("gateway.token=3:"));
        assert!(cookies[1].starts_with("gateway.token-1="));
        assert!(cookies.iter().all(|c| c.len() <= MAX_COOKIE_LENGTH));

        let headers = as_request_headers(&cookies);
        assert_eq!(join_session_cookie(&headers, SESSION_COOKIE_NAME), Some(value));
    }

    #[test]
    fn test_too_many_chunks_rejected() {
        let value = "x".repeat(MAX_COOKIE_LENGTH * (MAX_COOKIE_CHUNKS + 1));
        assert!(matches!(
            session_cookies(SESSION_COOKIE_NAME, &value, ATTRS, 60),
            Err(GatewayError::Internal(_))
        ));
    }

    #[test]
    fn test_join_missing_chunk() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_static("gateway.token=2:abc"),
        );
        assert_eq!(join_session_cookie(&headers, SESSION_COOKIE_NAME), None);
    }

    #[test]
    fn test_join_unsplit() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_static("other=1; gateway.token=a.b.c"),
        );
        assert_eq!(
            join_session_cookie(&headers, SESSION_COOKIE_NAME),
            Some("a.b.c".to_string())
        );
    }

    #[test]
    fn test_clear_covers_all_chunks() {
        let value = "x".repeat(5_000);
        let cookies = session_cookies(SESSION_COOKIE_NAME, &value, ATTRS, 60).unwrap();
        let headers = as_request_headers(&cookies);

        let cleared = clear_session_cookies(&headers, SESSION_COOKIE_NAME, ATTRS);
        assert_eq!(cleared.len(), 2);
        assert!(cleared[0].starts_with("gateway.token=; "));
        assert!(cleared[1].starts_with("gateway.token-1=; "));
        assert!(cleared.iter().all(|c| c.contains("Max-Age=0")));
    }

    #[test]
    fn test_clear_without_cookie() {
        let cleared = clear_session_cookies(&HeaderMap::new(), SESSION_COOKIE_NAME, ATTRS);
        assert_eq!(cleared.len(), 1);
    }
}
