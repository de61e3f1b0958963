use sha2::{Digest, Sha256};
use std::fmt;
use time::Duration;

/// Cookie holding the access token.
pub const ACCESS_TOKEN_COOKIE: &str = "nextauth.token";
/// Cookie holding the refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "nextauth.refreshtoken";

/// 30 days, shared by both session cookies.
pub const SESSION_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 30;
pub const SESSION_COOKIE_PATH: &str = "/";

/// The access/refresh token pair issued by the backend.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub token: String,
    pub refresh_token: String,
}

impl SessionTokens {
    pub fn new(token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

// Tokens never reach the logs in clear text.
impl fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokens")
            .field("token", &fingerprint(&self.token))
            .field("refresh_token", &fingerprint(&self.refresh_token))
            .finish()
    }
}

/// Lifetime and scope applied to every session cookie write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub max_age: Duration,
    pub path: String,
}

impl CookieOptions {
    pub fn session() -> Self {
        Self {
            max_age: Duration::seconds(SESSION_MAX_AGE_SECS),
            path: SESSION_COOKIE_PATH.to_string(),
        }
    }
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self::session()
    }
}

/// Formats the value of an `Authorization` header.
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Extracts the token from an `Authorization: Bearer <token>` value.
pub fn parse_bearer(value: &str) -> Option<&str> {
    value.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
}

/// Short SHA-256 prefix used to correlate tokens in logs without leaking them.
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..12].to_string()
}
