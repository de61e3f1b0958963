use crate::domain::session::CookieOptions;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

pub mod file;
pub mod memory;

pub use file::FileCookieStore;
pub use memory::MemoryCookieStore;

#[derive(Error, Debug)]
pub enum CookieError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed cookie jar: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A named value with a path scope and an absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: String,
    /// Unix timestamp in seconds. `None` lives until removed.
    pub expires_at: Option<i64>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, options: &CookieOptions) -> Self {
        let expires_at = OffsetDateTime::now_utc() + options.max_age;
        Self {
            name: name.into(),
            value: value.into(),
            path: options.path.clone(),
            expires_at: Some(expires_at.unix_timestamp()),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|exp| exp <= OffsetDateTime::now_utc().unix_timestamp())
    }
}

/// Storage for the session cookies.
///
/// Writes overwrite any existing cookie of the same name.
#[async_trait]
pub trait CookieStore: Send + Sync + std::fmt::Debug {
    /// Returns the cookie, or `None` if it is missing or expired.
    async fn get_cookie(&self, name: &str) -> Result<Option<Cookie>, CookieError>;

    async fn set_cookie(&self, cookie: Cookie) -> Result<(), CookieError>;

    /// Idempotent.
    async fn remove_cookie(&self, name: &str) -> Result<(), CookieError>;

    async fn get_value(&self, name: &str) -> Result<Option<String>, CookieError> {
        Ok(self.get_cookie(name).await?.map(|c| c.value))
    }
}
