use crate::domain::session::SessionTokens;
use serde::{Deserialize, Serialize};

/// Body of `POST /refresh`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Refresh {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Token pair returned by `POST /refresh`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token: String,
    pub refresh_token: String,
}

impl AuthSession {
    /// Validates the refreshed session.
    ///
    /// # Errors
    /// Returns an error if either token is blank.
    pub fn validate(&self) -> Result<(), String> {
        if self.token.trim().is_empty() {
            return Err("Refresh response carries an empty access token".into());
        }
        if self.refresh_token.trim().is_empty() {
            return Err("Refresh response carries an empty refresh token".into());
        }
        Ok(())
    }
}

impl From<AuthSession> for SessionTokens {
    fn from(session: AuthSession) -> Self {
        Self::new(session.token, session.refresh_token)
    }
}
