use crate::adapters::cookies::CookieError;
use crate::domain::auth::FailureKind;
use bytes::Bytes;
use reqwest::StatusCode;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Request failed with status {status}")]
    Status {
        status: StatusCode,
        code: Option<String>,
        body: Bytes,
    },
    /// The session is gone and cannot be recovered from a server-rendering context.
    #[error("Authentication token is no longer valid")]
    AuthToken,
    /// Shared by every request that was waiting on the same refresh.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(Arc<ClientError>),
    #[error("Token refresh abandoned before completion")]
    RefreshAborted,
    #[error("Cookie store error: {0}")]
    Cookie(#[from] CookieError),
    #[error("Invalid payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("Invalid session: {0}")]
    InvalidSession(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// HTTP status of the response that produced this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status(),
            Self::RefreshFailed(inner) => inner.status(),
            _ => None,
        }
    }

    /// `code` field of the error payload, if the backend sent one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Status { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// True when a server-side caller should treat the user as logged out.
    pub const fn is_auth_token_error(&self) -> bool {
        matches!(self, Self::AuthToken)
    }

    pub(crate) fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Status { status, code, .. } => FailureKind::classify(Some(*status), code.as_deref()),
            _ => FailureKind::Passthrough,
        }
    }
}
