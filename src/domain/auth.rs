use reqwest::StatusCode;
use serde_json::Value;

/// Error code the backend sends when the access token has expired.
pub const TOKEN_EXPIRED_CODE: &str = "token.expired";

/// How a failed response is handled by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Not an authentication problem; handed back to the caller untouched.
    Passthrough,
    /// 401 that a token refresh cannot fix.
    Unrecoverable,
    /// 401 caused by an expired access token.
    Expired,
}

impl FailureKind {
    pub fn classify(status: Option<StatusCode>, code: Option<&str>) -> Self {
        match (status, code) {
            (Some(StatusCode::UNAUTHORIZED), Some(TOKEN_EXPIRED_CODE)) => Self::Expired,
            (Some(StatusCode::UNAUTHORIZED), _) => Self::Unrecoverable,
            _ => Self::Passthrough,
        }
    }
}

/// Reads the `code` field of an error payload.
///
/// Bodies that are not JSON objects, or whose `code` is not a string, yield `None`.
pub fn error_code(body: &[u8]) -> Option<String> {
    let payload: Value = serde_json::from_slice(body).ok()?;
    payload.get("code").and_then(Value::as_str).map(str::to_owned)
}
