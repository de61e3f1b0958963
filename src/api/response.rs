use crate::error::Result;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

/// A successful (2xx) response with its body fully read.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl ApiResponse {
    pub const fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self { status, headers, body }
    }

    pub const fn status(&self) -> StatusCode {
        self.status
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// # Errors
    /// Returns `ClientError::Decode` if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use serde_json::Value;

    #[test]
    fn test_json_and_text() {
        let response = ApiResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::from_static(br#"{"user":"alice"}"#));

        let value: Value = response.json().unwrap();
        assert_eq!(value["user"], "alice");
        assert_eq!(response.text(), r#"{"user":"alice"}"#);
    }

    #[test]
    fn test_json_decode_failure() {
        let response = ApiResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::from_static(b"<html>"));
        assert!(matches!(response.json::<Value>(), Err(ClientError::Decode(_))));
    }
}
