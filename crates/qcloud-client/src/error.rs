//! Error types for the qcloud client.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

use crate::transport::Method;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// A failed exchange with the job server.
///
/// Network-layer failures (refused connection, DNS, timeout) carry status `0`
/// and no payload.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("[{status} Error] {message} ({method} {url})")]
pub struct ApiError {
    /// HTTP status code, `0` when no response was received.
    pub status: u16,
    /// HTTP method of the failed request.
    pub method: Method,
    /// Full request URL.
    pub url: String,
    /// Human-readable message extracted from the response.
    pub message: String,
    /// Parsed JSON body, when the server sent one.
    pub payload: Option<Value>,
}

impl ApiError {
    /// Build the error for a request that never received a response.
    pub fn network(method: Method, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: 0,
            method,
            url: url.into(),
            message: message.into(),
            payload: None,
        }
    }

    /// Build the error for a non-2xx response.
    ///
    /// The message is taken from the first non-empty string among the JSON
    /// fields `detail`, `message` and `error`; otherwise the raw body text is
    /// used, and an empty body falls back to `HTTP <code>`.
    pub fn from_response(status: u16, method: Method, url: impl Into<String>, body: &str) -> Self {
        let payload = serde_json::from_str::<Value>(body)
            .ok()
            .filter(Value::is_object);

        let message = payload
            .as_ref()
            .and_then(message_from_payload)
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| format!("HTTP {status}"));

        Self {
            status,
            method,
            url: url.into(),
            message,
            payload,
        }
    }

    /// Presentation-agnostic one-line summary.
    pub fn summary(&self) -> String {
        self.to_string()
    }

    /// Whether the request never reached the server.
    pub fn is_network(&self) -> bool {
        self.status == 0
    }
}

fn message_from_payload(payload: &Value) -> Option<String> {
    ["detail", "message", "error"].iter().find_map(|key| match payload.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Null | Value::String(_) => None,
        other => Some(other.to_string()),
    })
}

/// Errors that can occur when talking to the job server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure or non-2xx HTTP response.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// 2xx response whose body does not have the expected shape.
    #[error("Malformed server response: {0}")]
    MalformedResponse(String),

    /// The server accepted the request but did not queue the job.
    #[error("Job submission failed: {0}")]
    JobPostFailed(String),

    /// The server kept reporting a status this client does not understand.
    #[error("Job reported unrecognized status '{0}' too many times in a row")]
    UnknownStatus(String),

    /// No API token configured.
    #[error("Missing API token: set QCLOUD_TOKEN or pass a token file")]
    MissingToken,

    /// The canonical result file could not be loaded.
    #[error("Failed to load result file {path}: {message}")]
    ResultLoad { path: PathBuf, message: String },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// HTTP status code for API errors (`0` for network failures).
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::Api(e) => Some(e.status),
            _ => None,
        }
    }

    /// Whether calling code may log the error and carry on.
    ///
    /// Only a rejected submission qualifies: the server is reachable and its
    /// responses are well-formed, the job just never entered the queue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ClientError::JobPostFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://cloud.example/jobs/abc/";

    #[test]
    fn test_detail_field_wins() {
        let body = r#"{"detail": "Invalid job pid", "message": "other", "error": "x"}"#;
        let err = ApiError::from_response(404, Method::Get, URL, body);
        assert_eq!(err.message, "Invalid job pid");
        assert!(err.payload.is_some());
    }

    #[test]
    fn test_message_field_before_error_field() {
        let body = r#"{"message": "quota exhausted", "error": "forbidden"}"#;
        let err = ApiError::from_response(403, Method::Post, URL, body);
        assert_eq!(err.message, "quota exhausted");
    }

    #[test]
    fn test_error_field_used_last() {
        let body = r#"{"detail": null, "error": "bad gateway"}"#;
        let err = ApiError::from_response(502, Method::Get, URL, body);
        assert_eq!(err.message, "bad gateway");
    }

    #[test]
    fn test_raw_text_fallback() {
        let err = ApiError::from_response(500, Method::Get, URL, "Internal Server Error\n");
        assert_eq!(err.message, "Internal Server Error");
        assert!(err.payload.is_none());
    }

    #[test]
    fn test_json_without_known_fields_uses_raw_text() {
        let body = r#"{"code": 17}"#;
        let err = ApiError::from_response(400, Method::Get, URL, body);
        assert_eq!(err.message, body);
        assert!(err.payload.is_some());
    }

    #[test]
    fn test_empty_body_generic_message() {
        let err = ApiError::from_response(503, Method::Delete, URL, "");
        assert_eq!(err.message, "HTTP 503");
    }

    #[test]
    fn test_summary_format() {
        let err = ApiError::from_response(404, Method::Get, URL, r#"{"detail": "Not Found"}"#);
        assert_eq!(
            err.summary(),
            "[404 Error] Not Found (GET https://cloud.example/jobs/abc/)"
        );
    }

    #[test]
    fn test_network_error_has_status_zero() {
        let err = ApiError::network(Method::Get, URL, "connection refused");
        assert!(err.is_network());
        assert!(err.payload.is_none());
        let client_err: ClientError = err.into();
        assert_eq!(client_err.status_code(), Some(0));
    }

    #[test]
    fn test_only_post_failures_are_recoverable() {
        assert!(ClientError::JobPostFailed("queue full".into()).is_recoverable());
        assert!(!ClientError::MalformedResponse("missing".into()).is_recoverable());
        assert!(!ClientError::MissingToken.is_recoverable());
    }

    #[test]
    fn test_missing_token_display() {
        assert!(ClientError::MissingToken.to_string().contains("QCLOUD_TOKEN"));
    }
}
