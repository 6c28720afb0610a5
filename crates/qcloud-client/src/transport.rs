//! HTTP transport for the job server.
//!
//! [`Transport`] is the seam between the client and the network: it performs
//! one request and hands back the raw response. [`Requester`] sits on top and
//! turns non-2xx statuses, network failures and badly shaped JSON bodies into
//! typed [`ClientError`]s.

use std::fmt;
use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::{ApiError, ClientError, ClientResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP method of an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound request.
#[derive(Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub json: Option<Value>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        let mut request = Self::new(Method::Post, url);
        request.json = Some(body);
        request
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            json: None,
        }
    }

    /// Attach headers (typically the authorization header).
    pub fn with_headers(mut self, headers: &[(String, String)]) -> Self {
        self.headers.extend(headers.iter().cloned());
        self
    }
}

// Header values may carry the API token.
impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &header_names)
            .field("json", &self.json.is_some())
            .finish()
    }
}

/// A response whose body has not been consumed yet.
pub struct RawResponse {
    pub status: u16,
    body: Box<dyn Read + Send>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Read + Send + 'static) -> Self {
        Self {
            status,
            body: Box::new(body),
        }
    }

    /// Response backed by an in-memory body.
    pub fn from_bytes(status: u16, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(status, Cursor::new(bytes.into()))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Hand over the body as a stream.
    pub fn into_reader(self) -> Box<dyn Read + Send> {
        self.body
    }

    /// Read the whole body as text, replacing invalid UTF-8.
    pub fn text(mut self) -> std::io::Result<String> {
        let mut bytes = Vec::new();
        self.body.read_to_end(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// A request that never produced a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportFailure(pub String);

/// Performs one HTTP exchange.
///
/// Implementations return `Ok` for every response the server sent, whatever
/// its status code; `Err` is reserved for requests that got no response.
pub trait Transport: Send + Sync {
    fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportFailure>;
}

/// Blocking `reqwest` transport.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Create a transport with the given per-request timeout.
    pub fn new(timeout: Duration) -> ClientResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportFailure> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Delete => self.client.delete(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.json {
            builder = builder.json(body);
        }

        let response = builder.send().map_err(|e| {
            if e.is_timeout() {
                TransportFailure(format!("request timed out: {e}"))
            } else if e.is_connect() {
                TransportFailure(format!("connection failed: {e}"))
            } else {
                TransportFailure(e.to_string())
            }
        })?;

        Ok(RawResponse::new(response.status().as_u16(), response))
    }
}

/// Sends requests and classifies failures.
#[derive(Clone)]
pub struct Requester {
    transport: Arc<dyn Transport>,
}

impl Requester {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Send a request, returning the response only if its status is 2xx.
    pub fn send(&self, request: ApiRequest) -> ClientResult<RawResponse> {
        debug!("{} {}", request.method, request.url);

        let response = self
            .transport
            .send(&request)
            .map_err(|failure| ApiError::network(request.method, &request.url, failure.0))?;

        if response.is_success() {
            return Ok(response);
        }

        let status = response.status;
        let body = response.text().unwrap_or_default();
        let err = ApiError::from_response(status, request.method, &request.url, &body);
        debug!(status, "request failed: {}", err.message);
        Err(err.into())
    }

    /// Send a request and parse its body as JSON, checking that each key in
    /// `keys_to_check` is present.
    pub fn json(&self, request: ApiRequest, keys_to_check: &[&str]) -> ClientResult<Value> {
        let response = self.send(request)?;
        let text = response.text()?;
        let body: Value = serde_json::from_str(&text).map_err(|e| {
            ClientError::MalformedResponse(format!("response body is not valid JSON: {e}"))
        })?;
        check_json_has_keys(&body, keys_to_check)?;
        Ok(body)
    }
}

impl fmt::Debug for Requester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requester").finish_non_exhaustive()
    }
}

/// Check that a JSON object carries every key in `keys`.
pub fn check_json_has_keys(body: &Value, keys: &[&str]) -> ClientResult<()> {
    if keys.is_empty() {
        return Ok(());
    }
    let Some(object) = body.as_object() else {
        return Err(ClientError::MalformedResponse(format!(
            "expected a JSON object with keys {}",
            keys.join(" ")
        )));
    };

    let missing: Vec<&str> = keys
        .iter()
        .copied()
        .filter(|key| !object.contains_key(*key))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ClientError::MalformedResponse(format!(
            "The server response is missing the following keys: {}",
            missing.join(" ")
        )))
    }
}
