//! Transport abstraction for API requests
//!
//! The `Transport` trait decouples the interceptor pipeline and the refresh
//! coordinator from the wire, so both can be exercised against in-process
//! fakes. `HttpTransport` is the production implementation over `reqwest`.
//!
//! Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
//! (`Arc<dyn Transport>`).

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::RawFailure;

/// Fixed per-attempt request timeout. Applies to every call through
/// `HttpTransport`, including the refresh call itself.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP method, restricted to what the API surface uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// State-mutating methods get a CSRF header attached.
    pub fn is_mutating(self) -> bool {
        !matches!(self, Method::Get)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// An outbound API request, before credential attachment.
///
/// Values are immutable from the caller's perspective: the pipeline clones
/// and re-headers the request for the replay-after-refresh path instead of
/// mutating the original in place.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/appointments`
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::Put, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set a header, replacing any existing value with the same name
    /// (case-insensitive). Used by the pipeline to swap the Authorization
    /// header on replay.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Look up a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A successful (2xx) response: status plus the parsed JSON envelope.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ApiResponse {
    /// The envelope's `data` field, if present.
    pub fn data(&self) -> Option<&serde_json::Value> {
        self.body.get("data")
    }
}

/// One network attempt. Implementations must not retry or refresh —
/// that policy lives above this seam.
pub trait Transport: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: &'a ApiRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse, RawFailure>> + Send + 'a>>;
}

/// Production transport over a shared `reqwest` client.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Map a `reqwest` send error onto the raw failure taxonomy. Builder
/// errors mean the request never left this process; everything else is
/// treated as the network not answering (timeouts included).
fn classify_send_error(error: &reqwest::Error) -> RawFailure {
    if error.is_builder() {
        RawFailure::Setup(error.to_string())
    } else {
        RawFailure::Network(error.to_string())
    }
}

impl Transport for HttpTransport {
    fn execute<'a>(
        &'a self,
        request: &'a ApiRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse, RawFailure>> + Send + 'a>> {
        Box::pin(async move {
            let url = self.url_for(&request.path);
            let method = match request.method {
                Method::Get => reqwest::Method::GET,
                Method::Post => reqwest::Method::POST,
                Method::Put => reqwest::Method::PUT,
                Method::Patch => reqwest::Method::PATCH,
                Method::Delete => reqwest::Method::DELETE,
            };

            let mut builder = self.client.request(method, &url).timeout(self.timeout);
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| classify_send_error(&e))?;

            let status = response.status().as_u16();
            let text = response
                .bytes()
                .await
                .map_err(|e| RawFailure::Network(format!("reading response body: {e}")))?;
            let body: Option<serde_json::Value> = serde_json::from_slice(&text).ok();

            if (200..300).contains(&status) {
                Ok(ApiResponse {
                    status,
                    body: body.unwrap_or(serde_json::Value::Null),
                })
            } else {
                Err(RawFailure::Status {
                    code: status,
                    body,
                    detail: format!("HTTP {status} for {} {}", request.method.as_str(), request.path),
                })
            }
        })
    }
}
