//! Request/response types and the live-call boundary.
//!
//! The interception engine never talks to the network itself. It is handed a
//! [`LiveTransport`] that performs real calls *outside* the interception
//! layer; [`ReqwestTransport`] is the production implementation.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use serde::Deserialize;
use serde::Serialize;
use url::Url;

/// Default timeout applied by [`ReqwestTransport`].
pub const DEFAULT_LIVE_TIMEOUT: Duration = Duration::from_secs(30);

/// An outbound request as seen by the interception layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// POST with a JSON body and a matching `content-type` header.
    pub fn post_json(url: Url, body: &serde_json::Value) -> Self {
        Self::new(Method::POST, url)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A completed response, either live or replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Structured transport failure. Serialized verbatim into fixtures so a
/// captured failure can be replayed later.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{domain} error {code}: {message}")]
pub struct TransportError {
    #[serde(default = "default_error_domain")]
    pub domain: String,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

fn default_error_domain() -> String {
    TransportError::DOMAIN.to_string()
}

impl TransportError {
    pub const DOMAIN: &'static str = "transport";

    /// Codes used by [`ReqwestTransport`]; other transports may use their own.
    pub const CODE_OTHER: i64 = 1;
    pub const CODE_TIMEOUT: i64 = 2;
    pub const CODE_CONNECT: i64 = 3;
    pub const CODE_INVALID_REQUEST: i64 = 4;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            domain: Self::DOMAIN.to_string(),
            code,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            Self::CODE_TIMEOUT
        } else if err.is_connect() {
            Self::CODE_CONNECT
        } else if err.is_builder() {
            Self::CODE_INVALID_REQUEST
        } else {
            Self::CODE_OTHER
        };
        Self::new(code, err.to_string())
    }
}

/// Capability to perform a real network call.
///
/// Implementations must not route back through the interception layer.
#[async_trait]
pub trait LiveTransport: Send + Sync {
    async fn perform(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Live transport backed by a plain `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client. The caller is responsible for making sure the
    /// client is not itself hooked into the interception layer.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LiveTransport for ReqwestTransport {
    async fn perform(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            match value.to_str() {
                Ok(value) => {
                    headers.insert(name.as_str().to_string(), value.to_string());
                }
                Err(_) => {
                    tracing::debug!("dropping non-UTF-8 response header {name}");
                }
            }
        }
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
