//! HTTP transport adapter for the connector core.
//!
//! Implements [`connector::HttpTransport`] on top of [`reqwest`]. Every
//! response is returned as a [`RawResponse`] whatever its status; judging the
//! status is the core's response pipeline's job. Only failures to obtain a
//! response become [`TransportError`]s.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Connection pooling, TLS, request timeouts and header
//! encoding live here. The [`connector`] crate sees only
//! [`connector::HttpTransport`].

use std::time::Duration;

use async_trait::async_trait;
use connector::{HttpTransport, RawResponse, RequestDescriptor, TransportError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Settings for [`ReqwestTransport`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Whole-request deadline in seconds (connect, send, and read body).
    pub timeout_secs: u64,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("connector-core/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Failure to construct the underlying HTTP client.
#[derive(Debug, Error)]
pub enum TransportBuildError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// [`HttpTransport`] backed by a pooled [`reqwest::Client`].
///
/// Cheap to share: clone the `Arc` it is wrapped in, not the transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport from configuration.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportBuildError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn method(request: &RequestDescriptor) -> Result<reqwest::Method, TransportError> {
    reqwest::Method::from_bytes(request.method.as_str().as_bytes()).map_err(|e| {
        TransportError::InvalidRequest {
            message: e.to_string(),
        }
    })
}

fn headers(request: &RequestDescriptor) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::with_capacity(request.headers.len());
    for (name, value) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            TransportError::InvalidRequest {
                message: format!("header name '{name}': {e}"),
            }
        })?;
        // Values are not echoed; they may carry credentials.
        let value = HeaderValue::from_str(value).map_err(|e| TransportError::InvalidRequest {
            message: format!("value of header '{}': {e}", name.as_str()),
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

fn classify(error: reqwest::Error) -> TransportError {
    let message = error.to_string();
    if error.is_timeout() {
        TransportError::Timeout { message }
    } else if error.is_builder() {
        TransportError::InvalidRequest { message }
    } else if error.is_body() || error.is_decode() {
        TransportError::Body { message }
    } else {
        TransportError::Connection { message }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(name = "transport.send", skip_all, fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .client
            .request(method(request)?, &request.url)
            .headers(headers(request)?);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let content = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body {
                message: e.to_string(),
            })?
            .to_vec();

        debug!(status, bytes = content.len(), "Received response");
        Ok(RawResponse { status, content })
    }
}
