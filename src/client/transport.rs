//! Transport Module
//!
//! Abstraction over the HTTP wire. The coordinator only sees status codes
//! and JSON bodies; everything protocol-specific (TLS, connection reuse,
//! timeouts) lives behind the [`Transport`] trait so tests can substitute a
//! scripted implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use url::Url;

// == Transport Response ==
/// Raw outcome of a dispatched call, before classification.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// Numeric HTTP status code
    pub status: u16,
    /// Parsed JSON body, `Value::Null` when the body is empty or not JSON
    pub body: Value,
}

impl TransportResponse {
    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// == Transport Error ==
/// Failures below the HTTP layer. Classified into [`crate::ApiError`] by the
/// coordinator.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// The call exceeded its timeout
    #[error("request timed out")]
    Timeout,

    /// Connection-level failure (refused, DNS, TLS, ...)
    #[error("network failure: {0}")]
    Network(String),
}

// == Transport Trait ==
/// Issues a single HTTP-style call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Executes the call and returns the raw response.
    ///
    /// Implementations attach the bearer token when one is given and enforce
    /// the timeout. Once dispatched, a call runs to completion; there is no
    /// mid-flight cancellation.
    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError>;
}

// == HTTP Transport ==
/// Production transport backed by `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Creates a transport rooted at an absolute base URL
    /// (e.g. "http://192.168.43.50:8000/").
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let mut request = self.client.request(method, url).timeout(timeout);

        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        // Error bodies are not always JSON; fall back to Null rather than
        // failing the classification step.
        let body = match response.text().await {
            Ok(text) => serde_json::from_str(&text).unwrap_or(Value::Null),
            Err(_) => Value::Null,
        };

        Ok(TransportResponse { status, body })
    }
}
