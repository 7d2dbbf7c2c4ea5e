//! ==============================================================================
//! transport.rs - one physical request to the device
//! ==============================================================================
//!
//! purpose:
//!     the seam between the retry/health logic in client.rs and the actual
//!     network. `Transport::send` is exactly ONE attempt: no retries, no
//!     connection bookkeeping. tests swap in scripted fakes; production uses
//!     HttpTransport (reqwest).
//!
//! relationships:
//!     - used by: client.rs (RemoteClient holds an Arc<dyn Transport>)
//!     - uses: reqwest (http), serde_json (bodies)
//!
//! ==============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// why a single attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    /// the device answered with a non-2xx status
    #[error("HTTP {code}: {reason}")]
    Status { code: u16, reason: String },
    /// connect / timeout / reset - anything below http
    #[error("{0}")]
    Transport(String),
    /// 2xx but the body was not json
    #[error("invalid response body: {0}")]
    Body(String),
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// perform one attempt against `path` (relative to the device base url)
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value, AttemptError>;

    /// base url, for status reporting only
    fn base_url(&self) -> &str;
}

// ==============================================================================
// http transport
// ==============================================================================

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("thermo-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value, AttemptError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        }
        .timeout(timeout)
        .header(reqwest::header::ACCEPT, "application/json");

        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| AttemptError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AttemptError::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let text = resp
            .text()
            .await
            .map_err(|e| AttemptError::Transport(e.to_string()))?;
        // some acks come back with an empty body
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| AttemptError::Body(e.to_string()))
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
