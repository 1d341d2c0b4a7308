//! JSON-RPC transport for the DePIN server.
//!
//! The dispatcher only needs two verbs: POST a plain-text auth command and
//! POST a JSON-RPC envelope. Both return the raw status and body so that
//! response classification stays in one place, and the trait seam keeps the
//! protocol logic testable without a running node.

use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    pub params: Vec<serde_json::Value>,
}

impl RpcRequest {
    /// Build an envelope with a fresh random request id.
    pub fn new(method: impl Into<String>, params: Vec<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: rand::random::<u32>() as u64,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response body.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<RpcErrorBody>,
}

/// The `error` object of a JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Raw HTTP-level response handed back by a transport.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal transport capability the DePIN client depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// POST a plain-text body (the `AUTH|...` command) to the server.
    async fn post_text(&self, body: &str) -> Result<TransportResponse>;

    /// POST a JSON-RPC envelope to the server.
    async fn post_rpc(&self, request: &RpcRequest) -> Result<TransportResponse>;
}

/// HTTP transport backed by `reqwest`.
pub struct HttpTransport {
    url: Url,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Request timeout for both the auth and RPC endpoints.
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(url: &str) -> Result<Self> {
        if url.is_empty() {
            return Err(Error::Config {
                message: "URL is required for DePIN RPC".to_string(),
            });
        }
        let url = Url::parse(url).map_err(|e| Error::Config {
            message: format!("Invalid DePIN server URL '{}': {}", url, e),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .build()?;

        Ok(Self { url, client })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn into_transport_response(response: reqwest::Response) -> Result<TransportResponse> {
        let status = response.status();
        let status_text = status
            .canonical_reason()
            .unwrap_or("Unknown")
            .to_string();
        let body = response.text().await?;

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text,
            body,
        })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn post_text(&self, body: &str) -> Result<TransportResponse> {
        debug!(url = %self.url, "POST auth command");
        let response = self
            .client
            .post(self.url.clone())
            .header("Content-Type", "text/plain")
            .body(body.to_string())
            .send()
            .await?;

        Self::into_transport_response(response).await
    }

    async fn post_rpc(&self, request: &RpcRequest) -> Result<TransportResponse> {
        debug!(url = %self.url, method = %request.method, id = request.id, "POST JSON-RPC request");
        let body = serde_json::to_string(request)?;
        let response = self
            .client
            .post(self.url.clone())
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        Self::into_transport_response(response).await
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("url", &self.url.as_str())
            .finish()
    }
}
