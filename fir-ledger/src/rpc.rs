//! JSON-RPC 2.0 over HTTP.
//!
//! Shared by the wallet provider and the registry contract client. Failures
//! are classified so each side can map them: an endpoint that cannot be
//! reached at all is told apart from a request that started and broke off.

use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::warn;

use crate::config::RpcConfig;

/// Error types for JSON-RPC calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcFailure {
    /// HTTP client could not be built
    #[error("Client setup failed: {0}")]
    Client(String),

    /// Nothing accepted the connection
    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),

    /// Request was sent but did not complete (timeout, reset)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// JSON-RPC error object
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Body or result could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RpcFailure {
    fn from_send(err: reqwest::Error) -> Self {
        if err.is_connect() && !err.is_timeout() {
            Self::Unreachable(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// HTTP JSON-RPC client for one endpoint.
pub struct RpcClient {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(config: &RpcConfig) -> Result<Self, RpcFailure> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RpcFailure::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Call `method` and decode its result.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, RpcFailure> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(RpcFailure::from_send)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(method, status, "JSON-RPC endpoint returned HTTP error");
            return Err(RpcFailure::Http { status, body });
        }

        let rpc: RpcResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                RpcFailure::Transport(e.to_string())
            } else {
                RpcFailure::InvalidResponse(e.to_string())
            }
        })?;

        if let Some(err) = rpc.error {
            return Err(RpcFailure::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        let result = rpc.result.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(result).map_err(|e| RpcFailure::InvalidResponse(e.to_string()))
    }
}
