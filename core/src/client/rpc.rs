//! JSON-RPC 1.0 client for Bitcoin-style nodes.
//!
//! Requests are plain `POST`s of a JSON envelope with HTTP basic auth:
//!
//! ```text
//! {"jsonrpc":"1.0","id":"getblock","method":"getblock","params":["00ab…",true]}
//! ```
//!
//! Nodes of this family report RPC failures as a JSON error object, usually
//! together with HTTP 500, so the body is parsed before the status is judged.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{NodeClient, UpstreamError};
use crate::block::{Block, BlockHash};
use crate::config::{RpcClientConfig, JSONRPC_VERSION};

/// Error code Bitcoin-derived nodes use for "Block not found".
const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;

/// [`NodeClient`] backed by a node's JSON-RPC HTTP endpoint.
pub struct RpcNodeClient {
    client: Client,
    config: RpcClientConfig,
}

impl RpcNodeClient {
    /// Builds the underlying HTTP client with the configured timeout.
    pub fn new(config: RpcClientConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }

    async fn request<T>(&self, request: &RpcRequest) -> Result<T, UpstreamError>
    where
        T: DeserializeOwned,
    {
        let mut builder = self.client.post(&self.config.url).json(request);
        if !self.config.user.is_empty() {
            builder = builder.basic_auth(&self.config.user, Some(&self.config.password));
        }
        let response = builder.send().await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(UpstreamError::Unauthorized {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        tracing::trace!(
            method = request.method,
            status = status.as_u16(),
            bytes = body.len(),
            "rpc response"
        );

        let envelope: RpcResponse<T> = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(UpstreamError::Http {
                    status: status.as_u16(),
                })
            }
            Err(e) => {
                return Err(UpstreamError::Malformed(format!(
                    "{}: {}",
                    request.method, e
                )))
            }
        };

        if let Some(error) = envelope.error {
            return Err(UpstreamError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        envelope
            .result
            .ok_or_else(|| UpstreamError::Malformed(format!("{}: null result", request.method)))
    }
}

#[async_trait]
impl NodeClient for RpcNodeClient {
    async fn best_block_hash(&self) -> Result<BlockHash, UpstreamError> {
        let hash: String = self.request(&RpcRequest::new("getbestblockhash")).await?;
        BlockHash::parse(hash).map_err(|e| UpstreamError::Malformed(e.to_string()))
    }

    async fn get_block(&self, hash: &BlockHash) -> Result<Block, UpstreamError> {
        let params = vec![Value::String(hash.to_string()), Value::Bool(true)];
        match self
            .request(&RpcRequest::new_with_params("getblock", params))
            .await
        {
            Err(UpstreamError::Rpc { code, .. }) if code == RPC_INVALID_ADDRESS_OR_KEY => {
                Err(UpstreamError::BlockNotFound(hash.clone()))
            }
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire Types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'static str,
    params: Vec<Value>,
}

impl RpcRequest {
    fn new(method: &'static str) -> Self {
        Self::new_with_params(method, Vec::new())
    }

    fn new_with_params(method: &'static str, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: method,
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}
