//! # Upstream Node Client
//!
//! The cache needs exactly two things from the node it mirrors: the hash of
//! the current best block, and a block by hash. [`NodeClient`] captures that
//! contract so the walker and synchronizer never touch HTTP directly.
//!
//! ```text
//! rpc.rs    — RpcNodeClient: JSON-RPC 1.0 over HTTP with basic auth (reqwest)
//! memory.rs — InMemoryNode: scripted chain with call counters and fault
//!             injection, for tests and local dry runs
//! ```
//!
//! Neither implementation retries. A failed call is reported to the caller,
//! and the synchronizer decides what to do about it (log it and wait for the
//! next poll).

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::block::{Block, BlockHash};

pub mod memory;
pub mod rpc;

pub use memory::InMemoryNode;
pub use rpc::RpcNodeClient;

// ---------------------------------------------------------------------------
// UpstreamError
// ---------------------------------------------------------------------------

/// Anything that went wrong talking to the upstream node or making sense of
/// its answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// Connection refused, reset, DNS failure, TLS failure, ...
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The node rejected our credentials.
    #[error("authentication rejected (HTTP {status})")]
    Unauthorized {
        status: u16,
    },

    /// Non-success HTTP status without a JSON-RPC error body.
    #[error("unexpected HTTP status {status}")]
    Http {
        status: u16,
    },

    /// The node answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
    },

    /// The node does not know the requested block.
    #[error("block not found: {0}")]
    BlockNotFound(BlockHash),

    /// The node returned a different block than the one requested.
    #[error("requested block {requested}, node returned {returned}")]
    HashMismatch {
        requested: BlockHash,
        returned: BlockHash,
    },

    /// The response could not be decoded into the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// NodeClient
// ---------------------------------------------------------------------------

/// Read-only view of an upstream node.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Hash of the node's current best block (the tip).
    async fn best_block_hash(&self) -> Result<BlockHash, UpstreamError>;

    /// The block identified by `hash`, with full transaction detail.
    async fn get_block(&self, hash: &BlockHash) -> Result<Block, UpstreamError>;
}

#[async_trait]
impl<T: NodeClient + ?Sized> NodeClient for Arc<T> {
    async fn best_block_hash(&self) -> Result<BlockHash, UpstreamError> {
        (**self).best_block_hash().await
    }

    async fn get_block(&self, hash: &BlockHash) -> Result<Block, UpstreamError> {
        (**self).get_block(hash).await
    }
}
