//! # Block Records
//!
//! The cache treats blocks as opaque JSON records. Exactly two fields carry
//! meaning here: `hash`, which identifies the block, and `previousblockhash`,
//! which links it to its parent. Everything else the upstream node returns
//! (height, transactions, difficulty, ...) is captured in [`Block::extra`] and
//! served back to readers untouched.
//!
//! ```text
//! {
//!   "hash": "00ab…",                 → Block::hash
//!   "previousblockhash": "00cd…",    → Block::previous_block_hash (absent at genesis)
//!   "height": 1042,                  ┐
//!   "tx": [ … ],                     ├ Block::extra
//!   …                                ┘
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

// ---------------------------------------------------------------------------
// BlockHash
// ---------------------------------------------------------------------------

/// A block identifier as reported by the upstream node: a non-empty string of
/// hex digits.
///
/// The hash is kept in its textual form because that is what readers get back
/// and what the node expects as a `getblock` parameter. Byte order is the
/// node's business, not ours.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlockHash(String);

/// Rejected block hash string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid block hash {0:?}: expected a non-empty hex string")]
pub struct InvalidBlockHash(pub String);

impl BlockHash {
    /// Validates and wraps a hash string.
    pub fn parse(s: impl Into<String>) -> Result<Self, InvalidBlockHash> {
        let s = s.into();
        if s.is_empty() || hex::decode(&s).is_err() {
            return Err(InvalidBlockHash(s));
        }
        Ok(Self(s))
    }

    /// The hash as sent over the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BlockHash {
    type Error = InvalidBlockHash;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<BlockHash> for String {
    fn from(hash: BlockHash) -> Self {
        hash.0
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// One block as returned by `getblock <hash> true`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Identifier of this block.
    pub hash: BlockHash,

    /// Identifier of the parent block. `None` only for genesis.
    #[serde(
        rename = "previousblockhash",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub previous_block_hash: Option<BlockHash>,

    /// Every other field of the upstream record, passed through as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Block {
    /// Builds a block with no passthrough fields.
    pub fn new(hash: BlockHash, previous_block_hash: Option<BlockHash>) -> Self {
        Self {
            hash,
            previous_block_hash,
            extra: Map::new(),
        }
    }

    /// Adds a passthrough field. Builder-style, mostly for tests and fixtures.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// `true` when the block has no parent link.
    pub fn is_genesis(&self) -> bool {
        self.previous_block_hash.is_none()
    }

    /// `true` when `self` directly extends `parent`.
    pub fn is_child_of(&self, parent: &Block) -> bool {
        self.previous_block_hash.as_ref() == Some(&parent.hash)
    }

    /// The `height` passthrough field, when the upstream reports one.
    pub fn height(&self) -> Option<u64> {
        self.extra.get("height").and_then(Value::as_u64)
    }
}
