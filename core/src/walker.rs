//! # Chain Walker
//!
//! Builds a chain window by following parent links backwards from a starting
//! hash:
//!
//! ```text
//!   getblock(tip) ──prev──▶ getblock(tip-1) ──prev──▶ … ──▶ stop
//!                                                          │
//!            N blocks collected, or genesis reached ◀──────┘
//! ```
//!
//! A walk is all-or-nothing. If any fetch fails, or the node hands back a
//! block other than the one asked for, the walk returns an error and every
//! block fetched so far is dropped. A half-built window never leaves this
//! module.
//!
//! When an *anchor* window is supplied, the walk also stops as soon as it
//! reaches a block whose parent is the anchor's tip, and splices the fetched
//! blocks onto the anchor instead of fetching the rest again. A reorg never
//! meets the anchor, so it degrades into a full walk.

use thiserror::Error;

use crate::block::{Block, BlockHash};
use crate::client::{NodeClient, UpstreamError};
use crate::window::{ChainWindow, WindowError};

/// Why a walk produced no window.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalkError {
    /// Walks must request at least one block.
    #[error("walk depth must be at least 1")]
    ZeroDepth,

    /// Fetching the block at `depth` (0 = start) failed.
    #[error("fetching block {hash} at depth {depth} failed: {source}")]
    Upstream {
        depth: usize,
        hash: BlockHash,
        #[source]
        source: UpstreamError,
    },

    /// The fetched blocks did not form a valid window.
    #[error("walk produced an invalid window: {0}")]
    Window(#[from] WindowError),
}

impl WalkError {
    /// The upstream failure behind this error, if any.
    pub fn upstream(&self) -> Option<&UpstreamError> {
        match self {
            Self::Upstream { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// How a window was produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Walk {
    /// Every block was fetched from the node.
    Full(ChainWindow),
    /// `fetched` new blocks were put in front of the anchor window.
    Extended { window: ChainWindow, fetched: usize },
}

impl Walk {
    pub fn window(&self) -> &ChainWindow {
        match self {
            Self::Full(window) | Self::Extended { window, .. } => window,
        }
    }

    pub fn into_window(self) -> ChainWindow {
        match self {
            Self::Full(window) | Self::Extended { window, .. } => window,
        }
    }
}

/// Follows `previousblockhash` links through a [`NodeClient`].
pub struct ChainWalker<C> {
    client: C,
}

impl<C: NodeClient> ChainWalker<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fetches up to `max_blocks` blocks starting at `start`, newest first.
    pub async fn walk(
        &self,
        start: &BlockHash,
        max_blocks: usize,
    ) -> Result<ChainWindow, WalkError> {
        self.walk_from(start, max_blocks, None)
            .await
            .map(Walk::into_window)
    }

    /// Like [`walk`](Self::walk), but stops early and splices onto `anchor`
    /// when the walk reaches the anchor's tip.
    pub async fn walk_to_anchor(
        &self,
        start: &BlockHash,
        max_blocks: usize,
        anchor: &ChainWindow,
    ) -> Result<Walk, WalkError> {
        self.walk_from(start, max_blocks, Some(anchor)).await
    }

    async fn walk_from(
        &self,
        start: &BlockHash,
        max_blocks: usize,
        anchor: Option<&ChainWindow>,
    ) -> Result<Walk, WalkError> {
        if max_blocks == 0 {
            return Err(WalkError::ZeroDepth);
        }

        let mut fetched: Vec<Block> = Vec::with_capacity(max_blocks.min(64));
        let mut next = start.clone();

        loop {
            let block = self.fetch(&next, fetched.len()).await?;
            let parent = block.previous_block_hash.clone();
            fetched.push(block);

            if fetched.len() == max_blocks {
                break;
            }

            match parent {
                None => break,
                Some(parent) => {
                    if let Some(anchor) = anchor.filter(|a| a.tip_hash() == &parent) {
                        let count = fetched.len();
                        let window = anchor.extend(fetched, max_blocks)?;
                        tracing::debug!(
                            tip = %window.tip_hash(),
                            fetched = count,
                            len = window.len(),
                            "walk reached anchor"
                        );
                        return Ok(Walk::Extended {
                            window,
                            fetched: count,
                        });
                    }
                    next = parent;
                }
            }
        }

        let window = ChainWindow::bounded(fetched, max_blocks)?;
        tracing::debug!(
            tip = %window.tip_hash(),
            len = window.len(),
            genesis = window.reaches_genesis(),
            "full walk complete"
        );
        Ok(Walk::Full(window))
    }

    async fn fetch(&self, hash: &BlockHash, depth: usize) -> Result<Block, WalkError> {
        let block = self
            .client
            .get_block(hash)
            .await
            .map_err(|source| WalkError::Upstream {
                depth,
                hash: hash.clone(),
                source,
            })?;

        if &block.hash != hash {
            return Err(WalkError::Upstream {
                depth,
                hash: hash.clone(),
                source: UpstreamError::HashMismatch {
                    requested: hash.clone(),
                    returned: block.hash,
                },
            });
        }
        Ok(block)
    }
}
