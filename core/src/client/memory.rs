//! A scripted node held entirely in memory.
//!
//! `InMemoryNode` stores blocks by hash and a movable tip. It counts every
//! call it receives and can be told to fail specific requests, which makes it
//! the test double for the walker and synchronizer: "the 5th block fetch
//! fails", "the tip query times out", "fetches take 50ms each".

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{NodeClient, UpstreamError};
use crate::block::{Block, BlockHash};

#[derive(Default)]
struct NodeState {
    blocks: HashMap<BlockHash, Block>,
    tip: Option<BlockHash>,
    tip_failure: Option<UpstreamError>,
    failing_blocks: HashSet<BlockHash>,
    /// Number of further block fetches that succeed before one fails.
    fail_block_fetch_after: Option<usize>,
    fetch_delay: Option<Duration>,
}

/// In-memory [`NodeClient`] with call counters and fault injection.
#[derive(Default)]
pub struct InMemoryNode {
    state: Mutex<NodeState>,
    tip_calls: AtomicUsize,
    block_calls: AtomicUsize,
}

impl InMemoryNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a node holding `blocks` (any order) with its tip at `tip`.
    pub fn with_chain(blocks: impl IntoIterator<Item = Block>, tip: BlockHash) -> Self {
        let node = Self::new();
        for block in blocks {
            node.insert(block);
        }
        node.set_tip(tip);
        node
    }

    /// Makes `block` retrievable without moving the tip.
    pub fn insert(&self, block: Block) {
        self.state.lock().blocks.insert(block.hash.clone(), block);
    }

    /// Inserts `block` and makes it the tip.
    pub fn push(&self, block: Block) {
        let hash = block.hash.clone();
        let mut state = self.state.lock();
        state.blocks.insert(hash.clone(), block);
        state.tip = Some(hash);
    }

    pub fn set_tip(&self, hash: BlockHash) {
        self.state.lock().tip = Some(hash);
    }

    /// Makes every tip query fail with `error` until cleared with `None`.
    pub fn fail_tip(&self, error: Option<UpstreamError>) {
        self.state.lock().tip_failure = error;
    }

    /// Makes fetches of `hash` fail with a transport error.
    pub fn fail_block(&self, hash: BlockHash) {
        self.state.lock().failing_blocks.insert(hash);
    }

    /// Lets the next `successes` block fetches through, then fails exactly one.
    pub fn fail_block_fetch_after(&self, successes: usize) {
        self.state.lock().fail_block_fetch_after = Some(successes);
    }

    /// Clears every injected failure, tip queries included.
    pub fn heal(&self) {
        let mut state = self.state.lock();
        state.failing_blocks.clear();
        state.fail_block_fetch_after = None;
        state.tip_failure = None;
    }

    /// Adds latency to every block fetch.
    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        self.state.lock().fetch_delay = delay;
    }

    /// Number of `best_block_hash` calls so far.
    pub fn tip_calls(&self) -> usize {
        self.tip_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_block` calls so far, successful or not.
    pub fn block_calls(&self) -> usize {
        self.block_calls.load(Ordering::SeqCst)
    }

    /// Decides the outcome of one block fetch while holding the lock.
    fn lookup(&self, hash: &BlockHash) -> Result<Block, UpstreamError> {
        let mut state = self.state.lock();

        if let Some(remaining) = state.fail_block_fetch_after {
            if remaining == 0 {
                state.fail_block_fetch_after = None;
                return Err(UpstreamError::Transport("injected fetch failure".into()));
            }
            state.fail_block_fetch_after = Some(remaining - 1);
        }

        if state.failing_blocks.contains(hash) {
            return Err(UpstreamError::Transport(format!(
                "injected failure for block {}",
                hash
            )));
        }

        state
            .blocks
            .get(hash)
            .cloned()
            .ok_or_else(|| UpstreamError::BlockNotFound(hash.clone()))
    }
}

#[async_trait]
impl NodeClient for InMemoryNode {
    async fn best_block_hash(&self) -> Result<BlockHash, UpstreamError> {
        self.tip_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        if let Some(err) = &state.tip_failure {
            return Err(err.clone());
        }
        state.tip.clone().ok_or_else(|| UpstreamError::Rpc {
            code: -28,
            message: "node has no chain yet".into(),
        })
    }

    async fn get_block(&self, hash: &BlockHash) -> Result<Block, UpstreamError> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.state.lock().fetch_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.lookup(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(n: u8) -> BlockHash {
        BlockHash::parse(hex::encode([n; 32])).unwrap()
    }

    #[tokio::test]
    async fn serves_inserted_blocks_and_counts_calls() {
        let node = InMemoryNode::new();
        node.push(Block::new(hash(1), None));

        assert_eq!(node.best_block_hash().await.unwrap(), hash(1));
        assert_eq!(node.get_block(&hash(1)).await.unwrap().hash, hash(1));
        assert_eq!(
            node.get_block(&hash(2)).await.unwrap_err(),
            UpstreamError::BlockNotFound(hash(2))
        );
        assert_eq!(node.tip_calls(), 1);
        assert_eq!(node.block_calls(), 2);
    }

    #[tokio::test]
    async fn fail_after_lets_n_fetches_through_then_fails_once() {
        let node = InMemoryNode::new();
        node.push(Block::new(hash(1), None));
        node.fail_block_fetch_after(2);

        assert!(node.get_block(&hash(1)).await.is_ok());
        assert!(node.get_block(&hash(1)).await.is_ok());
        assert!(matches!(
            node.get_block(&hash(1)).await,
            Err(UpstreamError::Transport(_))
        ));
        assert!(node.get_block(&hash(1)).await.is_ok());
    }

    #[tokio::test]
    async fn empty_node_has_no_tip() {
        let node = InMemoryNode::new();
        assert!(node.best_block_hash().await.is_err());
    }
}
