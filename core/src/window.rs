//! Linked, bounded sequences of blocks, newest first.

use thiserror::Error;

use crate::block::{Block, BlockHash};

/// Reasons a sequence of blocks is not a valid chain window.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    /// A window always holds at least its tip.
    #[error("chain window cannot be empty")]
    Empty,

    /// `blocks[index]` does not point at `blocks[index + 1]`.
    #[error("broken link at index {index}: expected parent {expected}, found {found:?}")]
    BrokenLink {
        index: usize,
        expected: BlockHash,
        found: Option<BlockHash>,
    },

    /// More blocks than the configured bound.
    #[error("window holds {len} blocks, bound is {bound}")]
    TooLong {
        len: usize,
        bound: usize,
    },
}

/// A non-empty run of blocks, newest first, where every block's
/// `previousblockhash` is the hash of the block after it.
///
/// The type can only be built through constructors that check the linkage,
/// so holding a `ChainWindow` is proof that the invariant holds.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainWindow {
    blocks: Vec<Block>,
}

impl ChainWindow {
    /// Validates `blocks` (newest first) and wraps them.
    pub fn from_newest_first(blocks: Vec<Block>) -> Result<Self, WindowError> {
        if blocks.is_empty() {
            return Err(WindowError::Empty);
        }
        verify_linkage(&blocks)?;
        Ok(Self { blocks })
    }

    /// Validates `blocks` (newest first) and checks them against `bound`.
    pub fn bounded(blocks: Vec<Block>, bound: usize) -> Result<Self, WindowError> {
        if blocks.len() > bound {
            return Err(WindowError::TooLong {
                len: blocks.len(),
                bound,
            });
        }
        Self::from_newest_first(blocks)
    }

    /// Puts `newer` (newest first) in front of this window and keeps at most
    /// `bound` blocks, dropping the oldest ones.
    ///
    /// Fails when the oldest block of `newer` is not a child of this window's
    /// tip.
    pub fn extend(&self, newer: Vec<Block>, bound: usize) -> Result<Self, WindowError> {
        let mut blocks = newer;
        if blocks.is_empty() {
            return Err(WindowError::Empty);
        }
        blocks.truncate(bound);
        let room = bound - blocks.len();
        blocks.extend(self.blocks.iter().take(room).cloned());
        Self::bounded(blocks, bound)
    }

    /// The newest block.
    pub fn tip(&self) -> &Block {
        &self.blocks[0]
    }

    /// Hash of the newest block.
    pub fn tip_hash(&self) -> &BlockHash {
        &self.tip().hash
    }

    /// The oldest block held.
    pub fn oldest(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// `true` when the window bottoms out at the genesis block.
    pub fn reaches_genesis(&self) -> bool {
        self.oldest().is_genesis()
    }

    /// The blocks in walk order, newest first.
    pub fn newest_first(&self) -> &[Block] {
        &self.blocks
    }

    /// The blocks in reading order, oldest first.
    pub fn oldest_first(&self) -> impl DoubleEndedIterator<Item = &Block> + ExactSizeIterator {
        self.blocks.iter().rev()
    }
}

/// Checks the parent links of a newest-first block slice.
pub fn verify_linkage(blocks: &[Block]) -> Result<(), WindowError> {
    for (index, pair) in blocks.windows(2).enumerate() {
        let (child, parent) = (&pair[0], &pair[1]);
        if !child.is_child_of(parent) {
            return Err(WindowError::BrokenLink {
                index,
                expected: parent.hash.clone(),
                found: child.previous_block_hash.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(n: u8) -> BlockHash {
        BlockHash::parse(hex::encode([n; 32])).unwrap()
    }

    /// Blocks `from..=to` where block `n` points at `n - 1` and block 0 is
    /// genesis. Returned newest first.
    fn chain(from: u8, to: u8) -> Vec<Block> {
        (from..=to)
            .rev()
            .map(|n| {
                let prev = if n == 0 { None } else { Some(hash(n - 1)) };
                Block::new(hash(n), prev)
            })
            .collect()
    }

    #[test]
    fn linked_blocks_form_a_window() {
        let window = ChainWindow::from_newest_first(chain(3, 7)).unwrap();
        assert_eq!(window.len(), 5);
        assert_eq!(window.tip_hash(), &hash(7));
        assert_eq!(window.oldest().hash, hash(3));
        assert!(!window.reaches_genesis());

        let oldest_first: Vec<_> = window.oldest_first().map(|b| b.hash.clone()).collect();
        assert_eq!(oldest_first, (3..=7).map(hash).collect::<Vec<_>>());
    }

    #[test]
    fn broken_link_is_rejected_with_its_position() {
        let mut blocks = chain(0, 4);
        blocks.remove(2); // 4, 3, 1, 0

        match ChainWindow::from_newest_first(blocks) {
            Err(WindowError::BrokenLink { index, expected, found }) => {
                assert_eq!(index, 1);
                assert_eq!(expected, hash(1));
                assert_eq!(found, Some(hash(2)));
            }
            other => panic!("expected BrokenLink, got {:?}", other),
        }
    }

    #[test]
    fn empty_and_oversized_windows_are_rejected() {
        assert_eq!(
            ChainWindow::from_newest_first(Vec::new()),
            Err(WindowError::Empty)
        );
        assert_eq!(
            ChainWindow::bounded(chain(0, 3), 3),
            Err(WindowError::TooLong { len: 4, bound: 3 })
        );
    }

    #[test]
    fn genesis_window() {
        let window = ChainWindow::from_newest_first(chain(0, 2)).unwrap();
        assert!(window.reaches_genesis());
    }

    #[test]
    fn extend_prepends_and_drops_oldest() {
        let window = ChainWindow::bounded(chain(0, 2), 3).unwrap();
        let extended = window.extend(chain(3, 4), 3).unwrap();

        let hashes: Vec<_> = extended
            .newest_first()
            .iter()
            .map(|b| b.hash.clone())
            .collect();
        assert_eq!(hashes, vec![hash(4), hash(3), hash(2)]);
        // The window being extended is untouched.
        assert_eq!(window.tip_hash(), &hash(2));
    }

    #[test]
    fn extend_refuses_unrelated_blocks() {
        let window = ChainWindow::bounded(chain(0, 2), 5).unwrap();
        let fork = vec![Block::new(hash(9), Some(hash(8)))];
        assert!(matches!(
            window.extend(fork, 5),
            Err(WindowError::BrokenLink { .. })
        ));
    }

    #[test]
    fn extend_longer_than_bound_keeps_only_new_blocks() {
        let window = ChainWindow::bounded(chain(0, 1), 2).unwrap();
        let extended = window.extend(chain(2, 5), 2).unwrap();
        let hashes: Vec<_> = extended
            .newest_first()
            .iter()
            .map(|b| b.hash.clone())
            .collect();
        assert_eq!(hashes, vec![hash(5), hash(4)]);
    }
}
