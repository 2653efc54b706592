//! # Cache Store
//!
//! Holds the one published [`Snapshot`]. Publication is a single pointer swap
//! (`arc_swap::ArcSwapOption`), so a reader either gets the previous snapshot
//! in full or the new one in full. Readers never take a lock the writer holds
//! and never wait on network I/O.
//!
//! Write access is split from read access at the type level:
//!
//! ```text
//! CacheStore  (one, owned by the synchronizer) ── replace() ──┐
//!                                                             ▼
//!                                          Arc<ArcSwapOption<Snapshot>>
//!                                                             ▲
//! CacheReader (cloned into every request handler) ── load() ──┘
//! ```
//!
//! `replace` takes `&mut self`, so the compiler enforces the single-writer
//! rule. Superseded snapshots are freed once the last reader drops its `Arc`.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::ser::{Serialize, Serializer};
use thiserror::Error;

use crate::block::{Block, BlockHash};
use crate::window::ChainWindow;

/// Read before the first successful rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("block cache is not populated yet")]
pub struct CacheUnavailable;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// How a snapshot's window was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    /// Every block was fetched from the node.
    Rebuilt,
    /// `fetched` new blocks were spliced onto the previous snapshot.
    Extended { fetched: usize },
}

/// One immutable, published chain window.
#[derive(Debug)]
pub struct Snapshot {
    window: ChainWindow,
    generation: u64,
    published_at: DateTime<Utc>,
    origin: SnapshotOrigin,
}

impl Snapshot {
    pub fn window(&self) -> &ChainWindow {
        &self.window
    }

    /// 1 for the first snapshot published by a store, +1 per replace.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    pub fn origin(&self) -> SnapshotOrigin {
        self.origin
    }

    pub fn tip_hash(&self) -> &BlockHash {
        self.window.tip_hash()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Serializable view of the blocks, oldest first. Borrows, never copies.
    pub fn oldest_first(&self) -> OldestFirst<'_> {
        OldestFirst(&self.window)
    }

    /// Owned copy of the blocks, oldest first.
    pub fn to_vec_oldest_first(&self) -> Vec<Block> {
        self.window.oldest_first().cloned().collect()
    }
}

/// Serializes a window as a JSON array in reading order.
pub struct OldestFirst<'a>(&'a ChainWindow);

impl Serialize for OldestFirst<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.oldest_first())
    }
}

// ---------------------------------------------------------------------------
// CacheStore / CacheReader
// ---------------------------------------------------------------------------

/// Write handle to the published snapshot. Exactly one exists per cache.
#[derive(Debug, Default)]
pub struct CacheStore {
    current: Arc<ArcSwapOption<Snapshot>>,
    generation: u64,
}

/// Read handle to the published snapshot. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CacheReader {
    current: Arc<ArcSwapOption<Snapshot>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new read handle onto this store.
    pub fn reader(&self) -> CacheReader {
        CacheReader {
            current: Arc::clone(&self.current),
        }
    }

    /// Installs `window` as the current snapshot and returns it.
    pub fn replace(&mut self, window: ChainWindow, origin: SnapshotOrigin) -> Arc<Snapshot> {
        self.generation += 1;
        let snapshot = Arc::new(Snapshot {
            window,
            generation: self.generation,
            published_at: Utc::now(),
            origin,
        });
        self.current.store(Some(Arc::clone(&snapshot)));
        snapshot
    }

    /// The snapshot currently published, if any.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    pub fn tip_hash(&self) -> Option<BlockHash> {
        self.current
            .load()
            .as_ref()
            .map(|snapshot| snapshot.tip_hash().clone())
    }
}

impl CacheReader {
    /// The snapshot current at call time.
    pub fn read_current(&self) -> Result<Arc<Snapshot>, CacheUnavailable> {
        self.current.load_full().ok_or(CacheUnavailable)
    }

    pub fn is_ready(&self) -> bool {
        self.current.load().is_some()
    }
}
