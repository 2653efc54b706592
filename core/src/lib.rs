// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # blockwindow — Core Library
//!
//! A bounded, chain-consistent window of the most recent blocks of a
//! blockchain, kept in memory and refreshed from an upstream node. Readers get
//! the window without ever causing an upstream call, and they never see a
//! window that is half rebuilt or broken in the middle.
//!
//! ## Architecture
//!
//! Leaves first:
//!
//! - **client** — the two questions we ask the node (tip hash, block by hash),
//!   over JSON-RPC or from an in-memory chain.
//! - **walker** — follows `previousblockhash` back from a tip to build a
//!   window. All or nothing.
//! - **sync** — the background loop: poll the tip, rebuild when it moves,
//!   publish.
//! - **store** — the one published snapshot, swapped atomically.
//! - **block** / **window** — the data and its linkage invariant.
//! - **config** — defaults, constants, and the checks on a sync config.
//!
//! ```text
//! NodeClient ─▶ ChainWalker ─▶ CacheSynchronizer ─▶ CacheStore ─▶ CacheReader
//! ```

pub mod block;
pub mod client;
pub mod config;
pub mod store;
pub mod sync;
pub mod walker;
pub mod window;

pub use block::{Block, BlockHash};
pub use client::{InMemoryNode, NodeClient, RpcNodeClient, UpstreamError};
pub use config::{ConfigError, RpcClientConfig, SyncConfig};
pub use store::{CacheReader, CacheStore, CacheUnavailable, Snapshot, SnapshotOrigin};
pub use sync::{CacheSynchronizer, PollOutcome, SyncError, SyncEvent};
pub use walker::{ChainWalker, Walk, WalkError};
pub use window::{ChainWindow, WindowError};
