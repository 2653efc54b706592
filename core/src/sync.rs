//! # Cache Synchronizer
//!
//! The single writer of the block cache. Each poll runs through:
//!
//! ```text
//!   Idle ──tick──▶ Polling ──tip unchanged──────────────────────▶ Idle
//!                     │
//!                     └──tip differs──▶ Rebuilding ──ok──▶ publish ──▶ Idle
//!                                          │
//!                                          └──err──▶ keep snapshot ──▶ Idle
//! ```
//!
//! A failed poll never ends the loop and never touches the published
//! snapshot; it is logged, reported as a [`SyncEvent::SyncFailed`], and the
//! next tick tries again. A reorg takes the same path as an ordinary advance:
//! the window is always re-derived from the new tip's own ancestry.
//!
//! The loop stops on the shutdown broadcast. A rebuild still in flight at that
//! point is dropped before it can publish.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::block::BlockHash;
use crate::client::{NodeClient, UpstreamError};
use crate::config::{ConfigError, SyncConfig, EVENT_CHANNEL_CAPACITY};
use crate::store::{CacheReader, CacheStore, Snapshot, SnapshotOrigin};
use crate::walker::{ChainWalker, Walk, WalkError};

// ---------------------------------------------------------------------------
// Errors, Outcomes, Events
// ---------------------------------------------------------------------------

/// Why a poll did not publish.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("tip query failed: {0}")]
    Tip(#[source] UpstreamError),

    #[error(transparent)]
    Walk(#[from] WalkError),
}

impl SyncError {
    /// The upstream failure behind this error, if any.
    pub fn upstream(&self) -> Option<&UpstreamError> {
        match self {
            Self::Tip(e) => Some(e),
            Self::Walk(e) => e.upstream(),
        }
    }
}

/// Result of a successful poll.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// The node's tip matches the cached tip; nothing was fetched.
    Unchanged {
        tip: BlockHash,
    },
    /// A new snapshot was built and published.
    Published {
        snapshot: Arc<Snapshot>,
        elapsed: Duration,
    },
}

/// Broadcast after every poll the synchronizer completes.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    SnapshotPublished {
        snapshot: Arc<Snapshot>,
        elapsed: Duration,
    },
    TipUnchanged {
        tip: BlockHash,
    },
    SyncFailed {
        error: SyncError,
    },
}

// ---------------------------------------------------------------------------
// CacheSynchronizer
// ---------------------------------------------------------------------------

/// Keeps a [`CacheStore`] in step with an upstream node.
pub struct CacheSynchronizer<C> {
    walker: ChainWalker<C>,
    store: CacheStore,
    config: SyncConfig,
    events: broadcast::Sender<SyncEvent>,
}

impl<C: NodeClient> CacheSynchronizer<C> {
    /// Fails if `config` has an empty or oversized window, or a zero poll
    /// interval.
    pub fn new(client: C, config: SyncConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            walker: ChainWalker::new(client),
            store: CacheStore::new(),
            config,
            events,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// A read handle onto the cache this synchronizer maintains.
    pub fn reader(&self) -> CacheReader {
        self.store.reader()
    }

    /// Subscribes to the events of every poll completed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Runs one Polling step and, if needed, one Rebuilding step.
    pub async fn poll_once(&mut self) -> Result<PollOutcome, SyncError> {
        let result = self.sync_to_tip().await;

        let event = match &result {
            Ok(PollOutcome::Unchanged { tip }) => {
                debug!(tip = %tip, "tip unchanged");
                SyncEvent::TipUnchanged { tip: tip.clone() }
            }
            Ok(PollOutcome::Published { snapshot, elapsed }) => {
                info!(
                    tip = %snapshot.tip_hash(),
                    height = ?snapshot.window().tip().height(),
                    len = snapshot.len(),
                    generation = snapshot.generation(),
                    origin = ?snapshot.origin(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "published block cache snapshot"
                );
                SyncEvent::SnapshotPublished {
                    snapshot: Arc::clone(snapshot),
                    elapsed: *elapsed,
                }
            }
            Err(error) => {
                warn!(
                    error = %error,
                    cached_tip = ?self.store.tip_hash().map(|h| h.to_string()),
                    "cache sync failed, keeping last snapshot"
                );
                SyncEvent::SyncFailed {
                    error: error.clone(),
                }
            }
        };
        // No subscribers is not an error.
        let _ = self.events.send(event);

        result
    }

    async fn sync_to_tip(&mut self) -> Result<PollOutcome, SyncError> {
        let tip = self
            .walker
            .client()
            .best_block_hash()
            .await
            .map_err(SyncError::Tip)?;

        let current = self.store.current();
        if let Some(current) = &current {
            if current.tip_hash() == &tip {
                return Ok(PollOutcome::Unchanged { tip });
            }
        }

        let started = Instant::now();
        let depth = self.config.cache_size;
        let (window, origin) = match current.filter(|_| self.config.incremental) {
            Some(anchor) => match self.walker.walk_to_anchor(&tip, depth, anchor.window()).await? {
                Walk::Full(window) => (window, SnapshotOrigin::Rebuilt),
                Walk::Extended { window, fetched } => {
                    (window, SnapshotOrigin::Extended { fetched })
                }
            },
            None => (self.walker.walk(&tip, depth).await?, SnapshotOrigin::Rebuilt),
        };

        let snapshot = self.store.replace(window, origin);
        Ok(PollOutcome::Published {
            snapshot,
            elapsed: started.elapsed(),
        })
    }

    /// Polls every `poll_interval` until `shutdown` fires (or its sender is
    /// dropped). The first poll happens immediately.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            cache_size = self.config.cache_size,
            poll_interval_secs = self.config.poll_interval.as_secs(),
            incremental = self.config.incremental,
            "cache synchronizer started"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => break,
                _ = interval.tick() => {}
            }

            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    debug!("shutdown during poll, discarding in-flight rebuild");
                    break;
                }
                // Outcome already logged and broadcast by poll_once.
                _ = self.poll_once() => {}
            }
        }

        info!("cache synchronizer stopped");
    }
}

impl<C: NodeClient + 'static> CacheSynchronizer<C> {
    /// Moves the synchronizer onto its own task.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
