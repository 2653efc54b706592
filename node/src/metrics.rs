//! # Prometheus Metrics
//!
//! Exposes operational metrics for the cache service. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers. They are fed
//! from the synchronizer's event channel, never from the sync loop directly.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use blockwindow_core::SyncEvent;

/// Holds all Prometheus metric handles for the service.
///
/// Clone-friendly (wraps `Arc` internally via prometheus handles) so it can
/// be shared across request handlers and background tasks.
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Total number of completed tip polls, successful or not.
    pub polls_total: IntCounter,
    /// Total number of snapshots published.
    pub snapshots_published_total: IntCounter,
    /// Total number of polls that failed and left the snapshot in place.
    pub sync_failures_total: IntCounter,
    /// Number of blocks in the current snapshot.
    pub cached_blocks: IntGauge,
    /// Height of the newest cached block, when the node reports heights.
    pub tip_height: IntGauge,
    /// Generation number of the current snapshot.
    pub snapshot_generation: IntGauge,
    /// Histogram of rebuild duration in seconds.
    pub rebuild_duration_seconds: Histogram,
}

impl ServiceMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("blockwindow".into()), None)
            .expect("failed to create prometheus registry");

        let polls_total = IntCounter::new("polls_total", "Total number of completed tip polls")
            .expect("metric creation");
        registry
            .register(Box::new(polls_total.clone()))
            .expect("metric registration");

        let snapshots_published_total = IntCounter::new(
            "snapshots_published_total",
            "Total number of block window snapshots published",
        )
        .expect("metric creation");
        registry
            .register(Box::new(snapshots_published_total.clone()))
            .expect("metric registration");

        let sync_failures_total = IntCounter::new(
            "sync_failures_total",
            "Total number of polls that failed to refresh the cache",
        )
        .expect("metric creation");
        registry
            .register(Box::new(sync_failures_total.clone()))
            .expect("metric registration");

        let cached_blocks = IntGauge::new(
            "cached_blocks",
            "Number of blocks in the current snapshot",
        )
        .expect("metric creation");
        registry
            .register(Box::new(cached_blocks.clone()))
            .expect("metric registration");

        let tip_height = IntGauge::new("tip_height", "Height of the newest cached block")
            .expect("metric creation");
        registry
            .register(Box::new(tip_height.clone()))
            .expect("metric registration");

        let snapshot_generation = IntGauge::new(
            "snapshot_generation",
            "Generation number of the current snapshot",
        )
        .expect("metric creation");
        registry
            .register(Box::new(snapshot_generation.clone()))
            .expect("metric registration");

        let rebuild_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "rebuild_duration_seconds",
                "Time spent fetching and publishing a new window, in seconds",
            )
            .buckets(vec![
                0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(rebuild_duration_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            polls_total,
            snapshots_published_total,
            sync_failures_total,
            cached_blocks,
            tip_height,
            snapshot_generation,
            rebuild_duration_seconds,
        }
    }

    /// Applies one synchronizer event.
    pub fn record(&self, event: &SyncEvent) {
        self.polls_total.inc();
        match event {
            SyncEvent::SnapshotPublished { snapshot, elapsed } => {
                self.snapshots_published_total.inc();
                self.cached_blocks.set(snapshot.len() as i64);
                self.snapshot_generation.set(snapshot.generation() as i64);
                if let Some(height) = snapshot.window().tip().height() {
                    self.tip_height.set(height as i64);
                }
                self.rebuild_duration_seconds.observe(elapsed.as_secs_f64());
            }
            SyncEvent::TipUnchanged { .. } => {}
            SyncEvent::SyncFailed { .. } => self.sync_failures_total.inc(),
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers via extension.
pub type SharedMetrics = Arc<ServiceMetrics>;

/// Records synchronizer events until the channel closes.
pub async fn record_events(metrics: SharedMetrics, mut events: broadcast::Receiver<SyncEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => metrics.record(&event),
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "metrics recorder fell behind sync events");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
