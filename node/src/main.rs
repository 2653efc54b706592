// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # blockwindow Node
//!
//! Entry point for the `blockwindow-node` binary. Parses CLI arguments,
//! initializes logging and metrics, starts the cache synchronizer, and serves
//! the read API.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — start the cache service
//! - `status`  — query a running service's status endpoint
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;

use blockwindow_core::{CacheSynchronizer, RpcNodeClient};

use cli::{BlockWindowCli, Commands};
use metrics::ServiceMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = BlockWindowCli::parse();

    match cli.command {
        Commands::Run(args) => run_service(args).await,
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full service: synchronizer task, API server, and metrics
/// endpoint. Returns after a shutdown signal once the synchronizer has
/// stopped, or with an error when a server or the sync loop ends on its own.
async fn run_service(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(args.log_format)
        .context("failed to initialize logging")?;

    let sync_config = args.sync_config();
    let rpc_config = args.rpc_config();

    tracing::info!(
        rpc_url = %rpc_config.url,
        cache_size = sync_config.cache_size,
        poll_interval_secs = args.poll_interval_secs,
        incremental = sync_config.incremental,
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        "starting blockwindow-node"
    );

    // --- Upstream client ---
    let client = RpcNodeClient::new(rpc_config)
        .context("failed to build upstream RPC client")?;

    // --- Synchronizer ---
    let sync = CacheSynchronizer::new(client, sync_config)
        .context("invalid sync configuration")?;
    let reader = sync.reader();
    let events = sync.subscribe();

    // --- Metrics ---
    let service_metrics = Arc::new(ServiceMetrics::new());
    let recorder = tokio::spawn(metrics::record_events(Arc::clone(&service_metrics), events));

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache_size: sync.config().cache_size,
        reader,
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&service_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Sync loop ---
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut sync_handle = sync.spawn(shutdown_rx);
    let mut sync_exited = false;

    // --- Serve ---
    let outcome = tokio::select! {
        res = axum::serve(api_listener, api_router) => res.context("API server failed"),
        res = axum::serve(metrics_listener, metrics_router) => {
            res.context("metrics server failed")
        }
        res = &mut sync_handle => {
            sync_exited = true;
            match res {
                Ok(()) => Err(anyhow!("cache synchronizer stopped unexpectedly")),
                Err(e) => Err(anyhow::Error::new(e).context("synchronizer task panicked")),
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    };

    if !sync_exited {
        // A send error only means the loop already exited.
        let _ = shutdown_tx.send(());
        sync_handle.await.context("synchronizer task panicked")?;
    }
    // The sync loop owned the event sender; its exit closes the channel.
    recorder.await.context("metrics recorder task panicked")?;

    if let Err(e) = &outcome {
        tracing::error!("blockwindow-node stopping on error: {:#}", e);
        return outcome;
    }

    tracing::info!("blockwindow-node stopped");
    Ok(())
}

/// Queries a running service's status endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let url = format!("{}/status", args.api_url.trim_end_matches('/'));
    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("failed to reach {}", url))?
        .error_for_status()
        .with_context(|| format!("{} returned an error status", url))?;

    let status: api::StatusResponse = response
        .json()
        .await
        .context("status endpoint returned an unexpected body")?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("blockwindow-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc            {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
