//! # CLI Interface
//!
//! Defines the command-line argument structure for `blockwindow-node` using
//! `clap` derive. Supports three subcommands: `run`, `status`, and `version`.
//! Every `run` flag can also be set through a `BLOCKWINDOW_*` environment
//! variable.

use std::time::Duration;

use clap::{Parser, Subcommand};

use blockwindow_core::config::{DEFAULT_CACHE_SIZE, DEFAULT_RPC_URL, MAX_CACHE_SIZE};
use blockwindow_core::{RpcClientConfig, SyncConfig};

use crate::logging::LogFormat;

/// Block window cache service.
///
/// Keeps the most recent blocks of an upstream node in memory, always as one
/// unbroken chain segment, and serves them over HTTP without touching the
/// node on the request path.
#[derive(Parser, Debug)]
#[command(
    name = "blockwindow-node",
    about = "Chain-consistent cache of recent blocks",
    version,
    propagate_version = true
)]
pub struct BlockWindowCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the cache service.
    Run(RunArgs),
    /// Query the status of a running service.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// JSON-RPC endpoint of the upstream node.
    #[arg(long, env = "BLOCKWINDOW_RPC_URL", default_value = DEFAULT_RPC_URL)]
    pub rpc_url: String,

    /// HTTP basic auth user for the upstream node.
    #[arg(long, env = "BLOCKWINDOW_RPC_USER", default_value = "")]
    pub rpc_user: String,

    /// HTTP basic auth password for the upstream node.
    #[arg(long, env = "BLOCKWINDOW_RPC_PASSWORD", default_value = "", hide_env_values = true)]
    pub rpc_password: String,

    /// Number of blocks to keep.
    #[arg(
        long,
        env = "BLOCKWINDOW_CACHE_SIZE",
        default_value_t = DEFAULT_CACHE_SIZE,
        value_parser = parse_cache_size,
    )]
    pub cache_size: usize,

    /// Seconds between two tip polls.
    #[arg(
        long,
        env = "BLOCKWINDOW_POLL_INTERVAL_SECS",
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..),
    )]
    pub poll_interval_secs: u64,

    /// Timeout for each upstream request, in seconds.
    #[arg(
        long,
        env = "BLOCKWINDOW_REQUEST_TIMEOUT_SECS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..),
    )]
    pub request_timeout_secs: u64,

    /// Port for the block API.
    #[arg(long, env = "BLOCKWINDOW_API_PORT", default_value_t = 8000)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "BLOCKWINDOW_METRICS_PORT", default_value_t = 9100)]
    pub metrics_port: u16,

    /// Log output format.
    #[arg(long, env = "BLOCKWINDOW_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Refetch the whole window on every tip change instead of splicing new
    /// blocks onto the cached ones.
    #[arg(long, env = "BLOCKWINDOW_FULL_REBUILD")]
    pub full_rebuild: bool,
}

impl RunArgs {
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            cache_size: self.cache_size,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            incremental: !self.full_rebuild,
        }
    }

    pub fn rpc_config(&self) -> RpcClientConfig {
        RpcClientConfig {
            url: self.rpc_url.clone(),
            user: self.rpc_user.clone(),
            password: self.rpc_password.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Base URL of the running service's API.
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    pub api_url: String,
}

fn parse_cache_size(s: &str) -> Result<usize, String> {
    let size: usize = s.parse().map_err(|e| format!("{}", e))?;
    if size == 0 || size > MAX_CACHE_SIZE {
        return Err(format!("must be between 1 and {}", MAX_CACHE_SIZE));
    }
    Ok(size)
}
