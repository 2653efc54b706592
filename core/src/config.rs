//! # Cache Configuration & Constants
//!
//! Every default the cache relies on lives here. The node binary exposes each
//! of them as a CLI flag; library users build [`SyncConfig`] and
//! [`RpcClientConfig`] directly.

use std::time::Duration;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Window Parameters
// ---------------------------------------------------------------------------

/// Default number of blocks kept in the window. Sized for a front end that
/// renders the last couple of hundred blocks.
pub const DEFAULT_CACHE_SIZE: usize = 200;

/// Upper bound accepted for the window size. A rebuild costs one upstream
/// round trip per block, so anything past this is a misconfiguration.
pub const MAX_CACHE_SIZE: usize = 10_000;

// ---------------------------------------------------------------------------
// Timing Constants
// ---------------------------------------------------------------------------

/// How often the synchronizer asks the upstream node for its tip.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Per-request timeout applied to every upstream call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Upstream Defaults
// ---------------------------------------------------------------------------

/// JSON-RPC endpoint of a node running on the same host.
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8766/";

/// JSON-RPC protocol version sent in every request envelope. Bitcoin-derived
/// nodes still speak 1.0.
pub const JSONRPC_VERSION: &str = "1.0";

/// Capacity of the synchronizer event channel. Subscribers that fall further
/// behind than this simply miss events; nothing in the cache depends on them.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Config Structs
// ---------------------------------------------------------------------------

/// Tuning knobs for the cache synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Maximum number of blocks in a published window. Must be at least 1.
    pub cache_size: usize,

    /// Delay between two tip polls.
    pub poll_interval: Duration,

    /// When the new tip descends from the cached tip, fetch only the new
    /// blocks and splice them onto the existing window. When `false`, every
    /// tip change triggers a full rebuild.
    pub incremental: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            incremental: true,
        }
    }
}

/// A [`SyncConfig`] the synchronizer cannot run with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("cache size must be between 1 and {max}, got {got}")]
    CacheSize { got: usize, max: usize },

    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
}

impl SyncConfig {
    /// Checks the window bound and the poll interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_size == 0 || self.cache_size > MAX_CACHE_SIZE {
            return Err(ConfigError::CacheSize {
                got: self.cache_size,
                max: MAX_CACHE_SIZE,
            });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }
}

/// Connection settings for [`crate::client::RpcNodeClient`].
#[derive(Clone)]
pub struct RpcClientConfig {
    /// Full URL of the JSON-RPC endpoint.
    pub url: String,
    /// HTTP basic auth user.
    pub user: String,
    /// HTTP basic auth password.
    pub password: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RPC_URL.to_string(),
            user: String::new(),
            password: String::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

// The password never reaches logs.
impl std::fmt::Debug for RpcClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClientConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_defaults_match_the_documented_surface() {
        let config = SyncConfig::default();
        assert_eq!(config.cache_size, 200);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert!(config.incremental);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn zero_cache_size_is_rejected() {
        let config = SyncConfig {
            cache_size: 0,
            ..SyncConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::CacheSize {
                got: 0,
                max: MAX_CACHE_SIZE,
            })
        );
    }

    #[test]
    fn cache_size_above_the_cap_is_rejected() {
        let at_cap = SyncConfig {
            cache_size: MAX_CACHE_SIZE,
            ..SyncConfig::default()
        };
        assert_eq!(at_cap.validate(), Ok(()));

        let over = SyncConfig {
            cache_size: MAX_CACHE_SIZE + 1,
            ..SyncConfig::default()
        };
        assert!(matches!(
            over.validate(),
            Err(ConfigError::CacheSize { got, .. }) if got == MAX_CACHE_SIZE + 1
        ));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let config = SyncConfig {
            poll_interval: Duration::ZERO,
            ..SyncConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroPollInterval));
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "poll interval must be greater than zero"
        );
    }

    #[test]
    fn rpc_config_debug_hides_password() {
        let config = RpcClientConfig {
            password: "superstrongpassword".into(),
            ..RpcClientConfig::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("superstrongpassword"));
        assert!(rendered.contains("<redacted>"));
    }
}
