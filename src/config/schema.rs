//! Configuration schema definitions.
//!
//! Every option the transport recognises is enumerated here. Unknown keys are
//! rejected at parse time so a typo never silently falls back to a default.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Root configuration for a [`Transport`](crate::transport::Transport).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    /// Seed hosts (`"host"`, `"host:port"` or a full URL).
    pub hosts: Vec<String>,

    /// Shuffle the seed hosts before building the first pool.
    pub randomize_hosts: bool,

    /// Number of retries after the first attempt.
    pub max_retries: u32,

    /// Retry (on another node) when an attempt times out.
    pub retry_on_timeout: bool,

    /// HTTP statuses that mark the node dead and trigger a retry.
    pub retry_on_status: Vec<u16>,

    /// Per-attempt request timeout in milliseconds.
    pub request_timeout_ms: u64,

    /// How to send a body attached to a GET request.
    pub send_get_body_as: GetBodyMode,

    /// Connection pool settings.
    pub pool: PoolConfig,

    /// Sniffing settings.
    pub sniff: SniffConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["http://localhost:9200".to_string()],
            randomize_hosts: true,
            max_retries: 3,
            retry_on_timeout: false,
            retry_on_status: vec![503, 504],
            request_timeout_ms: 10_000,
            send_get_body_as: GetBodyMode::Get,
            pool: PoolConfig::default(),
            sniff: SniffConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl TransportConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_statuses(&self) -> HashSet<u16> {
        self.retry_on_status.iter().copied().collect()
    }
}

/// Strategy for GET requests that carry a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GetBodyMode {
    /// Send the body with the GET request.
    #[default]
    Get,
    /// Switch the method to POST.
    Post,
    /// Move the body into the `source` query parameter.
    Source,
}

/// Dead-connection backoff settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Base resurrect timeout after the first failure, in seconds.
    pub dead_timeout_secs: u64,

    /// Upper bound for the resurrect timeout, in seconds.
    pub max_dead_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            dead_timeout_secs: 60,
            max_dead_timeout_secs: 1920,
        }
    }
}

impl PoolConfig {
    pub fn dead_timeout(&self) -> Duration {
        Duration::from_secs(self.dead_timeout_secs)
    }

    pub fn max_dead_timeout(&self) -> Duration {
        Duration::from_secs(self.max_dead_timeout_secs)
    }
}

/// Cluster topology discovery settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SniffConfig {
    /// Sniff once while the transport is being constructed.
    pub on_start: bool,

    /// Sniff after a connection-level failure.
    pub on_connection_fail: bool,

    /// Background sniffing interval in seconds (disabled when unset).
    pub interval_secs: Option<u64>,

    /// Timeout of the cluster-info request in milliseconds.
    pub timeout_ms: u64,
}

impl Default for SniffConfig {
    fn default() -> Self {
        Self {
            on_start: false,
            on_connection_fail: false,
            interval_secs: None,
            timeout_ms: 100,
        }
    }
}

impl SniffConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval_secs.map(Duration::from_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
