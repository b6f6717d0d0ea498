//! Topology discovery.
//!
//! # Responsibilities
//! - Ask one node for the cluster's node list
//! - Build fresh connections for the data nodes and swap in a new pool
//! - Run periodically in the background until shutdown

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time;

use crate::config::{HostConfig, PoolConfig, SniffConfig};
use crate::connection::{build_connections, ConnectionFactory, Request, SendError};
use crate::observability::metrics;
use crate::pool::{ConnectionPool, PoolSlot, WriterGuard};
use crate::resilience::backoff::FAR_FUTURE;
use crate::sniffer::nodes::{parse_nodes, SniffError, SNIFF_PATH};
use crate::transport::AttemptError;

pub struct Sniffer {
    slot: Arc<PoolSlot>,
    factory: Arc<dyn ConnectionFactory>,
    /// Scheme, prefix and credentials applied to discovered nodes.
    template: HostConfig,
    pool_config: PoolConfig,
    config: SniffConfig,
    last_sniff: Mutex<Option<Instant>>,
}

impl Sniffer {
    pub fn new(
        slot: Arc<PoolSlot>,
        factory: Arc<dyn ConnectionFactory>,
        template: HostConfig,
        pool_config: PoolConfig,
        config: SniffConfig,
    ) -> Self {
        Self {
            slot,
            factory,
            template,
            pool_config,
            config,
            last_sniff: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SniffConfig {
        &self.config
    }

    /// When the last successful sniff finished.
    pub fn last_sniff(&self) -> Option<Instant> {
        *self.last_sniff.lock()
    }

    /// Refresh pool membership from the cluster.
    ///
    /// Waits for any other membership change to finish first. On failure the
    /// current pool is left untouched. Returns the new member count.
    pub async fn sniff(&self) -> Result<usize, SniffError> {
        let guard = self.slot.lock_writer().await;
        self.sniff_locked(&guard).await
    }

    /// Sniff after a connection failure, if enabled and no sniff is running.
    ///
    /// Never fails: errors are logged and the previous topology is kept.
    pub async fn maybe_sniff_on_failure(&self) {
        if !self.config.on_connection_fail {
            return;
        }
        let Some(guard) = self.slot.try_lock_writer() else {
            tracing::debug!("Sniff already in progress, skipping sniff on connection failure");
            return;
        };
        if let Err(e) = self.sniff_locked(&guard).await {
            tracing::warn!(error = %e, "Sniff on connection failure failed, keeping current nodes");
        }
    }

    async fn sniff_locked(&self, guard: &WriterGuard<'_>) -> Result<usize, SniffError> {
        let result = self.discover(guard).await;
        match &result {
            Ok(count) => {
                *self.last_sniff.lock() = Some(Instant::now());
                metrics::record_sniff("success", *count);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Sniff failed");
                metrics::record_sniff("failure", 0);
            }
        }
        result
    }

    async fn discover(&self, guard: &WriterGuard<'_>) -> Result<usize, SniffError> {
        let pool = self.slot.load();
        let conn = pool
            .get_connection()
            .map_err(|e| SniffError::NoConnection(e.to_string()))?;
        let node = conn.to_string();
        let timeout = self.config.timeout();
        let request = Request::get(SNIFF_PATH);

        tracing::debug!(node = %node, timeout = ?timeout, "Sniffing cluster nodes");

        let outcome = match time::timeout(timeout, conn.send(&request, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(SendError::Timeout(timeout)),
        };
        let response = match outcome {
            Ok(response) => response,
            Err(SendError::Timeout(after)) => {
                return Err(SniffError::Request(AttemptError::Timeout { node, after }))
            }
            Err(SendError::Connection(reason)) => {
                return Err(SniffError::Request(AttemptError::Connection { node, reason }))
            }
        };
        if !(200..300).contains(&response.status) {
            return Err(SniffError::Request(AttemptError::Status {
                node,
                status: response.status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            }));
        }

        let result = parse_nodes(&response.body).map_err(|source| SniffError::Parse {
            node: node.clone(),
            source,
        })?;
        let hosts: Vec<HostConfig> = result
            .data_nodes()
            .map(|n| self.template.with_address(n.host.clone(), n.port))
            .collect();
        if hosts.is_empty() {
            return Err(SniffError::NoNodes { node });
        }

        let connections = build_connections(self.factory.as_ref(), &hosts)
            .map_err(|e| SniffError::Build(e.to_string()))?;
        let new_pool = ConnectionPool::new(connections, &self.pool_config)
            .map_err(|e| SniffError::Build(e.to_string()))?;
        let count = new_pool.len();
        let old = self.slot.replace(guard, new_pool);

        tracing::info!(
            via = %node,
            previous = old.len(),
            nodes = count,
            "Connection pool refreshed from sniff"
        );
        Ok(count)
    }

    /// Sniff every `interval` until shutdown; failures are logged.
    ///
    /// The interval is clamped to [1ms, `FAR_FUTURE`].
    pub async fn run(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let interval = interval.clamp(Duration::from_millis(1), FAR_FUTURE);
        tracing::info!(interval = ?interval, "Periodic sniffer starting");

        let now = time::Instant::now();
        let first = now.checked_add(interval).unwrap_or(now);
        let mut ticker = time::interval_at(first, interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sniff().await {
                        tracing::warn!(error = %e, "Periodic sniff failed, keeping current nodes");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Sniffer received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

impl std::fmt::Debug for Sniffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sniffer")
            .field("template", &self.template.base_url())
            .field("config", &self.config)
            .field("last_sniff", &self.last_sniff())
            .finish()
    }
}
