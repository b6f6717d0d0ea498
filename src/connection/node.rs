//! A single node endpoint and its health record.
//!
//! # Responsibilities
//! - Identify one node (scheme, host, port) for logging and bookkeeping
//! - Track health: alive/dead, dead-since, consecutive failures
//! - Dispatch one request through the node's [`HttpSend`] handle
//!
//! Health is only mutated by the owning
//! [`ConnectionPool`](crate::pool::ConnectionPool) while it holds its lock.

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::HostConfig;
use crate::connection::http::HttpSend;
use crate::connection::request::{RawResponse, Request, SendError};

/// Global counter for connection ids.
/// Only uniqueness is needed, so relaxed ordering suffices.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of one [`Connection`] object.
///
/// Two connections to the same address built by different sniffs have
/// different ids, so bookkeeping from a replaced topology never leaks into
/// the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Alive,
    Dead,
}

/// Snapshot of a connection's health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    pub state: HealthState,
    pub consecutive_failures: u32,
    pub dead_since: Option<Instant>,
    pub resurrect_at: Option<Instant>,
}

impl Default for Health {
    fn default() -> Self {
        Self {
            state: HealthState::Alive,
            consecutive_failures: 0,
            dead_since: None,
            resurrect_at: None,
        }
    }
}

/// One node of the cluster.
pub struct Connection {
    id: ConnectionId,
    host: HostConfig,
    sender: Arc<dyn HttpSend>,
    health: Mutex<Health>,
}

impl Connection {
    pub fn new(host: HostConfig, sender: Arc<dyn HttpSend>) -> Self {
        Self {
            id: ConnectionId::new(),
            host,
            sender,
            health: Mutex::new(Health::default()),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn host(&self) -> &HostConfig {
        &self.host
    }

    /// `scheme://host:port`, the identity used in logs and metrics.
    pub fn address(&self) -> String {
        let host = if self.host.host.contains(':') {
            format!("[{}]", self.host.host)
        } else {
            self.host.host.clone()
        };
        format!("{}://{}:{}", self.host.scheme, host, self.host.port)
    }

    pub fn health(&self) -> Health {
        *self.health.lock()
    }

    pub fn is_alive(&self) -> bool {
        self.health.lock().state == HealthState::Alive
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.health.lock().consecutive_failures
    }

    /// Perform one request against this node.
    pub fn send<'a>(
        &'a self,
        request: &'a Request,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<RawResponse, SendError>> {
        self.sender.send(request, timeout)
    }

    /// Record a failure; returns the failure count before this one.
    pub(crate) fn record_failure(&self, now: Instant, resurrect_at: Instant) -> u32 {
        let mut health = self.health.lock();
        let prior = health.consecutive_failures;
        health.state = HealthState::Dead;
        health.consecutive_failures = prior.saturating_add(1);
        health.dead_since = Some(now);
        health.resurrect_at = Some(resurrect_at);
        prior
    }

    /// Back in the live set for a trial; failures are kept until a success.
    pub(crate) fn record_resurrected(&self) {
        let mut health = self.health.lock();
        health.state = HealthState::Alive;
        health.dead_since = None;
        health.resurrect_at = None;
    }

    pub(crate) fn record_success(&self) {
        *self.health.lock() = Health::default();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("address", &self.address())
            .field("health", &self.health())
            .finish()
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}
