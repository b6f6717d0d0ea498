//! The retrying transport.
//!
//! # Responsibilities
//! - Own the pool slot and the sniffer
//! - Run each request through the attempt loop with failover
//! - Apply membership changes (sniff, add/set connections)

use rand::seq::SliceRandom;
use reqwest::Method;
use std::sync::Arc;
use std::time::Instant;
use tokio::time;

use crate::config::hosts::normalize_hosts;
use crate::config::validation::validate_config;
use crate::config::{parse_host, GetBodyMode, HostConfig, TransportConfig};
use crate::connection::{
    build_connections, Connection, ConnectionFactory, HttpConnectionFactory, Request, SendError,
};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::pool::{ConnectionPool, PoolSlot};
use crate::resilience::{RetryPolicy, Verdict};
use crate::sniffer::{SniffError, Sniffer};
use crate::transport::types::{AttemptError, Error, Response};

/// Client-side transport to a search cluster.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct Transport {
    slot: Arc<PoolSlot>,
    sniffer: Arc<Sniffer>,
    factory: Arc<dyn ConnectionFactory>,
    policy: RetryPolicy,
    config: TransportConfig,
    shutdown: Shutdown,
}

impl Transport {
    /// Build a transport that talks HTTP through reqwest.
    pub async fn connect(config: TransportConfig) -> Result<Self, Error> {
        let factory = Arc::new(HttpConnectionFactory::new()?);
        Self::with_factory(config, factory).await
    }

    /// Build a transport using `factory` for every node handle.
    ///
    /// Validates `config`, builds the seed pool, runs the start-up sniff if
    /// enabled and spawns the periodic sniffer. Must be called inside a
    /// tokio runtime.
    pub async fn with_factory(
        config: TransportConfig,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Result<Self, Error> {
        if let Err(errors) = validate_config(&config) {
            let message = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::Configuration(message));
        }

        let mut hosts = normalize_hosts(&config.hosts).map_err(|errors| {
            Error::Configuration(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;
        let template = hosts
            .first()
            .cloned()
            .ok_or_else(|| Error::Configuration("no hosts configured".to_string()))?;
        if config.randomize_hosts {
            hosts.shuffle(&mut rand::thread_rng());
        }

        let connections = build_connections(factory.as_ref(), &hosts)?;
        let slot = Arc::new(PoolSlot::new(ConnectionPool::new(connections, &config.pool)?));
        let sniffer = Arc::new(Sniffer::new(
            slot.clone(),
            factory.clone(),
            template,
            config.pool.clone(),
            config.sniff.clone(),
        ));

        tracing::info!(
            hosts = hosts.len(),
            max_retries = config.max_retries,
            retry_on_timeout = config.retry_on_timeout,
            "Transport initialized"
        );

        if config.sniff.on_start {
            match sniffer.sniff().await {
                Ok(count) => tracing::info!(nodes = count, "Initial sniff complete"),
                Err(e) => tracing::warn!(error = %e, "Initial sniff failed, using seed hosts"),
            }
        }

        let shutdown = Shutdown::new();
        if let Some(interval) = config.sniff.interval() {
            let runner = sniffer.clone();
            shutdown.spawn(move |rx| runner.run(interval, rx));
        }

        Ok(Self {
            slot,
            sniffer,
            factory,
            policy: RetryPolicy::from_config(&config),
            config,
            shutdown,
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Snapshot of the current pool.
    pub fn pool(&self) -> Arc<ConnectionPool> {
        self.slot.load()
    }

    /// Select a connection from the current pool.
    pub fn get_connection(&self) -> Result<Arc<Connection>, Error> {
        self.slot.load().get_connection()
    }

    /// Current members, in membership order.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.slot.load().connections()
    }

    /// Refresh membership from the cluster now.
    pub async fn sniff(&self) -> Result<usize, SniffError> {
        self.sniffer.sniff().await
    }

    /// When the last successful sniff finished.
    pub fn last_sniff(&self) -> Option<Instant> {
        self.sniffer.last_sniff()
    }

    /// Execute a request, failing over between nodes.
    ///
    /// Makes at most `max_retries + 1` attempts. Each attempt selects a node,
    /// sends with the request timeout, and classifies the outcome:
    /// - 2xx, ignored statuses and HEAD 404 return the response
    /// - connection failures, retryable statuses and (if enabled) timeouts
    ///   mark the node dead and move on to the next attempt
    /// - anything else is returned as an error straight away
    pub async fn perform_request(&self, request: Request) -> Result<Response, Error> {
        let request = self.prepare(request);
        let timeout = request.timeout.unwrap_or_else(|| self.config.request_timeout());
        let budget = self.policy.attempt_budget();
        let mut history: Vec<AttemptError> = Vec::new();

        for attempt in 1..=budget {
            let pool = self.slot.load();
            let conn = pool.get_connection()?;
            let node = conn.to_string();
            let started = Instant::now();

            tracing::debug!(
                node = %node,
                method = %request.method,
                path = %request.path,
                attempt,
                budget,
                "Sending request"
            );

            let outcome = match time::timeout(timeout, conn.send(&request, timeout)).await {
                Ok(result) => result,
                Err(_) => Err(SendError::Timeout(timeout)),
            };

            let failure = match outcome {
                Ok(raw) => {
                    let verdict = self.policy.classify_status(
                        &request.method,
                        raw.status,
                        &request.ignore,
                    );
                    if verdict == Verdict::Success {
                        pool.mark_live(&conn);
                        metrics::record_attempt("success", started.elapsed());
                        tracing::debug!(
                            node = %node,
                            status = raw.status,
                            attempt,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Request completed"
                        );
                        return Ok(Response {
                            status: raw.status,
                            headers: raw.headers,
                            body: raw.body,
                            node,
                        });
                    }
                    let body = String::from_utf8_lossy(&raw.body).into_owned();
                    if verdict == Verdict::Fail {
                        metrics::record_attempt("status", started.elapsed());
                        tracing::debug!(
                            node = %node,
                            status = raw.status,
                            attempt,
                            "Request failed, not retrying"
                        );
                        return Err(Error::Transport {
                            node,
                            status: raw.status,
                            body,
                        });
                    }
                    AttemptError::Status {
                        node,
                        status: raw.status,
                        body,
                    }
                }
                Err(SendError::Timeout(after)) => {
                    if self.policy.classify_timeout() == Verdict::Fail {
                        metrics::record_attempt("timeout", started.elapsed());
                        tracing::debug!(node = %node, attempt, "Request timed out, not retrying");
                        return Err(Error::Timeout { node, after });
                    }
                    AttemptError::Timeout { node, after }
                }
                // Connection failures are always retried.
                Err(SendError::Connection(reason)) => AttemptError::Connection { node, reason },
            };
            metrics::record_attempt(failure.kind(), started.elapsed());

            tracing::warn!(
                error = %failure,
                attempt,
                budget,
                "Attempt failed, marking connection dead"
            );
            pool.mark_dead(&conn);
            history.push(failure);
            self.sniffer.maybe_sniff_on_failure().await;
        }

        let last = history
            .last()
            .cloned()
            .ok_or_else(|| Error::Configuration("attempt budget is zero".to_string()))?;
        tracing::error!(attempts = budget, error = %last, "Request failed on every attempt");
        Err(Error::Connection {
            attempts: budget,
            last,
            history,
        })
    }

    /// Rewrite a GET with a body according to `send_get_body_as`.
    fn prepare(&self, mut request: Request) -> Request {
        if request.method != Method::GET || request.body.is_none() {
            return request;
        }
        match self.config.send_get_body_as {
            GetBodyMode::Get => request,
            GetBodyMode::Post => {
                request.method = Method::POST;
                request
            }
            GetBodyMode::Source => match request.body.take() {
                Some(body) => request
                    .param("source", String::from_utf8_lossy(&body).into_owned())
                    .param("source_content_type", "application/json"),
                None => request,
            },
        }
    }

    /// Add a node to the current membership.
    ///
    /// Returns `false` when the address is already a member. Like a sniff,
    /// this builds fresh connections for every member.
    pub async fn add_connection(&self, host: &str) -> Result<bool, Error> {
        let host = parse_host(host).map_err(|e| Error::Configuration(e.to_string()))?;
        let guard = self.slot.lock_writer().await;
        let mut hosts: Vec<HostConfig> = self
            .slot
            .load()
            .connections()
            .iter()
            .map(|c| c.host().clone())
            .collect();
        if hosts.contains(&host) {
            return Ok(false);
        }
        tracing::info!(node = %host.base_url(), "Adding connection");
        hosts.push(host);

        let pool = ConnectionPool::new(build_connections(self.factory.as_ref(), &hosts)?, &self.config.pool)?;
        self.slot.replace(&guard, pool);
        Ok(true)
    }

    /// Replace membership with exactly `hosts`.
    pub async fn set_connections(&self, hosts: &[String]) -> Result<(), Error> {
        let hosts = normalize_hosts(hosts).map_err(|errors| {
            Error::Configuration(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;
        let connections = build_connections(self.factory.as_ref(), &hosts)?;
        let pool = ConnectionPool::new(connections, &self.config.pool)?;

        let guard = self.slot.lock_writer().await;
        let old = self.slot.replace(&guard, pool);
        tracing::info!(previous = old.len(), nodes = hosts.len(), "Connections replaced");
        Ok(())
    }

    /// Stop background sniffing and wait for the sniffer to exit.
    ///
    /// A sniff already in flight is allowed to finish.
    pub async fn close(&self) {
        self.shutdown.close().await;
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("pool", &self.slot.load())
            .field("policy", &self.policy)
            .field("sniffer", &self.sniffer)
            .finish()
    }
}
