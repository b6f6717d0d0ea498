//! Scripted in-memory nodes for unit tests.

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::HostConfig;
use crate::connection::http::{ConnectionFactory, HttpSend};
use crate::connection::request::{RawResponse, Request, SendError};
use crate::transport::Error;

/// What a scripted node does for one request.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, String),
    Timeout,
    Refused,
    /// Never completes; only the caller's timeout ends the attempt.
    Hang,
}

/// Replays queued replies, then repeats the fallback forever.
#[derive(Debug)]
pub struct ScriptedSender {
    queue: Mutex<VecDeque<Reply>>,
    fallback: Mutex<Reply>,
    calls: AtomicUsize,
    requests: Mutex<Vec<(Request, Duration)>>,
}

impl ScriptedSender {
    pub fn always(reply: Reply) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(reply),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn ok() -> Self {
        Self::always(Reply::Status(200, "{}".to_string()))
    }

    pub fn then(self, reply: Reply) -> Self {
        self.queue.lock().push_back(reply);
        self
    }

    pub fn set_fallback(&self, reply: Reply) {
        *self.fallback.lock() = reply;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(Request, Duration)> {
        self.requests.lock().clone()
    }
}

impl HttpSend for ScriptedSender {
    fn send<'a>(
        &'a self,
        request: &'a Request,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<RawResponse, SendError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push((request.clone(), timeout));
        let reply = self
            .queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().clone());

        Box::pin(async move {
            match reply {
                Reply::Status(status, body) => Ok(RawResponse::new(status, body)),
                Reply::Timeout => Err(SendError::Timeout(timeout)),
                Reply::Refused => Err(SendError::Connection("connection refused".to_string())),
                Reply::Hang => futures_util::future::pending().await,
            }
        })
    }
}

/// Hands out one shared [`ScriptedSender`] per `host:port`.
///
/// Unknown addresses get a sender that answers 200.
#[derive(Debug, Default)]
pub struct ScriptedFactory {
    senders: Mutex<HashMap<String, Arc<ScriptedSender>>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, address: &str, sender: ScriptedSender) -> Self {
        self.senders.lock().insert(address.to_string(), Arc::new(sender));
        self
    }

    pub fn sender(&self, address: &str) -> Arc<ScriptedSender> {
        self.senders
            .lock()
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(ScriptedSender::ok()))
            .clone()
    }

    pub fn total_calls(&self) -> usize {
        self.senders.lock().values().map(|s| s.calls()).sum()
    }
}

impl ConnectionFactory for ScriptedFactory {
    fn create(&self, host: &HostConfig) -> Result<Arc<dyn HttpSend>, Error> {
        let sender: Arc<dyn HttpSend> = self.sender(&format!("{}:{}", host.host, host.port));
        Ok(sender)
    }
}

/// Cluster-info body advertising the given `host:port` addresses.
pub fn nodes_body(nodes: &[(&str, &[&str])]) -> String {
    let entries: serde_json::Map<String, serde_json::Value> = nodes
        .iter()
        .enumerate()
        .map(|(i, (address, roles))| {
            (
                format!("node-{}", i),
                serde_json::json!({
                    "name": format!("node-{}", i),
                    "roles": roles,
                    "http": { "publish_address": address },
                }),
            )
        })
        .collect();
    serde_json::json!({ "cluster_name": "test", "nodes": entries }).to_string()
}
