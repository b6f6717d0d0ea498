//! Cluster-info response parsing and sniff error types.

use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::transport::AttemptError;

/// Path queried for the cluster topology.
pub const SNIFF_PATH: &str = "/_nodes/_all/http";

/// One node advertised by the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub id: String,
    pub host: String,
    pub port: u16,
    /// `None` when the node did not report roles (older clusters).
    pub roles: Option<Vec<String>>,
}

impl NodeDescriptor {
    /// Dedicated master nodes do not serve data requests.
    pub fn is_master_only(&self) -> bool {
        matches!(&self.roles, Some(roles) if roles.len() == 1 && roles[0] == "master")
    }
}

/// Parsed topology, ordered by node id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SniffResult {
    pub nodes: Vec<NodeDescriptor>,
}

impl SniffResult {
    /// Nodes eligible to serve requests.
    pub fn data_nodes(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.nodes.iter().filter(|n| !n.is_master_only())
    }
}

/// Errors that can occur while sniffing.
#[derive(Debug, Error)]
pub enum SniffError {
    /// No connection could be selected to ask.
    #[error("no connection available for sniffing: {0}")]
    NoConnection(String),

    /// The cluster-info request failed.
    #[error("sniff request failed: {0}")]
    Request(#[source] AttemptError),

    /// The cluster-info response could not be decoded.
    #[error("invalid cluster-info response from {node}: {source}")]
    Parse {
        node: String,
        #[source]
        source: serde_json::Error,
    },

    /// The response listed no node that can serve requests.
    #[error("sniff of {node} found no eligible nodes")]
    NoNodes { node: String },

    /// Connections for the discovered nodes could not be built.
    #[error("failed to build connections for sniffed nodes: {0}")]
    Build(String),
}

#[derive(Debug, Deserialize)]
struct NodesResponse {
    #[serde(default)]
    nodes: BTreeMap<String, NodeInfo>,
}

#[derive(Debug, Deserialize)]
struct NodeInfo {
    roles: Option<Vec<String>>,
    http: Option<HttpInfo>,
}

#[derive(Debug, Deserialize)]
struct HttpInfo {
    publish_address: Option<String>,
}

/// Parse a `/_nodes/_all/http` body.
///
/// Nodes without an HTTP publish address (HTTP disabled) are skipped.
pub fn parse_nodes(body: &[u8]) -> Result<SniffResult, serde_json::Error> {
    let response: NodesResponse = serde_json::from_slice(body)?;
    let mut nodes = Vec::with_capacity(response.nodes.len());
    for (id, info) in response.nodes {
        let Some(address) = info.http.and_then(|h| h.publish_address) else {
            tracing::debug!(node_id = %id, "Skipping node without HTTP publish address");
            continue;
        };
        match parse_publish_address(&address) {
            Some((host, port)) => nodes.push(NodeDescriptor {
                id,
                host,
                port,
                roles: info.roles,
            }),
            None => {
                tracing::warn!(node_id = %id, address = %address, "Skipping node with unparsable publish address");
            }
        }
    }
    Ok(SniffResult { nodes })
}

/// Split a publish address into host and port.
///
/// Accepts `ip:port`, `hostname/ip:port` (the hostname wins) and bracketed
/// IPv6 literals.
pub fn parse_publish_address(address: &str) -> Option<(String, u16)> {
    let (name, socket) = match address.split_once('/') {
        Some((name, rest)) => (name, rest),
        None => ("", address),
    };
    let (ip, port) = socket.rsplit_once(':')?;
    let port = port.parse().ok()?;
    let ip = ip.trim_start_matches('[').trim_end_matches(']');
    let host = if name.is_empty() { ip } else { name };
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), port))
}
