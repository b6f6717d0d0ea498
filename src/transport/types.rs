//! Transport error taxonomy and response type.

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

/// Why a single attempt against one node did not produce a usable response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error("{node} timed out after {after:?}")]
    Timeout { node: String, after: Duration },

    #[error("{node} connection failed: {reason}")]
    Connection { node: String, reason: String },

    #[error("{node} returned HTTP {status}")]
    Status {
        node: String,
        status: u16,
        body: String,
    },
}

impl AttemptError {
    pub fn node(&self) -> &str {
        match self {
            Self::Timeout { node, .. } | Self::Connection { node, .. } | Self::Status { node, .. } => {
                node
            }
        }
    }

    /// Label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Connection { .. } => "connection",
            Self::Status { .. } => "status",
        }
    }
}

/// Errors surfaced by the transport.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid setup, such as a pool with no connections. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Every attempt failed; `history` holds each attempt's error in order.
    #[error("request failed after {attempts} attempt(s): {last}")]
    Connection {
        attempts: u32,
        #[source]
        last: AttemptError,
        history: Vec<AttemptError>,
    },

    /// A request timed out and timeouts are not retried.
    #[error("request to {node} timed out after {after:?}")]
    Timeout { node: String, after: Duration },

    /// The node answered with a non-retryable error status.
    #[error("HTTP {status} from {node}: {body}")]
    Transport {
        node: String,
        status: u16,
        body: String,
    },
}

impl Error {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => Some(*status),
            Self::Connection {
                last: AttemptError::Status { status, .. },
                ..
            } => Some(*status),
            _ => None,
        }
    }

    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Configuration(_) => 0,
            Self::Connection { attempts, .. } => *attempts,
            Self::Timeout { .. } | Self::Transport { .. } => 1,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// A successful (or explicitly ignored) response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Address of the node that served the request.
    pub node: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}
