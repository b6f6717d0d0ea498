//! Node connections.
//!
//! # Data Flow
//! ```text
//! HostConfig
//!     → http.rs (ConnectionFactory builds an HttpSend handle)
//!     → node.rs (Connection: identity + health + handle)
//!     → owned by pool::ConnectionPool, lent out per attempt
//!     → request.rs (Request in, RawResponse or SendError out)
//! ```
//!
//! # Design Decisions
//! - The I/O primitive is a trait so the pool and retry logic never depend
//!   on a particular HTTP stack
//! - Every sniff builds new Connection objects; health never carries over

pub mod http;
pub mod node;
pub mod request;

#[cfg(test)]
pub(crate) mod testing;

pub use http::{build_connections, ConnectionFactory, HttpConnectionFactory, HttpNode, HttpSend};
pub use node::{Connection, ConnectionId, Health, HealthState};
pub use request::{RawResponse, Request, SendError};
