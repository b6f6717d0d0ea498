//! Connection pooling, sniffing and retrying transport for a search cluster
//! client.

pub mod config;
pub mod connection;
pub mod pool;
pub mod sniffer;
pub mod transport;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::TransportConfig;
pub use connection::{Connection, Request};
pub use lifecycle::Shutdown;
pub use pool::ConnectionPool;
pub use sniffer::{SniffError, Sniffer};
pub use transport::{Error, Response, Transport};
