//! Cluster topology discovery ("sniffing").
//!
//! # Data Flow
//! ```text
//! trigger (start / interval / connection failure / explicit call)
//!     → discovery.rs takes the pool writer lock
//!     → GET /_nodes/_all/http on one node from the current pool
//!     → nodes.rs parses publish addresses, drops master-only nodes
//!     → fresh Connections → new ConnectionPool → PoolSlot::replace
//! ```
//!
//! # Design Decisions
//! - A failed sniff never changes membership
//! - Sniff on connection failure is skipped while another sniff runs

pub mod discovery;
pub mod nodes;

pub use discovery::Sniffer;
pub use nodes::{parse_nodes, NodeDescriptor, SniffError, SniffResult, SNIFF_PATH};
