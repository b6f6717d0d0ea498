//! Connection pool subsystem.
//!
//! # Data Flow
//! ```text
//! Transport attempt
//!     → slot.rs (snapshot of current membership)
//!     → connection_pool.rs:
//!         - resurrect dead nodes whose backoff elapsed
//!         - force-resurrect the earliest one if nothing is live
//!         - pick least-used live node
//!     → Arc<Connection> lent to the attempt, lock released
//!     → attempt outcome → mark_dead / mark_live
//!
//! Sniff / add_connection
//!     → build a complete new ConnectionPool
//!     → slot.rs swaps it in atomically
//! ```
//!
//! # Design Decisions
//! - Membership is immutable per pool; changes swap the whole pool
//! - Health bookkeeping is per pool; a replaced pool's state is discarded

pub mod connection_pool;
pub mod slot;

pub use connection_pool::ConnectionPool;
pub use slot::{PoolSlot, WriterGuard};
