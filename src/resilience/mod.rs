//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Attempt outcome:
//!     → retries.rs (success / retry on another node / fail)
//!     → On retry: pool marks the node dead for backoff.rs's dead_timeout
//! ```
//!
//! # Design Decisions
//! - Backoff is per node, not per request: a retry goes straight to another
//!   node, the failed node sits out an exponentially growing timeout
//! - Timeouts are distinct from connection failures

pub mod backoff;
pub mod retries;

pub use backoff::{dead_timeout, deadline_after};
pub use retries::{RetryPolicy, Verdict};
