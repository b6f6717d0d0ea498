//! Request execution with failover.
//!
//! # Data Flow
//! ```text
//! perform_request(Request)
//!     → send_get_body_as rewrite
//!     → for attempt in 1..=max_retries+1:
//!         pool.get_connection()
//!         → Connection::send under request_timeout
//!         → RetryPolicy verdict
//!             Success → mark_live → Response
//!             Retry   → mark_dead → maybe sniff → next attempt
//!             Fail    → Error::Timeout / Error::Transport
//!     → budget exhausted → Error::Connection { history }
//! ```

pub mod client;
pub mod types;

pub use client::Transport;
pub use types::{AttemptError, Error, Response};
