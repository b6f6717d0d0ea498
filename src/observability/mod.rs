//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! pool / transport / sniffer
//!     → tracing events (logging.rs installs the subscriber)
//!     → metrics.rs (counters, gauges, histograms via the `metrics` facade)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
