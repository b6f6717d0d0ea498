//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Transport::with_factory → Shutdown::spawn(periodic sniffer)
//! Transport::close → Shutdown::close → signal, then join the sniffer
//! Drop             → Shutdown::trigger → sniffer loop exits on its own
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
