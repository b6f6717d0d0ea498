//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, unknown keys rejected)
//!     → validation.rs (semantic checks)
//!     → hosts.rs (seed host strings → HostConfig)
//!     → TransportConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once a transport is built
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod hosts;
pub mod loader;
pub mod schema;
pub mod validation;

pub use hosts::{parse_host, HostConfig, Scheme};
pub use loader::{load_config, ConfigError};
pub use schema::{GetBodyMode, ObservabilityConfig, PoolConfig, SniffConfig, TransportConfig};
