//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and host strings.
//! Every problem is reported, not just the first one.

use std::fmt;
use crate::config::hosts::{normalize_hosts, HostParseError};
use crate::config::schema::TransportConfig;

/// A single semantic problem in a [`TransportConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    NoHosts,
    InvalidHost(HostParseError),
    ZeroTimeout(&'static str),
    DeadTimeoutCapTooSmall { base_secs: u64, cap_secs: u64 },
    InvalidStatus(u16),
    ZeroSniffInterval,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::NoHosts => write!(f, "at least one host must be configured"),
            ValidationError::InvalidHost(e) => write!(f, "{}", e),
            ValidationError::ZeroTimeout(field) => write!(f, "{} must be greater than zero", field),
            ValidationError::DeadTimeoutCapTooSmall { base_secs, cap_secs } => write!(
                f,
                "pool.max_dead_timeout_secs ({}) is smaller than pool.dead_timeout_secs ({})",
                cap_secs, base_secs
            ),
            ValidationError::InvalidStatus(code) => {
                write!(f, "retry_on_status contains invalid HTTP status {}", code)
            }
            ValidationError::ZeroSniffInterval => write!(f, "sniff.interval_secs must be greater than zero"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &TransportConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.hosts.is_empty() {
        errors.push(ValidationError::NoHosts);
    } else if let Err(host_errors) = normalize_hosts(&config.hosts) {
        errors.extend(host_errors.into_iter().map(ValidationError::InvalidHost));
    }

    if config.request_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("request_timeout_ms"));
    }
    if config.sniff.timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("sniff.timeout_ms"));
    }
    if config.pool.dead_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("pool.dead_timeout_secs"));
    }
    if config.pool.max_dead_timeout_secs < config.pool.dead_timeout_secs {
        errors.push(ValidationError::DeadTimeoutCapTooSmall {
            base_secs: config.pool.dead_timeout_secs,
            cap_secs: config.pool.max_dead_timeout_secs,
        });
    }

    for code in &config.retry_on_status {
        if !(100..=599).contains(code) {
            errors.push(ValidationError::InvalidStatus(*code));
        }
    }

    if config.sniff.interval_secs == Some(0) {
        errors.push(ValidationError::ZeroSniffInterval);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&TransportConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let mut config = TransportConfig::default();
        config.hosts = vec!["ftp://nope".into()];
        config.request_timeout_ms = 0;
        config.pool.dead_timeout_secs = 30;
        config.pool.max_dead_timeout_secs = 10;
        config.retry_on_status = vec![503, 999];
        config.sniff.interval_secs = Some(0);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::ZeroTimeout("request_timeout_ms")));
        assert!(errors.contains(&ValidationError::InvalidStatus(999)));
        assert!(errors.contains(&ValidationError::ZeroSniffInterval));
    }

    #[test]
    fn empty_hosts() {
        let mut config = TransportConfig::default();
        config.hosts.clear();
        assert_eq!(validate_config(&config).unwrap_err(), vec![ValidationError::NoHosts]);
    }
}
