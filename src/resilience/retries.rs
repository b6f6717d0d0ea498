//! Retry policy.
//!
//! # Responsibilities
//! - Hold the attempt budget and what counts as retryable
//! - Classify each attempt outcome into success, retry or terminal failure
//!
//! # Design Decisions
//! - Connection-level failures are always retryable
//! - Timeouts are retryable only when `retry_on_timeout` is set
//! - Statuses are retryable only when listed in `retry_on_status`; any other
//!   non-2xx status is an application error and is returned as-is

use reqwest::Method;
use std::collections::HashSet;

use crate::config::TransportConfig;

/// What to do with the outcome of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Hand the response to the caller.
    Success,
    /// Mark the node dead and try another one if attempts remain.
    Retry,
    /// Stop and surface the error to the caller.
    Fail,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_on_timeout: bool,
    pub retry_on_status: HashSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&TransportConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &TransportConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_on_timeout: config.retry_on_timeout,
            retry_on_status: config.retry_statuses(),
        }
    }

    /// Total number of attempts a request may make.
    pub fn attempt_budget(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Classify a received HTTP status.
    ///
    /// `ignore` lists statuses the caller asked to receive as responses; a
    /// 404 answer to HEAD is an existence check, not an error.
    pub fn classify_status(&self, method: &Method, status: u16, ignore: &[u16]) -> Verdict {
        if (200..300).contains(&status) || ignore.contains(&status) {
            return Verdict::Success;
        }
        if *method == Method::HEAD && status == 404 {
            return Verdict::Success;
        }
        if self.retry_on_status.contains(&status) {
            Verdict::Retry
        } else {
            Verdict::Fail
        }
    }

    pub fn classify_timeout(&self) -> Verdict {
        if self.retry_on_timeout {
            Verdict::Retry
        } else {
            Verdict::Fail
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_is_retries_plus_one() {
        let mut policy = RetryPolicy::default();
        assert_eq!(policy.attempt_budget(), 4);
        policy.max_retries = 0;
        assert_eq!(policy.attempt_budget(), 1);
        policy.max_retries = u32::MAX;
        assert_eq!(policy.attempt_budget(), u32::MAX);
    }

    #[test]
    fn status_classification() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.classify_status(&Method::GET, 200, &[]), Verdict::Success);
        assert_eq!(policy.classify_status(&Method::GET, 201, &[]), Verdict::Success);
        assert_eq!(policy.classify_status(&Method::GET, 503, &[]), Verdict::Retry);
        assert_eq!(policy.classify_status(&Method::GET, 504, &[]), Verdict::Retry);
        assert_eq!(policy.classify_status(&Method::GET, 502, &[]), Verdict::Fail);
        assert_eq!(policy.classify_status(&Method::GET, 404, &[]), Verdict::Fail);
        assert_eq!(policy.classify_status(&Method::GET, 500, &[]), Verdict::Fail);
    }

    #[test]
    fn ignored_statuses_win_over_retry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.classify_status(&Method::GET, 404, &[404]), Verdict::Success);
        assert_eq!(policy.classify_status(&Method::GET, 503, &[503]), Verdict::Success);
    }

    #[test]
    fn head_404_is_an_answer() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.classify_status(&Method::HEAD, 404, &[]), Verdict::Success);
        assert_eq!(policy.classify_status(&Method::HEAD, 400, &[]), Verdict::Fail);
    }

    #[test]
    fn timeout_follows_flag() {
        let mut policy = RetryPolicy::default();
        assert_eq!(policy.classify_timeout(), Verdict::Fail);
        policy.retry_on_timeout = true;
        assert_eq!(policy.classify_timeout(), Verdict::Retry);
    }
}
