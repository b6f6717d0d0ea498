//! Exponential dead-connection backoff.

use std::time::{Duration, Instant};

/// Latest deadline handed out; roughly thirty years ahead.
pub const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// How long a connection stays dead after its latest failure.
///
/// `prior_failures` counts the consecutive failures recorded *before* the
/// one being punished, so the first failure waits exactly `base` and every
/// further failure doubles the wait until `cap` is reached.
pub fn dead_timeout(prior_failures: u32, base: Duration, cap: Duration) -> Duration {
    let mut delay = base.min(cap);
    for _ in 0..prior_failures {
        if delay.is_zero() || delay >= cap {
            break;
        }
        delay = delay.checked_mul(2).map_or(cap, |d| d.min(cap));
    }
    delay
}

/// `now + timeout`, clamped to [`FAR_FUTURE`] instead of overflowing.
pub fn deadline_after(now: Instant, timeout: Duration) -> Instant {
    now.checked_add(timeout.min(FAR_FUTURE)).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_secs(60);
    const CAP: Duration = Duration::from_secs(1920);

    #[test]
    fn test_backoff_calculation() {
        assert_eq!(dead_timeout(0, BASE, CAP), Duration::from_secs(60));
        assert_eq!(dead_timeout(1, BASE, CAP), Duration::from_secs(120));
        assert_eq!(dead_timeout(2, BASE, CAP), Duration::from_secs(240));
        assert_eq!(dead_timeout(5, BASE, CAP), Duration::from_secs(1920));
        assert_eq!(dead_timeout(6, BASE, CAP), CAP);
    }

    #[test]
    fn huge_failure_counts_saturate_at_cap() {
        assert_eq!(dead_timeout(40, BASE, CAP), CAP);
        assert_eq!(dead_timeout(u32::MAX, BASE, CAP), CAP);
    }

    #[test]
    fn doubling_continues_past_32_failures() {
        let cap = Duration::from_secs(1 << 40);
        let one = Duration::from_secs(1);
        assert_eq!(dead_timeout(31, one, cap), Duration::from_secs(1 << 31));
        assert_eq!(dead_timeout(32, one, cap), Duration::from_secs(1 << 32));
        assert_eq!(dead_timeout(35, one, cap), Duration::from_secs(1 << 35));
        assert_eq!(dead_timeout(40, one, cap), cap);
        assert_eq!(dead_timeout(41, one, cap), cap);
    }

    #[test]
    fn huge_base_and_cap_do_not_overflow() {
        let base = Duration::from_secs(u64::MAX / 2);
        let cap = Duration::from_secs(u64::MAX);
        assert_eq!(dead_timeout(0, base, cap), base);
        assert_eq!(dead_timeout(1, base, cap), Duration::from_secs(u64::MAX - 1));
        assert_eq!(dead_timeout(2, base, cap), cap);
        assert_eq!(dead_timeout(u32::MAX, base, cap), cap);
    }

    #[test]
    fn deadline_is_clamped() {
        let now = Instant::now();
        assert_eq!(deadline_after(now, Duration::from_secs(5)), now + Duration::from_secs(5));
        assert_eq!(deadline_after(now, Duration::from_secs(u64::MAX)), now + FAR_FUTURE);
    }

    #[test]
    fn monotonic_in_failures() {
        let mut previous = Duration::ZERO;
        let base = Duration::from_millis(250);
        let cap = Duration::from_secs(1 << 50);
        for k in 0..70u32 {
            let delay = dead_timeout(k, base, cap);
            assert!(delay >= previous, "delay shrank at k={}", k);
            let expected = 1u128
                .checked_shl(k)
                .and_then(|factor| base.as_millis().checked_mul(factor))
                .map_or(cap, |ms| {
                    Duration::from_millis(u64::try_from(ms).unwrap_or(u64::MAX)).min(cap)
                });
            assert_eq!(delay, expected, "k={}", k);
            previous = delay;
        }
    }
}
