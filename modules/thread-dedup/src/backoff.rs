//! Full-jitter exponential backoff.
//!
//! `attempt` is 1 for the first retry, 2 for the second, and so on. The
//! ceiling doubles with each attempt and is capped at `max`; the actual
//! delay is drawn uniformly from `[0, ceiling)`.

use std::time::Duration;

use rand::Rng;

/// Upper bound of the jitter window for a given attempt.
pub fn ceiling(attempt: u32, base: Duration, max: Duration) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt)).min(max)
}

/// Randomized delay before retry number `attempt`.
pub fn delay_for(attempt: u32, base: Duration, max: Duration) -> Duration {
    let window_ms = ceiling(attempt, base, max).as_millis() as u64;
    if window_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..window_ms))
}

/// Suspend the caller for a delay obtained from [`delay_for`].
pub async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_doubles_then_caps() {
        let base = Duration::from_millis(100);
        let max = Duration::from_millis(1_000);
        assert_eq!(ceiling(1, base, max), Duration::from_millis(200));
        assert_eq!(ceiling(2, base, max), Duration::from_millis(400));
        assert_eq!(ceiling(3, base, max), Duration::from_millis(800));
        assert_eq!(ceiling(4, base, max), max);
        assert_eq!(ceiling(200, base, max), max);
    }

    #[test]
    fn delay_stays_inside_window() {
        let base = Duration::from_millis(50);
        let max = Duration::from_secs(2);
        for attempt in 1..12 {
            let window = ceiling(attempt, base, max);
            for _ in 0..50 {
                assert!(delay_for(attempt, base, max) < window);
            }
        }
    }

    #[test]
    fn zero_base_never_waits() {
        assert_eq!(delay_for(3, Duration::ZERO, Duration::from_secs(1)), Duration::ZERO);
        assert_eq!(delay_for(3, Duration::from_millis(10), Duration::ZERO), Duration::ZERO);
    }

    #[tokio::test]
    async fn pause_with_zero_delay_returns_immediately() {
        let started = std::time::Instant::now();
        pause(delay_for(1, Duration::ZERO, Duration::ZERO)).await;
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn pause_waits_for_the_given_delay() {
        let started = std::time::Instant::now();
        pause(Duration::from_millis(20)).await;
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
