//! Retry backoff policy: decides when a failed task runs again.

use chrono::{DateTime, Duration, Utc};

/// Upper bound on any single retry delay (10 minutes). Bounds worst-case
/// retry latency regardless of how many attempts remain.
const MAX_BACKOFF_MS: i64 = 600_000;

/// Backoff policy derived from the dispatch settings row.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: i64,
    /// Double the delay on each subsequent attempt.
    pub exponential: bool,
}

impl BackoffPolicy {
    pub fn new(base_delay_ms: i64, exponential: bool) -> Self {
        Self {
            base_delay_ms,
            exponential,
        }
    }

    /// Delay before the next retry, in milliseconds.
    ///
    /// `attempts` is the count AFTER incrementing for the current failure,
    /// so the first retry (attempts = 1) uses the base delay unchanged.
    pub fn next_delay_ms(&self, attempts: i32) -> i64 {
        let factor = if self.exponential {
            // Shift capped well below the point where it could overflow or
            // matter — the result is clamped to MAX_BACKOFF_MS anyway.
            let exp = attempts.saturating_sub(1).clamp(0, 30) as u32;
            1i64 << exp
        } else {
            1
        };
        self.base_delay_ms
            .saturating_mul(factor)
            .min(MAX_BACKOFF_MS)
    }

    /// Absolute time the task becomes due again.
    pub fn next_execute_at(&self, now: DateTime<Utc>, attempts: i32) -> DateTime<Utc> {
        now + Duration::milliseconds(self.next_delay_ms(attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_doubling() {
        let policy = BackoffPolicy::new(5000, true);
        assert_eq!(policy.next_delay_ms(1), 5000);
        assert_eq!(policy.next_delay_ms(2), 10000);
        assert_eq!(policy.next_delay_ms(3), 20000);
    }

    #[test]
    fn test_delay_capped_at_ten_minutes() {
        let policy = BackoffPolicy::new(5000, true);
        assert_eq!(policy.next_delay_ms(8), 600_000);
        assert_eq!(policy.next_delay_ms(100), 600_000);
    }

    #[test]
    fn test_fixed_delay_when_not_exponential() {
        let policy = BackoffPolicy::new(5000, false);
        assert_eq!(policy.next_delay_ms(1), 5000);
        assert_eq!(policy.next_delay_ms(5), 5000);
    }

    #[test]
    fn test_large_base_still_capped() {
        let policy = BackoffPolicy::new(900_000, false);
        assert_eq!(policy.next_delay_ms(1), 600_000);
    }

    #[test]
    fn test_next_execute_at_offset() {
        let policy = BackoffPolicy::new(5000, true);
        let now = Utc::now();
        let due = policy.next_execute_at(now, 2);
        assert_eq!((due - now).num_milliseconds(), 10000);
    }
}
