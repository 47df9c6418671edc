//! Post-send pause computation for the global bot rate ceiling.
//!
//! The simplest correct limiter: a fixed pause after every send, long
//! enough that `telegram_per_minute` can never be exceeded. The per-chat
//! ceiling in the settings row is carried for a future sliding-window
//! limiter and is NOT enforced here — multi-chat bursts only see the
//! uniform global pause.

use std::time::Duration;

use relay_common::types::DispatchSettings;

/// Hard floor on the pause between sends, regardless of configuration.
const MIN_PAUSE_MS: u64 = 250;

/// How long the worker must pause after a successful send so the global
/// per-minute ceiling is respected.
pub fn pause_after_send(settings: &DispatchSettings) -> Duration {
    let from_ceiling = if settings.telegram_per_minute > 0 {
        // Round up: 60000 / 25 = 2400ms between sends for a 25/min ceiling.
        60_000u64.div_ceil(settings.telegram_per_minute as u64)
    } else {
        0
    };
    let configured = settings.min_delay_ms.max(0) as u64;

    Duration::from_millis(configured.max(from_ceiling).max(MIN_PAUSE_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(per_minute: i32, min_delay_ms: i64) -> DispatchSettings {
        DispatchSettings {
            telegram_per_minute: per_minute,
            min_delay_ms,
            ..DispatchSettings::default()
        }
    }

    #[test]
    fn test_ceiling_dominates_small_min_delay() {
        // 25/min needs at least 2400ms between sends.
        let pause = pause_after_send(&settings(25, 100));
        assert_eq!(pause, Duration::from_millis(2400));
    }

    #[test]
    fn test_configured_delay_dominates_loose_ceiling() {
        let pause = pause_after_send(&settings(600, 5000));
        assert_eq!(pause, Duration::from_millis(5000));
    }

    #[test]
    fn test_floor_applies() {
        let pause = pause_after_send(&settings(0, 0));
        assert_eq!(pause, Duration::from_millis(250));
    }

    #[test]
    fn test_ceiling_rounds_up() {
        // 60000 / 7 = 8571.43 → 8572ms, not 8571.
        let pause = pause_after_send(&settings(7, 0));
        assert_eq!(pause, Duration::from_millis(8572));
    }
}
