//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Delay before retry round `attempt` (0-based; the first round never waits).
///
/// Doubles from `base_ms`, is capped at `max_ms`, and adds up to 10% random jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(factor).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let first = calculate_backoff(1, 100, 2000);
        assert!(first >= Duration::from_millis(100) && first < Duration::from_millis(110));

        let second = calculate_backoff(2, 100, 2000);
        assert!(second >= Duration::from_millis(200));

        let capped = calculate_backoff(20, 100, 1000);
        assert!(capped >= Duration::from_millis(1000) && capped < Duration::from_millis(1100));
    }

    #[test]
    fn test_zero_base_never_waits() {
        assert_eq!(calculate_backoff(3, 0, 0), Duration::ZERO);
    }
}
