//! Per-coefficient write throttle

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Enforces a minimum interval between writes of the same coefficient.
///
/// Time is always passed in so callers (and tests) control the clock.
#[derive(Debug, Default, Clone)]
pub struct WriteThrottle {
    last_write: HashMap<String, (Instant, f64)>,
}

impl WriteThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `name` may be written at `now`.
    ///
    /// Returns true if:
    /// - No prior write exists for this coefficient
    /// - At least `interval` has elapsed since the last write
    pub fn can_write(&self, name: &str, interval: Duration, now: Instant) -> bool {
        match self.last_write.get(name) {
            None => true,
            Some((at, _)) => now.saturating_duration_since(*at) >= interval,
        }
    }

    /// Time left before `name` may be written again.
    pub fn remaining(&self, name: &str, interval: Duration, now: Instant) -> Duration {
        self.last_write
            .get(name)
            .map_or(Duration::ZERO, |(at, _)| {
                interval.saturating_sub(now.saturating_duration_since(*at))
            })
    }

    /// [`Self::remaining`] in whole milliseconds, saturating at `u64::MAX`.
    pub fn remaining_ms(&self, name: &str, interval: Duration, now: Instant) -> u64 {
        u64::try_from(self.remaining(name, interval, now).as_millis()).unwrap_or(u64::MAX)
    }

    /// Record that `value` was written to `name` at `now`.
    pub fn record(&mut self, name: &str, value: f64, now: Instant) {
        self.last_write.insert(name.to_string(), (now, value));
    }

    /// Last value written to `name` by this process.
    pub fn last_value(&self, name: &str) -> Option<f64> {
        self.last_write.get(name).map(|(_, v)| *v)
    }

    pub fn last_write_at(&self, name: &str) -> Option<Instant> {
        self.last_write.get(name).map(|(at, _)| *at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_first_write() {
        let throttle = WriteThrottle::new();
        assert!(throttle.can_write("k", Duration::from_secs(300), Instant::now()));
    }

    #[test]
    fn suppresses_rapid_rewrites() {
        let mut throttle = WriteThrottle::new();
        let t0 = Instant::now();
        throttle.record("k", 0.5, t0);
        assert!(!throttle.can_write("k", Duration::from_secs(1), t0 + Duration::from_millis(999)));
        assert_eq!(
            throttle.remaining("k", Duration::from_secs(1), t0 + Duration::from_millis(400)),
            Duration::from_millis(600)
        );
    }

    #[test]
    fn remaining_ms_saturates() {
        let mut throttle = WriteThrottle::new();
        let t0 = Instant::now();
        throttle.record("k", 0.5, t0);
        assert_eq!(throttle.remaining_ms("k", Duration::from_secs(1), t0 + Duration::from_millis(250)), 750);
        assert_eq!(throttle.remaining_ms("k", Duration::MAX, t0), u64::MAX);
        assert_eq!(throttle.remaining_ms("other", Duration::MAX, t0), 0);
    }

    #[test]
    fn allows_after_interval() {
        let mut throttle = WriteThrottle::new();
        let t0 = Instant::now();
        throttle.record("k", 0.5, t0);
        assert!(throttle.can_write("k", Duration::from_secs(1), t0 + Duration::from_secs(1)));
        assert_eq!(throttle.last_value("k"), Some(0.5));
    }

    #[test]
    fn coefficients_are_independent() {
        let mut throttle = WriteThrottle::new();
        let t0 = Instant::now();
        throttle.record("a", 0.5, t0);
        assert!(throttle.can_write("b", Duration::from_secs(60), t0));
    }

    #[test]
    fn zero_interval_never_throttles() {
        let mut throttle = WriteThrottle::new();
        let t0 = Instant::now();
        throttle.record("k", 0.5, t0);
        assert!(throttle.can_write("k", Duration::ZERO, t0));
    }
}
