use std::time::Duration;

/// Reconnect backoff driven by the pump tick.
///
/// Each failure doubles the threshold (up to `max`) and arms a countdown of that
/// length. The client stays in its failed state until the countdown elapses.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    threshold: Duration,
    remaining: Option<Duration>,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            threshold: base,
            remaining: None,
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn is_armed(&self) -> bool {
        self.remaining.is_some()
    }

    /// Records a failure: doubles the threshold and restarts the countdown.
    pub fn fail(&mut self) -> Duration {
        self.threshold = self.threshold.saturating_mul(2).min(self.max);
        self.remaining = Some(self.threshold);
        self.threshold
    }

    /// Advances the countdown. Returns true exactly once, when it reaches zero.
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        match self.remaining {
            Some(remaining) if remaining > elapsed => {
                self.remaining = Some(remaining - elapsed);
                false
            }
            Some(_) => {
                self.remaining = None;
                true
            }
            None => false,
        }
    }

    /// A confirmed connection: back to the base threshold, countdown cleared.
    pub fn reset(&mut self) {
        self.threshold = self.base;
        self.remaining = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_threshold_doubles_and_resets() {
        let mut backoff = Backoff::new(secs(1), secs(64));
        assert_eq!(backoff.threshold(), secs(1));
        assert_eq!(backoff.fail(), secs(2));
        assert_eq!(backoff.fail(), secs(4));
        backoff.reset();
        assert_eq!(backoff.threshold(), secs(1));
        assert!(!backoff.is_armed());
    }

    #[test]
    fn test_threshold_is_capped() {
        let mut backoff = Backoff::new(secs(1), secs(8));
        for _ in 0..10 {
            backoff.fail();
        }
        assert_eq!(backoff.threshold(), secs(8));
    }

    #[test]
    fn test_countdown_elapses_once() {
        let mut backoff = Backoff::new(Duration::from_millis(100), secs(10));
        backoff.fail();
        let tick = Duration::from_millis(100);
        assert!(!backoff.tick(tick));
        assert!(backoff.tick(tick));
        assert!(!backoff.tick(tick));
        assert!(!backoff.is_armed());
        // Threshold stays doubled until a confirmed connection.
        assert_eq!(backoff.threshold(), Duration::from_millis(200));
    }

    #[test]
    fn test_unarmed_tick_is_noop() {
        let mut backoff = Backoff::new(secs(1), secs(10));
        assert!(!backoff.tick(secs(100)));
    }
}
