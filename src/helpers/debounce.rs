//! Trailing debounce with an injected clock
//!
//! Synchronous counterpart to the timer-driven debounce in the scroll store:
//! the caller supplies `now`, so the hot path never awaits and tests need no
//! real time.

use std::time::{Duration, Instant};

/// Keeps the latest value until `delay` has passed without a new push
#[derive(Clone, Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    /// Create a debouncer with the given quiet period
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Replace the pending value and restart the quiet period
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now));
    }

    /// Take the pending value once the quiet period has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let ready = self
            .pending
            .as_ref()
            .is_some_and(|(_, at)| now.saturating_duration_since(*at) >= self.delay);
        if ready {
            self.pending.take().map(|(value, _)| value)
        } else {
            None
        }
    }

    /// When the pending value becomes ready
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at + self.delay)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Drop the pending value
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_waits_for_quiet_period() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(100));
        d.push(1, start);
        assert_eq!(d.poll(start + Duration::from_millis(50)), None);
        assert_eq!(d.poll(start + Duration::from_millis(100)), Some(1));
        assert_eq!(d.poll(start + Duration::from_millis(500)), None);
    }

    #[test]
    fn test_debounce_burst_keeps_latest() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(100));
        d.push(1, start);
        d.push(2, start + Duration::from_millis(60));
        d.push(3, start + Duration::from_millis(120));
        // 100ms after the first push, but the burst is still going
        assert_eq!(d.poll(start + Duration::from_millis(160)), None);
        assert_eq!(d.deadline(), Some(start + Duration::from_millis(220)));
        assert_eq!(d.poll(start + Duration::from_millis(220)), Some(3));
        assert!(!d.is_pending());
    }
}
