//! Time sources for the frame cycle.
//!
//! Every timestamp inside the crate is a [`Duration`] measured from an
//! arbitrary epoch chosen by the clock. Cooldown arithmetic only ever
//! compares timestamps taken from the same clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic time source sampled once per frame by the pipeline.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Wall-clock time since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually driven clock. Clones share the same reading, so a test can keep
/// one handle and advance the clock owned by a pipeline.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(at: Duration) -> Self {
        let clock = Self::new();
        clock.set(at);
        clock
    }

    pub fn set(&self, at: Duration) {
        self.nanos.store(at.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

/// True while `now` is less than `window` after `since`.
pub(crate) fn within(since: Option<Duration>, now: Duration, window: Duration) -> bool {
    since.is_some_and(|t| now.saturating_sub(t) < window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_window() {
        let s = Duration::from_secs;
        assert!(!within(None, s(5), s(10)));
        assert!(within(Some(s(5)), s(5), s(10)));
        assert!(within(Some(s(5)), s(14), s(10)));
        assert!(!within(Some(s(5)), s(15), s(10)));
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance(Duration::from_millis(1500));
        assert_eq!(clock.now(), Duration::from_millis(1500));

        handle.set(Duration::from_secs(3));
        assert_eq!(clock.now(), Duration::from_secs(3));
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
