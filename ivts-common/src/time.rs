//! Timestamp utilities and the injectable clock

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Source of the current time
///
/// Session logic never calls the wall clock directly; it asks a `Clock`
/// so tests can pin time to a scenario.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Jump to an absolute instant (may move backwards)
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Absolute difference between two instants
pub fn abs_diff(a: DateTime<Utc>, b: DateTime<Utc>) -> Duration {
    if a >= b {
        a - b
    } else {
        b - a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_system_clock_tracks_wall_time() {
        let before = now();
        let observed = SystemClock.now();
        assert!(observed >= before);
    }

    #[test]
    fn test_manual_clock_set_and_advance() {
        let clock = ManualClock::new(at(10, 0));
        assert_eq!(clock.now(), at(10, 0));

        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), at(10, 5));

        clock.set(at(9, 0));
        assert_eq!(clock.now(), at(9, 0));
    }

    #[test]
    fn test_abs_diff_is_symmetric() {
        assert_eq!(abs_diff(at(9, 0), at(9, 20)), Duration::minutes(20));
        assert_eq!(abs_diff(at(9, 20), at(9, 0)), Duration::minutes(20));
        assert_eq!(abs_diff(at(9, 0), at(9, 0)), Duration::zero());
    }
}
