//! Clock injection, so decay/autonomy/restore can be driven deterministically
//! in tests instead of calling `Utc::now()` throughout the codebase.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// Anything that can report the current instant.
pub trait Clock: Send + Sync {
    /// The current instant, as the Scheduler sees it.
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock, backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock tests can advance by hand, so decay/idle-drift/autonomy-cooldown
/// logic can be exercised without sleeping real time.
#[derive(Clone)]
pub struct FakeClock {
    instant: Arc<Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    /// Start the fake clock at a fixed instant.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            instant: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.instant.lock().expect("fake clock mutex poisoned");
        *guard += delta;
    }

    /// Jump the clock to an absolute instant (used to simulate a restart
    /// after an arbitrary offline gap).
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant.lock().expect("fake clock mutex poisoned") = instant;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.lock().expect("fake clock mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fake_clock_advances() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = FakeClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(chrono::Duration::hours(6));
        assert_eq!(clock.now(), start + chrono::Duration::hours(6));
    }
}
