/// Time source abstraction
///
/// Token expiry checks and task timestamps read the current time through the
/// [`Clock`] trait so tests can pin or advance time deterministically.
///
/// # Example
///
/// ```
/// use taskpilot_shared::clock::{Clock, ManualClock};
/// use chrono::{Duration, TimeZone, Utc};
///
/// let start = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
/// let clock = ManualClock::new(start);
/// clock.advance(Duration::minutes(5));
/// assert_eq!(clock.now(), start + Duration::minutes(5));
/// ```

use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Returns the current instant in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// Shared, type-erased clock handle
pub type SharedClock = Arc<dyn Clock>;

/// Wall clock backed by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests
///
/// Stores the instant as microseconds since the epoch, which matches the
/// precision PostgreSQL keeps for `TIMESTAMPTZ`.
#[derive(Debug)]
pub struct ManualClock {
    micros: AtomicI64,
}

impl ManualClock {
    /// Creates a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            micros: AtomicI64::new(start.timestamp_micros()),
        }
    }

    /// Moves the clock forward (or backward for negative durations)
    pub fn advance(&self, by: Duration) {
        let delta = by.num_microseconds().unwrap_or(i64::MAX);
        self.micros.fetch_add(delta, Ordering::SeqCst);
    }

    /// Jumps the clock to an absolute instant
    pub fn set(&self, to: DateTime<Utc>) {
        self.micros.store(to.timestamp_micros(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.micros.load(Ordering::SeqCst)).unwrap_or_default()
    }
}
