use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::CoreError;

const MS_PER_HOUR: i64 = 60 * 60 * 1000;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Returns the current wall-clock time as milliseconds since Unix epoch.
pub fn physical_now() -> Result<i64, CoreError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .map_err(|_| CoreError::InvalidData("system clock before epoch".into()))
}

/// An opaque point in time: milliseconds since Unix epoch.
///
/// Instants are only ever compared by numeric ordering; nothing in the sync
/// layer decomposes them into calendar fields.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
pub struct UtcInstant(i64);

impl UtcInstant {
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn millis(&self) -> i64 {
        self.0
    }

    pub fn now() -> Result<Self, CoreError> {
        physical_now().map(Self)
    }

    pub fn add_hours(&self, hours: i64) -> Self {
        Self(self.0.saturating_add(hours.saturating_mul(MS_PER_HOUR)))
    }

    /// Whole days since the epoch, used to bucket instants by day.
    pub fn day_number(&self) -> i64 {
        self.0.div_euclid(MS_PER_DAY)
    }

    pub fn is_reached(&self, now: UtcInstant) -> bool {
        *self <= now
    }
}

/// Source of "now" for time-based derived state.
pub trait Clock {
    fn now(&self) -> UtcInstant;
}

/// Reads the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> UtcInstant {
        // A clock before 1970 reads as the epoch rather than failing every tick.
        UtcInstant::now().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_numeric() {
        let pairs = vec![
            (UtcInstant::from_millis(-5), UtcInstant::from_millis(0)),
            (UtcInstant::from_millis(100), UtcInstant::from_millis(101)),
            (UtcInstant::from_millis(1_700_000_000_000), UtcInstant::from_millis(i64::MAX)),
        ];
        for (a, b) in &pairs {
            assert!(a < b, "expected {a:?} < {b:?}");
        }
    }

    #[test]
    fn add_hours_moves_by_whole_hours() {
        let base = UtcInstant::from_millis(0);
        assert_eq!(base.add_hours(2).millis(), 2 * MS_PER_HOUR);
        assert_eq!(base.add_hours(-24).day_number(), -1);
    }

    #[test]
    fn reached_includes_equality() {
        let at = UtcInstant::from_millis(500);
        assert!(at.is_reached(UtcInstant::from_millis(500)));
        assert!(at.is_reached(UtcInstant::from_millis(501)));
        assert!(!at.is_reached(UtcInstant::from_millis(499)));
    }

    #[test]
    fn system_clock_is_after_2020() {
        let now = SystemClock.now();
        assert!(now > UtcInstant::from_millis(1_577_836_800_000));
    }
}
