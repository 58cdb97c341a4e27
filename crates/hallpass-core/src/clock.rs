//! Time source for every state transition.

use std::ops::Range;
use std::sync::Mutex;

use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Supplies the current instant.
pub trait Clock: Send + Sync {
    /// The current time in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward (or backward, for skew tests).
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now += by;
    }

    /// Move the clock forward by whole minutes.
    pub fn advance_minutes(&self, minutes: i64) {
        self.advance(Duration::minutes(minutes));
    }

    /// Jump to an absolute instant.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// The calendar date of `instant` in `tz`.
#[must_use]
pub fn local_date(tz: Tz, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// First instant of `day` in `tz`, as UTC.
fn local_midnight(tz: Tz, day: NaiveDate) -> DateTime<Utc> {
    let naive = day.and_time(chrono::NaiveTime::MIN);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => t.with_timezone(&Utc),
        // Midnight skipped by a DST jump; the day starts an hour later.
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map_or_else(|| naive.and_utc(), |t| t.with_timezone(&Utc)),
    }
}

/// The half-open UTC range covering local calendar day `day` in `tz`.
#[must_use]
pub fn local_day_window(tz: Tz, day: NaiveDate) -> Range<DateTime<Utc>> {
    let next = day.succ_opt().unwrap_or(day);
    local_midnight(tz, day)..local_midnight(tz, next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = DateTime::<Utc>::UNIX_EPOCH;
        let clock = ManualClock::new(start);
        clock.advance_minutes(15);
        assert_eq!(clock.now() - start, Duration::minutes(15));
        clock.advance(Duration::seconds(-30));
        assert_eq!(clock.now() - start, Duration::seconds(870));
    }

    #[test]
    fn test_local_date_uses_timezone() {
        let tz = chrono_tz::America::Chicago;
        // 03:30 UTC is still the previous evening in Chicago.
        let late = Utc.with_ymd_and_hms(2025, 10, 29, 3, 30, 0).unwrap();
        assert_eq!(local_date(tz, late), NaiveDate::from_ymd_opt(2025, 10, 28).unwrap());
    }

    #[test]
    fn test_local_day_window_spans_dst_change() {
        let tz = chrono_tz::America::Chicago;
        let day = NaiveDate::from_ymd_opt(2025, 11, 2).unwrap();
        let window = local_day_window(tz, day);
        assert_eq!(window.start, Utc.with_ymd_and_hms(2025, 11, 2, 5, 0, 0).unwrap());
        assert_eq!(window.end - window.start, Duration::hours(25));
    }
}
