//! Time source and per-user day boundaries.
//!
//! Everything temporal in the engine -- day truncation, month rollover,
//! call-time resolution -- goes through [`Clock`] and [`UserTz`]. Nothing
//! else reads the wall clock, which is what makes the streak and wallet
//! logic testable at fixed points in time.

use std::sync::Mutex;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

/// Supplies "now". The engine takes it as a trait object so tests and
/// replays can pin time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time source used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable time source for tests and deterministic runs.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *lock(&self.now) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = lock(&self.now);
        *guard = *guard + by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

/// A user's timezone as a whole-hour UTC offset.
///
/// Day boundaries for streaks and the wallet's daily cap are computed in
/// this offset, so a completion at 23:30 local counts for the local day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserTz {
    offset_hours: i32,
}

impl UserTz {
    pub const UTC: UserTz = UserTz { offset_hours: 0 };

    pub fn new(offset_hours: i32) -> Self {
        // Valid civil offsets span -12..=+14.
        Self {
            offset_hours: offset_hours.clamp(-12, 14),
        }
    }

    pub fn offset_hours(self) -> i32 {
        self.offset_hours
    }

    fn fixed(self) -> FixedOffset {
        FixedOffset::east_opt(self.offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
    }

    /// The user-local calendar date at instant `at`.
    pub fn local_date(self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.fixed()).date_naive()
    }

    /// Half-open UTC interval `[start, end)` covering the user-local `date`.
    pub fn day_bounds(self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self
            .fixed()
            .from_local_datetime(&date.and_time(NaiveTime::MIN))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
        (start, start + Duration::days(1))
    }

    /// UTC instant of user-local `date` at `hour:minute`.
    pub fn local_datetime(self, date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
        let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
        self.fixed()
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(time)))
    }
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Lock a mutex, recovering the inner value if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
