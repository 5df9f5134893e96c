//! Calendar utility: local-time bucketing and the canonical timestamp text form
//!
//! Instants are unix seconds (`Timestamp`). All calendar arithmetic goes
//! through a `Calendar`, which carries the zone used for "local" time. The
//! binaries use `Calendar::local()` (host time-zone database, DST included);
//! tests inject a fixed offset or a named IANA zone so bucket boundaries are
//! reproducible on any host.
//!
//! DST note: floors are computed on the local wall clock and mapped back to
//! an instant through the zone's own conversion. An ambiguous local time
//! (fall-back) resolves to the latest candidate not after the input instant;
//! a skipped one (spring-forward) resolves to the first instant after the
//! gap. Expect bucket widths of 23h/25h on those days.

use chrono::{
    DateTime, Datelike, FixedOffset, Local, LocalResult, NaiveDate, NaiveDateTime, Offset,
    TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Unix timestamp in whole seconds
pub type Timestamp = i64;

/// Canonical local textual form, e.g. `2024-03-01T14:05:09`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeParseError {
    pub input: String,
}

impl std::fmt::Display for TimeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid timestamp '{}' (expected YYYY-MM-DDTHH:MM:SS)", self.input)
    }
}

impl std::error::Error for TimeParseError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// Host local time (TZ database, DST)
    Local,
    Fixed(FixedOffset),
    /// Named IANA zone, independent of the host configuration
    Named(Tz),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    zone: Zone,
}

impl Calendar {
    pub fn local() -> Self {
        Self { zone: Zone::Local }
    }

    pub fn fixed(offset: FixedOffset) -> Self {
        Self {
            zone: Zone::Fixed(offset),
        }
    }

    pub fn utc() -> Self {
        Self::fixed(Utc.fix())
    }

    pub fn named(tz: Tz) -> Self {
        Self {
            zone: Zone::Named(tz),
        }
    }

    /// Start of the local calendar hour containing `ts`
    pub fn floor_to_hour(&self, ts: Timestamp) -> Timestamp {
        self.floor_with(ts, |naive| naive.date().and_hms_opt(naive.hour(), 0, 0))
    }

    /// Start of the local calendar day containing `ts`
    pub fn floor_to_day(&self, ts: Timestamp) -> Timestamp {
        self.floor_with(ts, |naive| naive.date().and_hms_opt(0, 0, 0))
    }

    /// January 1st, 00:00:00 local, of the year containing `ts`
    pub fn start_of_current_year(&self, ts: Timestamp) -> Timestamp {
        self.floor_with(ts, |naive| {
            NaiveDate::from_ymd_opt(naive.year(), 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        })
    }

    pub fn format_timestamp(&self, ts: Timestamp) -> String {
        match self.to_local(ts) {
            Some(naive) => naive.format(TIMESTAMP_FORMAT).to_string(),
            None => ts.to_string(),
        }
    }

    pub fn parse_timestamp(&self, s: &str) -> Result<Timestamp, TimeParseError> {
        let naive = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).map_err(|_| {
            TimeParseError {
                input: s.to_string(),
            }
        })?;
        Ok(self.resolve(&naive, None))
    }

    fn floor_with<F>(&self, ts: Timestamp, floor: F) -> Timestamp
    where
        F: Fn(&NaiveDateTime) -> Option<NaiveDateTime>,
    {
        match self.to_local(ts).as_ref().and_then(floor) {
            Some(start) => self.resolve(&start, Some(ts)),
            None => ts,
        }
    }

    fn to_local(&self, ts: Timestamp) -> Option<NaiveDateTime> {
        let utc = DateTime::<Utc>::from_timestamp(ts, 0)?;
        Some(match self.zone {
            Zone::Local => utc.with_timezone(&Local).naive_local(),
            Zone::Fixed(offset) => utc.with_timezone(&offset).naive_local(),
            Zone::Named(tz) => utc.with_timezone(&tz).naive_local(),
        })
    }

    fn offset_secs(&self, ts: Timestamp) -> i64 {
        let offset = match (self.zone, DateTime::<Utc>::from_timestamp(ts, 0)) {
            (Zone::Fixed(offset), _) => offset,
            (Zone::Local, Some(utc)) => utc.with_timezone(&Local).offset().fix(),
            (Zone::Named(tz), Some(utc)) => utc.with_timezone(&tz).offset().fix(),
            (_, None) => Utc.fix(),
        };
        i64::from(offset.local_minus_utc())
    }

    fn candidates(&self, naive: &NaiveDateTime) -> LocalResult<Timestamp> {
        match self.zone {
            Zone::Local => Local.from_local_datetime(naive).map(|dt| dt.timestamp()),
            Zone::Fixed(offset) => offset.from_local_datetime(naive).map(|dt| dt.timestamp()),
            Zone::Named(tz) => tz.from_local_datetime(naive).map(|dt| dt.timestamp()),
        }
    }

    /// Map a local wall-clock time back to an instant
    fn resolve(&self, naive: &NaiveDateTime, not_after: Option<Timestamp>) -> Timestamp {
        match self.candidates(naive) {
            LocalResult::Single(ts) => ts,
            LocalResult::Ambiguous(earliest, latest) => match not_after {
                Some(limit) if latest <= limit => latest,
                _ => earliest,
            },
            LocalResult::None => self.first_after_gap(naive),
        }
    }

    /// First instant whose local time is at or past `naive`, which falls in
    /// a DST gap. Offsets a day either side bracket the transition.
    fn first_after_gap(&self, naive: &NaiveDateTime) -> Timestamp {
        let wall = naive.and_utc().timestamp();
        let around = [self.offset_secs(wall - 86_400), self.offset_secs(wall + 86_400)];
        let (before, after) = (around[0].min(around[1]), around[0].max(around[1]));

        // local(lo) < naive <= local(hi)
        let mut lo = wall - after;
        let mut hi = wall - before;
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            match self.to_local(mid) {
                Some(local) if local >= *naive => hi = mid,
                _ => lo = mid,
            }
        }
        hi
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::local()
    }
}

/// Source of "now" for the ingestion driver
pub trait Clock {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now().timestamp()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, ts: Timestamp) {
        self.now.store(ts, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset_cal(secs: i32) -> Calendar {
        Calendar::fixed(FixedOffset::east_opt(secs).unwrap())
    }

    #[test]
    fn test_floor_to_hour_utc() {
        let cal = Calendar::utc();
        let ts = cal.parse_timestamp("2024-03-01T14:05:09").unwrap();
        let floored = cal.floor_to_hour(ts);
        assert_eq!(cal.format_timestamp(floored), "2024-03-01T14:00:00");
        assert_eq!(ts - floored, 5 * 60 + 9);
    }

    #[test]
    fn test_floor_to_hour_half_hour_offset() {
        // +03:30: local hour boundaries fall on :30 UTC
        let cal = offset_cal(3 * 3600 + 1800);
        let ts = cal.parse_timestamp("2024-03-01T14:05:09").unwrap();
        let floored = cal.floor_to_hour(ts);
        assert_eq!(cal.format_timestamp(floored), "2024-03-01T14:00:00");
        assert_eq!(floored % 3600, 1800);
    }

    #[test]
    fn test_floor_to_day_uses_local_midnight() {
        let cal = offset_cal(-5 * 3600);
        let ts = cal.parse_timestamp("2024-07-04T01:30:00").unwrap();
        let day = cal.floor_to_day(ts);
        assert_eq!(cal.format_timestamp(day), "2024-07-04T00:00:00");
        // UTC calendar would put the same instant on a different hour of the day
        assert_eq!(Calendar::utc().format_timestamp(day), "2024-07-04T05:00:00");
    }

    #[test]
    fn test_floor_is_idempotent() {
        let cal = offset_cal(2 * 3600);
        let ts = cal.parse_timestamp("2023-11-30T23:59:59").unwrap();
        let hour = cal.floor_to_hour(ts);
        assert_eq!(cal.floor_to_hour(hour), hour);
        let day = cal.floor_to_day(ts);
        assert_eq!(cal.floor_to_day(day), day);
    }

    #[test]
    fn test_start_of_current_year() {
        let cal = offset_cal(9 * 3600);
        let ts = cal.parse_timestamp("2024-08-15T12:00:00").unwrap();
        let start = cal.start_of_current_year(ts);
        assert_eq!(cal.format_timestamp(start), "2024-01-01T00:00:00");

        let new_year = cal.parse_timestamp("2025-01-01T00:00:00").unwrap();
        assert_eq!(cal.start_of_current_year(new_year), new_year);
        assert_eq!(cal.start_of_current_year(new_year - 1), start);
    }

    #[test]
    fn test_format_parse_round_trip() {
        let cal = offset_cal(3600);
        for text in ["2024-03-01T14:05:09", "1999-12-31T23:59:59", "2024-02-29T00:00:00"] {
            let ts = cal.parse_timestamp(text).unwrap();
            assert_eq!(cal.format_timestamp(ts), text);
        }
        let ts = 1_709_301_909;
        assert_eq!(cal.parse_timestamp(&cal.format_timestamp(ts)).unwrap(), ts);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let cal = Calendar::utc();
        for bad in [
            "",
            "2024-03-01 14:05:09",
            "2024-03-01T14:05",
            "2024-13-01T00:00:00",
            "not a time",
            "2024-03-01T14:05:09Z",
        ] {
            let err = cal.parse_timestamp(bad).unwrap_err();
            assert_eq!(err.input, bad);
        }
    }

    #[test]
    fn test_fall_back_hour_floors_to_matching_pass() {
        // 2024-11-03 01:00-01:59 happens twice in New York (EDT, then EST)
        let cal = Calendar::named(chrono_tz::America::New_York);
        let first_pass = 1_730_611_800; // 01:30 EDT
        let second_pass = 1_730_615_400; // 01:30 EST

        assert_eq!(cal.format_timestamp(first_pass), "2024-11-03T01:30:00");
        assert_eq!(cal.format_timestamp(second_pass), "2024-11-03T01:30:00");
        assert_eq!(cal.floor_to_hour(first_pass), 1_730_610_000);
        assert_eq!(cal.floor_to_hour(second_pass), 1_730_613_600);
        assert_eq!(cal.floor_to_hour(1_730_613_600), 1_730_613_600);

        // Text without an offset takes the first pass
        assert_eq!(cal.parse_timestamp("2024-11-03T01:00:00").unwrap(), 1_730_610_000);
    }

    #[test]
    fn test_spring_forward_at_midnight() {
        // Santiago skips 2024-09-08 00:00-00:59; the day starts at 01:00 -03
        let cal = Calendar::named(chrono_tz::America::Santiago);
        let day_start = 1_725_768_000;
        let morning = 1_725_800_400; // 10:00 -03

        assert_eq!(cal.floor_to_day(morning), day_start);
        assert_eq!(cal.format_timestamp(day_start), "2024-09-08T01:00:00");
        assert_eq!(cal.floor_to_day(day_start), day_start);
        assert_eq!(cal.floor_to_day(day_start - 1), 1_725_681_600);
        assert_eq!(cal.format_timestamp(day_start - 1), "2024-09-07T23:59:59");

        assert_eq!(cal.parse_timestamp("2024-09-08T00:30:00").unwrap(), day_start);
    }

    #[test]
    fn test_manual_clock() {
        let clock = Arc::new(ManualClock::new(100));
        assert_eq!(clock.now(), 100);
        clock.advance(5);
        assert_eq!(clock.now(), 105);
        clock.set(42);
        assert_eq!(clock.now(), 42);
    }
}
