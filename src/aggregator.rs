//! Period aggregator: folds a timestamped stream into per-bucket averages
//!
//! The bucketing rule is a plain function value bound at construction
//! (`floor(instant) -> bucket start`). A bucket is closed the first time an
//! observation lands in a different bucket; only observed buckets are ever
//! emitted, gaps are not back-filled.

use crate::timeutil::{Calendar, Timestamp};

pub type BucketFn = Box<dyn Fn(Timestamp) -> Timestamp + Send>;

/// Average of one closed bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinishedPeriod {
    pub period_start: Timestamp,
    pub average: f64,
}

pub struct PeriodAggregator {
    floor: BucketFn,
    initialized: bool,
    bucket_start: Timestamp,
    sum: f64,
    count: u64,
}

impl PeriodAggregator {
    pub fn new<F>(floor: F) -> Self
    where
        F: Fn(Timestamp) -> Timestamp + Send + 'static,
    {
        Self {
            floor: Box::new(floor),
            initialized: false,
            bucket_start: 0,
            sum: 0.0,
            count: 0,
        }
    }

    /// Buckets aligned to local calendar hours
    pub fn hourly(calendar: Calendar) -> Self {
        Self::new(move |ts| calendar.floor_to_hour(ts))
    }

    /// Buckets aligned to local calendar days
    pub fn daily(calendar: Calendar) -> Self {
        Self::new(move |ts| calendar.floor_to_day(ts))
    }

    /// Add one observation. Returns the previous bucket's average when this
    /// observation opens a new bucket.
    pub fn push(&mut self, ts: Timestamp, value: f64) -> Option<FinishedPeriod> {
        let bucket = (self.floor)(ts);

        if !self.initialized {
            self.reset(bucket);
        }

        let mut finished = None;
        if bucket != self.bucket_start {
            if self.count > 0 {
                finished = Some(FinishedPeriod {
                    period_start: self.bucket_start,
                    average: self.sum / self.count as f64,
                });
            }
            self.reset(bucket);
        }

        self.sum += value;
        self.count += 1;

        finished
    }

    /// Start of the currently open bucket, if any observation was seen
    pub fn open_bucket(&self) -> Option<Timestamp> {
        self.initialized.then_some(self.bucket_start)
    }

    /// Observations accumulated in the open bucket
    pub fn pending_count(&self) -> u64 {
        self.count
    }

    fn reset(&mut self, bucket_start: Timestamp) {
        self.initialized = true;
        self.bucket_start = bucket_start;
        self.sum = 0.0;
        self.count = 0;
    }
}

impl std::fmt::Debug for PeriodAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodAggregator")
            .field("initialized", &self.initialized)
            .field("bucket_start", &self.bucket_start)
            .field("sum", &self.sum)
            .field("count", &self.count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = 3600;

    fn at(h: i64, m: i64) -> Timestamp {
        h * HOUR + m * 60
    }

    fn hourly() -> PeriodAggregator {
        PeriodAggregator::hourly(Calendar::utc())
    }

    #[test]
    fn test_first_push_never_finishes() {
        let mut agg = hourly();
        assert_eq!(agg.push(at(9, 10), 20.0), None);
        assert_eq!(agg.open_bucket(), Some(at(9, 0)));
        assert_eq!(agg.pending_count(), 1);

        let mut fresh = PeriodAggregator::new(|ts| ts);
        assert_eq!(fresh.push(-1_000_000, 1.0), None);
    }

    #[test]
    fn test_hour_rollover_scenario() {
        let mut agg = hourly();
        assert_eq!(agg.push(at(9, 10), 20.0), None);
        assert_eq!(agg.push(at(9, 40), 22.0), None);

        let finished = agg.push(at(10, 5), 30.0).expect("bucket 09:00 closes");
        assert_eq!(finished.period_start, at(9, 0));
        assert_eq!(finished.average, 21.0);

        // 10:00 is still open
        assert_eq!(agg.push(at(10, 50), 26.0), None);
        assert_eq!(agg.pending_count(), 2);
    }

    #[test]
    fn test_average_over_many_values() {
        let mut agg = hourly();
        let values = [18.5, 19.0, 21.25, 22.0, 20.75];
        for (i, v) in values.iter().enumerate() {
            assert_eq!(agg.push(at(3, i as i64 * 10), *v), None);
        }
        let finished = agg.push(at(4, 0), 0.0).unwrap();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        assert!((finished.average - mean).abs() < 1e-12);
    }

    #[test]
    fn test_gap_drops_empty_buckets() {
        let mut agg = hourly();
        agg.push(at(1, 0), 10.0);
        agg.push(at(1, 30), 12.0);

        // Nothing between 02:00 and 05:00
        let finished = agg.push(at(5, 15), 40.0).unwrap();
        assert_eq!(finished.period_start, at(1, 0));
        assert_eq!(finished.average, 11.0);

        let next = agg.push(at(6, 0), 0.0).unwrap();
        assert_eq!(next.period_start, at(5, 0));
        assert_eq!(next.average, 40.0);
    }

    #[test]
    fn test_at_most_one_period_per_call() {
        let mut agg = hourly();
        let mut emitted = Vec::new();
        for minute in (0..6 * 60).step_by(7) {
            if let Some(p) = agg.push(minute * 60, 1.0) {
                emitted.push(p.period_start);
            }
        }
        assert_eq!(emitted, vec![0, HOUR, 2 * HOUR, 3 * HOUR, 4 * HOUR]);
    }

    #[test]
    fn test_backwards_instant_is_a_rollover() {
        let mut agg = hourly();
        agg.push(at(9, 10), 20.0);
        let finished = agg.push(at(8, 59), 5.0).unwrap();
        assert_eq!(finished.period_start, at(9, 0));
        assert_eq!(agg.open_bucket(), Some(at(8, 0)));
    }

    #[test]
    fn test_daily_buckets() {
        let mut agg = PeriodAggregator::daily(Calendar::utc());
        let day = 24 * HOUR;
        assert_eq!(agg.push(day + 10, 1.0), None);
        assert_eq!(agg.push(2 * day - 1, 3.0), None);
        let finished = agg.push(2 * day, 100.0).unwrap();
        assert_eq!(finished.period_start, day);
        assert_eq!(finished.average, 2.0);
    }
}
