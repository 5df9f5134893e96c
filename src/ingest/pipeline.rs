//! Ingestion driver: line → stamp → raw/hourly/daily sink, plus compaction
//!
//! One `IngestPipeline` owns both aggregators and the sink. Every method
//! takes `&mut self`, so there is exactly one sequential caller and nothing
//! here needs a lock. Compaction is polled inline after each measurement and
//! can never overlap an append.

use super::line_parser::parse_measurement;
use crate::aggregator::{FinishedPeriod, PeriodAggregator};
use crate::storage::{MeasurementSink, StreamKind};
use crate::timeutil::{Calendar, Clock, Timestamp};

const REPORT_INTERVAL_SECS: i64 = 600;

/// Issues non-decreasing timestamps from a clock that may step backwards
pub struct MonotonicStamper<C> {
    clock: C,
    last: Option<Timestamp>,
}

impl<C: Clock> MonotonicStamper<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, last: None }
    }

    pub fn stamp(&mut self) -> Timestamp {
        let now = self.clock.now();
        let ts = match self.last {
            Some(last) if now < last => {
                log::warn!(
                    "⚠️  Clock moved backwards by {}s, holding timestamp at {}",
                    last - now,
                    last
                );
                last
            }
            _ => now,
        };
        self.last = Some(ts);
        ts
    }

    /// Raw clock reading, used for scheduling
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub lines_read: u64,
    pub accepted: u64,
    pub skipped: u64,
    pub hourly_periods: u64,
    pub daily_periods: u64,
    pub compactions: u64,
    pub sink_errors: u64,
}

pub struct IngestPipeline<S, C> {
    sink: S,
    stamper: MonotonicStamper<C>,
    hourly: PeriodAggregator,
    daily: PeriodAggregator,
    compact_every: i64,
    next_compaction: Timestamp,
    last_report: Timestamp,
    stats: IngestStats,
}

impl<S: MeasurementSink, C: Clock> IngestPipeline<S, C> {
    pub fn new(sink: S, clock: C, calendar: Calendar, compact_every_secs: i64) -> Self {
        let compact_every = compact_every_secs.max(1);
        let now = clock.now();
        Self {
            sink,
            stamper: MonotonicStamper::new(clock),
            hourly: PeriodAggregator::hourly(calendar),
            daily: PeriodAggregator::daily(calendar),
            compact_every,
            next_compaction: now + compact_every,
            last_report: now,
            stats: IngestStats::default(),
        }
    }

    /// Drive the pipeline until the line source ends
    pub fn run<I>(&mut self, lines: I) -> IngestStats
    where
        I: IntoIterator<Item = String>,
    {
        log::info!("📡 Ingestion started (sink: {})", self.sink.backend_type());
        for line in lines {
            self.ingest_line(&line);
        }
        log::info!("Input closed after {} lines: {:?}", self.stats.lines_read, self.stats);
        self.stats.clone()
    }

    /// Parse, stamp and ingest one line. Returns the stamp on success.
    pub fn ingest_line(&mut self, line: &str) -> Option<Timestamp> {
        self.stats.lines_read += 1;

        let value = match parse_measurement(line) {
            Some(v) => v,
            None => {
                self.stats.skipped += 1;
                log::debug!("Skipping unparseable line: {:?}", line);
                return None;
            }
        };

        let ts = self.stamper.stamp();
        self.ingest(ts, value);
        self.poll_compaction();
        Some(ts)
    }

    /// Fan one measurement out to raw, hourly and daily, in that order
    pub fn ingest(&mut self, ts: Timestamp, value: f64) {
        self.stats.accepted += 1;
        self.deliver(StreamKind::Raw, ts, value);

        if let Some(period) = self.hourly.push(ts, value) {
            self.stats.hourly_periods += 1;
            self.emit(StreamKind::Hourly, period);
        }

        if let Some(period) = self.daily.push(ts, value) {
            self.stats.daily_periods += 1;
            self.emit(StreamKind::Daily, period);
            // A new day may also be a new year
            let now = self.stamper.now();
            self.compact_stream(StreamKind::Daily, now);
        }
    }

    /// Run a compaction pass if the interval has elapsed
    pub fn poll_compaction(&mut self) -> bool {
        let now = self.stamper.now();
        self.maybe_report(now);
        if now < self.next_compaction {
            return false;
        }
        self.compact_all(now);
        self.next_compaction = now + self.compact_every;
        true
    }

    pub fn compact_all(&mut self, now: Timestamp) {
        for kind in StreamKind::all() {
            self.compact_stream(kind, now);
        }
        self.stats.compactions += 1;
        log::debug!("Compaction pass done at {}", now);
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn emit(&mut self, kind: StreamKind, period: FinishedPeriod) {
        log::info!(
            "📊 {} average for period starting {}: {:.3}",
            kind,
            period.period_start,
            period.average
        );
        self.deliver(kind, period.period_start, period.average);
    }

    fn deliver(&mut self, kind: StreamKind, ts: Timestamp, value: f64) {
        if let Err(e) = self.sink.append(kind, ts, value) {
            self.stats.sink_errors += 1;
            log::error!("❌ Failed to store {} record at {}: {}", kind, ts, e);
        }
    }

    fn compact_stream(&mut self, kind: StreamKind, now: Timestamp) {
        if let Err(e) = self.sink.compact(kind, now) {
            self.stats.sink_errors += 1;
            log::error!("❌ Compaction of {} failed: {}", kind, e);
        }
    }

    fn maybe_report(&mut self, now: Timestamp) {
        if now - self.last_report >= REPORT_INTERVAL_SECS {
            log::info!(
                "📈 Ingested {} measurements ({} skipped lines, {} hourly / {} daily periods)",
                self.stats.accepted,
                self.stats.skipped,
                self.stats.hourly_periods,
                self.stats.daily_periods
            );
            self.last_report = now;
        }
    }
}
