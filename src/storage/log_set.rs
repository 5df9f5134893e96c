//! File-backed sink: one retention log per stream

use super::kind::{RetentionPlan, StreamKind};
use super::sink::{MeasurementSink, SinkError};
use crate::retention::{Record, RetentionError, RetentionLog};
use crate::timeutil::{Calendar, Timestamp};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPaths {
    pub raw: PathBuf,
    pub hourly: PathBuf,
    pub daily: PathBuf,
}

impl Default for LogPaths {
    fn default() -> Self {
        Self {
            raw: "measurements.log".into(),
            hourly: "hourly_avg.log".into(),
            daily: "daily_avg.log".into(),
        }
    }
}

#[derive(Debug)]
pub struct LogSet {
    raw: RetentionLog,
    hourly: RetentionLog,
    daily: RetentionLog,
}

impl LogSet {
    pub fn new(paths: &LogPaths, calendar: Calendar, plan: RetentionPlan) -> Self {
        Self {
            raw: RetentionLog::with_policy(&paths.raw, calendar, plan.raw),
            hourly: RetentionLog::with_policy(&paths.hourly, calendar, plan.hourly),
            daily: RetentionLog::with_policy(&paths.daily, calendar, plan.daily),
        }
    }

    /// Load and trim every log; must run once before ingestion starts
    pub fn load_all(&mut self, now: Timestamp) -> Result<(), RetentionError> {
        for kind in StreamKind::all() {
            self.log_mut(kind).load_and_compact(now)?;
        }
        Ok(())
    }

    pub fn log(&self, kind: StreamKind) -> &RetentionLog {
        match kind {
            StreamKind::Raw => &self.raw,
            StreamKind::Hourly => &self.hourly,
            StreamKind::Daily => &self.daily,
        }
    }

    fn log_mut(&mut self, kind: StreamKind) -> &mut RetentionLog {
        match kind {
            StreamKind::Raw => &mut self.raw,
            StreamKind::Hourly => &mut self.hourly,
            StreamKind::Daily => &mut self.daily,
        }
    }
}

impl MeasurementSink for LogSet {
    fn append(&mut self, kind: StreamKind, ts: Timestamp, value: f64) -> Result<(), SinkError> {
        self.log_mut(kind).append(Record::new(ts, value))?;
        Ok(())
    }

    fn compact(&mut self, kind: StreamKind, now: Timestamp) -> Result<(), SinkError> {
        self.log_mut(kind).compact(now)?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "log files"
    }
}
