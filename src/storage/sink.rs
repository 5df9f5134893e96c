//! Sink trait for raw records and finished periods
//!
//! The ingestion driver calls `append` once per raw record and once per
//! finished period, in production order, and `compact` on its schedule.

use super::kind::StreamKind;
use crate::retention::RetentionError;
use crate::timeutil::Timestamp;

#[derive(Debug)]
pub enum SinkError {
    Retention(RetentionError),
    Database(String),
}

impl From<RetentionError> for SinkError {
    fn from(err: RetentionError) -> Self {
        SinkError::Retention(err)
    }
}

impl From<rusqlite::Error> for SinkError {
    fn from(err: rusqlite::Error) -> Self {
        SinkError::Database(err.to_string())
    }
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Retention(e) => write!(f, "Retention log error: {}", e),
            SinkError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for SinkError {}

pub trait MeasurementSink {
    /// Persist one `(timestamp, value)` pair on the given stream
    fn append(&mut self, kind: StreamKind, ts: Timestamp, value: f64) -> Result<(), SinkError>;

    /// Drop everything on the stream older than its cutoff at `now`
    fn compact(&mut self, kind: StreamKind, now: Timestamp) -> Result<(), SinkError>;

    /// Backend name for logging
    fn backend_type(&self) -> &'static str;
}
