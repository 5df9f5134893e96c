//! Storage backends for the three logical streams (raw, hourly, daily)
//!
//! ```text
//! IngestPipeline ──append/compact──► MeasurementSink
//!                                     ├── LogSet       (retention log files)
//!                                     └── SqliteStore  (tables, read by the HTTP API)
//! ```

pub mod kind;
pub mod log_set;
pub mod sink;
pub mod sqlite_store;

pub use kind::{RetentionPlan, StreamKind};
pub use log_set::{LogPaths, LogSet};
pub use sink::{MeasurementSink, SinkError};
pub use sqlite_store::{DbPoint, DbStats, SqliteStore, StoreError};
