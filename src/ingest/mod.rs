//! Ingestion: line sources, line parsing and the driver loop
//!
//! ```text
//! LineSource → parse_measurement → MonotonicStamper → IngestPipeline
//!                                                      ├── raw     → sink
//!                                                      ├── hourly  → PeriodAggregator → sink
//!                                                      └── daily   → PeriodAggregator → sink
//! ```

pub mod line_parser;
pub mod pipeline;
pub mod source;

pub use line_parser::parse_measurement;
pub use pipeline::{IngestPipeline, IngestStats, MonotonicStamper};
pub use source::{device_source, stdin_source, BoxedSource, LineSource};
