//! templog: temperature logging with hourly/daily averages and bounded retention
//!
//! Measurements arrive one per line (serial device or stdin), are stamped
//! with the host clock and fanned out to three streams: raw readings, hourly
//! averages and daily averages. Each stream is kept either in a crash-safe
//! append-only log file (`temp_logger`) or in SQLite behind a small HTTP
//! query API (`temp_server`).

pub mod aggregator;
pub mod api;
pub mod config;
pub mod ingest;
pub mod retention;
pub mod simulator;
pub mod storage;
pub mod timeutil;
