//! SQLite storage: one table per stream, queried by the HTTP API
//!
//! The ingestion side and the query side each open their own connection to
//! the same file. WAL mode lets the reader run while the writer inserts.

use super::kind::{RetentionPlan, StreamKind};
use super::sink::{MeasurementSink, SinkError};
use crate::timeutil::{Calendar, Timestamp};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;

const DEFAULT_SERIES_LIMIT: i64 = 1000;

#[derive(Debug)]
pub enum StoreError {
    Database(String),
    UnknownKind(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
            StoreError::UnknownKind(k) => write!(f, "Unknown stream kind: {}", k),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<StoreError> for SinkError {
    fn from(err: StoreError) -> Self {
        SinkError::Database(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DbPoint {
    pub ts: Timestamp,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DbStats {
    pub count: i64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

pub struct SqliteStore {
    conn: Connection,
    calendar: Calendar,
    plan: RetentionPlan,
}

impl SqliteStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Database(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(db_path)?;
        apply_pragmas(&conn)?;

        Ok(Self {
            conn,
            calendar: Calendar::local(),
            plan: RetentionPlan::default(),
        })
    }

    /// Calendar and horizons used by `compact`
    pub fn with_retention(mut self, calendar: Calendar, plan: RetentionPlan) -> Self {
        self.calendar = calendar;
        self.plan = plan;
        self
    }

    pub fn init_schema(&self) -> Result<(), StoreError> {
        for kind in StreamKind::all() {
            let table = kind.table_name();
            self.conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table}(ts INTEGER NOT NULL, value REAL NOT NULL);
                 CREATE INDEX IF NOT EXISTS idx_{table}_ts ON {table}(ts);"
            ))?;
        }
        log::info!("✅ SQLite schema ready");
        Ok(())
    }

    pub fn insert(&self, kind: StreamKind, ts: Timestamp, value: f64) -> Result<(), StoreError> {
        let sql = format!("INSERT INTO {}(ts, value) VALUES (?1, ?2)", kind.table_name());
        self.conn.execute(&sql, params![ts, value])?;
        Ok(())
    }

    /// Most recent raw measurement
    pub fn latest_raw(&self) -> Result<Option<DbPoint>, StoreError> {
        let point = self
            .conn
            .query_row(
                "SELECT ts, value FROM raw_measurements ORDER BY ts DESC LIMIT 1",
                [],
                |row| {
                    Ok(DbPoint {
                        ts: row.get(0)?,
                        value: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(point)
    }

    /// count/min/max/avg over `from..=to`; all zero when nothing matches
    pub fn stats(&self, kind: StreamKind, from: Timestamp, to: Timestamp) -> Result<DbStats, StoreError> {
        let sql = format!(
            "SELECT COUNT(*), MIN(value), MAX(value), AVG(value) FROM {} WHERE ts >= ?1 AND ts <= ?2",
            kind.table_name()
        );
        let stats = self.conn.query_row(&sql, params![from, to], |row| {
            let count: i64 = row.get(0)?;
            let min: Option<f64> = row.get(1)?;
            let max: Option<f64> = row.get(2)?;
            let avg: Option<f64> = row.get(3)?;
            Ok(DbStats {
                count,
                min: min.unwrap_or(0.0),
                max: max.unwrap_or(0.0),
                avg: avg.unwrap_or(0.0),
            })
        })?;
        Ok(stats)
    }

    /// Points in `from..=to`, oldest first. A non-positive limit means 1000.
    pub fn series(
        &self,
        kind: StreamKind,
        from: Timestamp,
        to: Timestamp,
        limit: i64,
    ) -> Result<Vec<DbPoint>, StoreError> {
        let limit = if limit <= 0 { DEFAULT_SERIES_LIMIT } else { limit };
        let sql = format!(
            "SELECT ts, value FROM {} WHERE ts >= ?1 AND ts <= ?2 ORDER BY ts ASC LIMIT ?3",
            kind.table_name()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![from, to, limit], |row| {
            Ok(DbPoint {
                ts: row.get(0)?,
                value: row.get(1)?,
            })
        })?;

        let mut points = Vec::new();
        for row in rows {
            points.push(row?);
        }
        Ok(points)
    }

    /// Delete rows older than `keep_from`; returns the number removed
    pub fn retention(&self, kind: StreamKind, keep_from: Timestamp) -> Result<usize, StoreError> {
        let sql = format!("DELETE FROM {} WHERE ts < ?1", kind.table_name());
        let removed = self.conn.execute(&sql, params![keep_from])?;
        Ok(removed)
    }

    /// Text-keyed lookup used by the query API
    pub fn resolve_kind(name: &str) -> Result<StreamKind, StoreError> {
        StreamKind::from_name(name).ok_or_else(|| StoreError::UnknownKind(name.to_string()))
    }
}

impl MeasurementSink for SqliteStore {
    fn append(&mut self, kind: StreamKind, ts: Timestamp, value: f64) -> Result<(), SinkError> {
        self.insert(kind, ts, value)?;
        Ok(())
    }

    fn compact(&mut self, kind: StreamKind, now: Timestamp) -> Result<(), SinkError> {
        let keep_from = self.plan.policy(kind).cutoff(&self.calendar, now);
        let removed = self.retention(kind, keep_from)?;
        log::debug!("Retention on {}: {} rows removed", kind.table_name(), removed);
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}

fn apply_pragmas(conn: &Connection) -> Result<(), StoreError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}
