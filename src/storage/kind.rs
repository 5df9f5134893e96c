//! Logical streams and their retention horizons

use crate::retention::RetentionPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Raw,
    Hourly,
    Daily,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Raw => "raw",
            StreamKind::Hourly => "hourly",
            StreamKind::Daily => "daily",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "raw" => Some(StreamKind::Raw),
            "hourly" => Some(StreamKind::Hourly),
            "daily" => Some(StreamKind::Daily),
            _ => None,
        }
    }

    /// SQL table backing this stream
    pub fn table_name(&self) -> &'static str {
        match self {
            StreamKind::Raw => "raw_measurements",
            StreamKind::Hourly => "hourly_avg",
            StreamKind::Daily => "daily_avg",
        }
    }

    /// Compaction order: raw, hourly, daily
    pub fn all() -> [StreamKind; 3] {
        [StreamKind::Raw, StreamKind::Hourly, StreamKind::Daily]
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retention policy per stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPlan {
    pub raw: RetentionPolicy,
    pub hourly: RetentionPolicy,
    pub daily: RetentionPolicy,
}

impl RetentionPlan {
    pub fn new(raw_keep_secs: i64, hourly_keep_secs: i64) -> Self {
        Self {
            raw: RetentionPolicy::KeepFor(raw_keep_secs),
            hourly: RetentionPolicy::KeepFor(hourly_keep_secs),
            daily: RetentionPolicy::CurrentYear,
        }
    }

    pub fn policy(&self, kind: StreamKind) -> RetentionPolicy {
        match kind {
            StreamKind::Raw => self.raw,
            StreamKind::Hourly => self.hourly,
            StreamKind::Daily => self.daily,
        }
    }
}

impl Default for RetentionPlan {
    /// 24 hours of raw data, 30 days of hourly averages, the current year of daily ones
    fn default() -> Self {
        Self::new(24 * 3600, 30 * 24 * 3600)
    }
}
