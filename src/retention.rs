//! Retention log: append-only text series with an in-memory mirror
//!
//! One record per line, `<local timestamp> <value with 3 decimals>`:
//!
//! ```text
//! 2024-03-01T14:05:09 22.347
//! ```
//!
//! Appends are incremental writes at the tail. Compaction drops records older
//! than the cutoff and rewrites the whole file through `<path>.tmp` followed
//! by a rename, so an interrupted rewrite leaves either the old file or the
//! new one, never a mix. If the rename fails the temp file is copied over the
//! live file and removed; that fallback is not atomic.

use crate::timeutil::{Calendar, Timestamp};
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub type CutoffFn = Box<dyn Fn(Timestamp) -> Timestamp + Send>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    pub ts: Timestamp,
    pub value: f64,
}

impl Record {
    pub fn new(ts: Timestamp, value: f64) -> Self {
        Self { ts, value }
    }
}

/// How far back a log keeps records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Keep the last N seconds
    KeepFor(i64),
    /// Keep everything since January 1st of the current local year
    CurrentYear,
}

impl RetentionPolicy {
    pub fn cutoff(&self, calendar: &Calendar, now: Timestamp) -> Timestamp {
        match self {
            RetentionPolicy::KeepFor(secs) => now.saturating_sub(*secs),
            RetentionPolicy::CurrentYear => calendar.start_of_current_year(now),
        }
    }
}

#[derive(Debug)]
pub enum RetentionError {
    Io { path: PathBuf, source: io::Error },
    /// `append` called before `load_and_compact`
    NotLoaded(PathBuf),
}

impl RetentionError {
    fn io(path: &Path, source: io::Error) -> Self {
        RetentionError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl std::fmt::Display for RetentionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetentionError::Io { path, source } => {
                write!(f, "IO error on {}: {}", path.display(), source)
            }
            RetentionError::NotLoaded(path) => {
                write!(f, "Retention log {} appended before load", path.display())
            }
        }
    }
}

impl std::error::Error for RetentionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RetentionError::Io { source, .. } => Some(source),
            RetentionError::NotLoaded(_) => None,
        }
    }
}

/// Format one record as a log line (newline included)
pub fn format_record(calendar: &Calendar, record: &Record) -> String {
    format!("{} {:.3}\n", calendar.format_timestamp(record.ts), record.value)
}

/// Parse one log line; `None` for anything malformed
pub fn parse_record(calendar: &Calendar, line: &str) -> Option<Record> {
    let (ts, value) = line.trim_end().split_once(' ')?;
    let ts = calendar.parse_timestamp(ts).ok()?;
    let value = value.trim().parse::<f64>().ok()?;
    value.is_finite().then_some(Record { ts, value })
}

pub struct RetentionLog {
    path: PathBuf,
    calendar: Calendar,
    cutoff: CutoffFn,
    records: VecDeque<Record>,
    appender: Option<File>,
    loaded: bool,
}

impl RetentionLog {
    pub fn new<F>(path: impl Into<PathBuf>, calendar: Calendar, cutoff: F) -> Self
    where
        F: Fn(Timestamp) -> Timestamp + Send + 'static,
    {
        Self {
            path: path.into(),
            calendar,
            cutoff: Box::new(cutoff),
            records: VecDeque::new(),
            appender: None,
            loaded: false,
        }
    }

    pub fn with_policy(path: impl Into<PathBuf>, calendar: Calendar, policy: RetentionPolicy) -> Self {
        Self::new(path, calendar, move |now| policy.cutoff(&calendar, now))
    }

    pub fn records(&self) -> &VecDeque<Record> {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Read the backing file, drop expired records and rewrite it.
    ///
    /// A missing or unreadable file is not an error: the log starts empty.
    /// Only a failed rewrite is reported.
    pub fn load_and_compact(&mut self, now: Timestamp) -> Result<(), RetentionError> {
        self.records.clear();
        self.appender = None;

        match fs::read(&self.path) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let mut skipped = 0usize;
                for line in text.lines() {
                    match parse_record(&self.calendar, line) {
                        Some(record) => self.records.push_back(record),
                        None if line.trim().is_empty() => {}
                        None => {
                            skipped += 1;
                            log::debug!("Skipping malformed record in {}: {:?}", self.path.display(), line);
                        }
                    }
                }
                if skipped > 0 {
                    log::warn!("⚠️  {}: skipped {} malformed lines", self.path.display(), skipped);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("No existing log at {}, starting empty", self.path.display());
            }
            Err(e) => {
                log::warn!("⚠️  Cannot read {} ({}), starting empty", self.path.display(), e);
            }
        }

        self.loaded = true;
        let loaded = self.records.len();
        let removed = self.prune(now);
        log::info!(
            "📂 Loaded {} records from {} ({} expired)",
            loaded,
            self.path.display(),
            removed
        );
        self.rewrite_file()
    }

    /// Append one record at the tail of the file. Memory is only updated
    /// once the write succeeded.
    pub fn append(&mut self, record: Record) -> Result<(), RetentionError> {
        if !self.loaded {
            return Err(RetentionError::NotLoaded(self.path.clone()));
        }

        let line = format_record(&self.calendar, &record);
        if let Err(e) = self.write_tail(line.as_bytes()) {
            // Reopen on the next append
            self.appender = None;
            return Err(RetentionError::io(&self.path, e));
        }

        self.records.push_back(record);
        Ok(())
    }

    /// Drop expired records and rewrite the file. Returns how many were dropped.
    pub fn compact(&mut self, now: Timestamp) -> Result<usize, RetentionError> {
        let removed = self.prune(now);
        self.rewrite_file()?;
        log::debug!(
            "Compacted {}: {} kept, {} dropped",
            self.path.display(),
            self.records.len(),
            removed
        );
        Ok(removed)
    }

    fn prune(&mut self, now: Timestamp) -> usize {
        let cut = (self.cutoff)(now);
        let before = self.records.len();
        self.records.retain(|r| r.ts >= cut);
        before - self.records.len()
    }

    /// Append at the end of the file. A failed write is cut back off so the
    /// next record starts on its own line.
    fn write_tail(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.appender.is_none() {
            let mut file = OpenOptions::new()
                .create(true)
                .read(true)
                .append(true)
                .open(&self.path)?;
            if ends_mid_line(&mut file)? {
                log::warn!("⚠️  {} ends with a partial line, starting a new one", self.path.display());
                file.write_all(b"\n")?;
            }
            self.appender = Some(file);
        }
        let file = match self.appender.as_mut() {
            Some(file) => file,
            None => return Err(io::Error::new(io::ErrorKind::Other, "appender not open")),
        };

        let len = file.metadata()?.len();
        if let Err(e) = file.write_all(bytes) {
            if let Err(trunc) = file.set_len(len) {
                log::warn!("⚠️  Could not trim partial write in {}: {}", self.path.display(), trunc);
            }
            return Err(e);
        }
        Ok(())
    }

    fn rewrite_file(&mut self) -> Result<(), RetentionError> {
        let tmp = self.write_snapshot()?;
        self.commit_snapshot(&tmp)
    }

    pub(crate) fn tmp_path(&self) -> PathBuf {
        let mut os = self.path.as_os_str().to_owned();
        os.push(".tmp");
        PathBuf::from(os)
    }

    /// First half of a rewrite: full content into `<path>.tmp`, synced
    pub(crate) fn write_snapshot(&self) -> Result<PathBuf, RetentionError> {
        let tmp = self.tmp_path();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| RetentionError::io(parent, e))?;
        }

        let write = || -> io::Result<()> {
            let mut out = BufWriter::new(File::create(&tmp)?);
            for record in &self.records {
                out.write_all(format_record(&self.calendar, record).as_bytes())?;
            }
            let file = out.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()
        };
        write().map_err(|e| RetentionError::io(&tmp, e))?;
        Ok(tmp)
    }

    /// Second half of a rewrite: replace the live file with the snapshot
    pub(crate) fn commit_snapshot(&mut self, tmp: &Path) -> Result<(), RetentionError> {
        // The tail handle would keep pointing at the replaced file
        self.appender = None;

        if let Err(e) = fs::rename(tmp, &self.path) {
            log::warn!(
                "⚠️  Atomic replace of {} failed ({}), falling back to copy",
                self.path.display(),
                e
            );
            fs::copy(tmp, &self.path).map_err(|e| RetentionError::io(&self.path, e))?;
            if let Err(e) = fs::remove_file(tmp) {
                log::warn!("⚠️  Could not remove {}: {}", tmp.display(), e);
            }
        }

        fsync_parent(&self.path);
        Ok(())
    }
}

impl std::fmt::Debug for RetentionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetentionLog")
            .field("path", &self.path)
            .field("records", &self.records.len())
            .field("loaded", &self.loaded)
            .finish()
    }
}

fn ends_mid_line(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

#[cfg(unix)]
fn fsync_parent(path: &Path) {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
        log::debug!("fsync of {} failed: {}", parent.display(), e);
    }
}

#[cfg(not(unix))]
fn fsync_parent(_path: &Path) {}
