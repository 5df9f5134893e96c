//! temp_logger - file-backed temperature logger
//!
//! Reads one measurement per line from a serial device (or stdin), stamps it
//! with the host clock and keeps three retention logs:
//! raw measurements, hourly averages and daily averages.
//!
//! Usage:
//!   cargo run --release --bin temp_logger -- --port /dev/ttyUSB0
//!   temp_simulator | temp_logger --source stdin
//!
//! Environment variables:
//!   TEMP_SOURCE, TEMP_PORT, TEMP_RAW_LOG, TEMP_HOUR_LOG, TEMP_DAY_LOG,
//!   TEMP_RAW_KEEP_SEC, TEMP_HOUR_KEEP_SEC, TEMP_COMPACT_SEC

use clap::Parser;
use dotenv::dotenv;
use log::{error, info};
use templog::config::{init_logging, LoggerConfig};
use templog::ingest::IngestPipeline;
use templog::storage::LogSet;
use templog::timeutil::{Calendar, Clock, SystemClock};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging();

    let config = LoggerConfig::parse();
    if let Err(e) = config.validate() {
        error!("❌ {}", e);
        std::process::exit(2);
    }

    info!("🌡️  Starting temp_logger");
    info!("   ├─ Source: {:?} {}", config.source, config.port.as_ref().map(|p| p.display().to_string()).unwrap_or_default());
    info!("   ├─ Raw log: {} (keep {}s)", config.raw.display(), config.retention.raw_keep_sec);
    info!("   ├─ Hourly log: {} (keep {}s)", config.hour.display(), config.retention.hour_keep_sec);
    info!("   ├─ Daily log: {} (current year)", config.day.display());
    info!("   └─ Compaction every {}s", config.retention.compact_sec);

    let calendar = Calendar::local();
    let clock = SystemClock;

    let mut logs = LogSet::new(&config.log_paths(), calendar, config.retention.plan());
    logs.load_all(clock.now())?;

    let source = config.open_source()?;

    let mut pipeline = IngestPipeline::new(logs, clock, calendar, config.retention.compact_sec);
    let stats = pipeline.run(source);

    info!(
        "✅ temp_logger finished: {} accepted, {} skipped, {} storage errors",
        stats.accepted, stats.skipped, stats.sink_errors
    );
    Ok(())
}
