//! temp_server - SQLite-backed temperature logger with an HTTP query API
//!
//! Ingestion runs on its own thread with a dedicated writer connection; the
//! HTTP handlers read through a second connection (WAL mode). The process
//! exits when the input ends or the HTTP server stops.
//!
//! Usage:
//!   temp_simulator | cargo run --release --bin temp_server
//!   temp_server --source serial --port /dev/ttyUSB0 --http-port 9000
//!
//! Environment variables:
//!   TEMP_DB_PATH, TEMP_SOURCE, TEMP_PORT, TEMP_HTTP_HOST, TEMP_HTTP_PORT,
//!   TEMP_RAW_KEEP_SEC, TEMP_HOUR_KEEP_SEC, TEMP_COMPACT_SEC

use clap::Parser;
use dotenv::dotenv;
use log::{error, info, warn};
use templog::api::{start_server, ApiState};
use templog::config::{init_logging, ServerConfig};
use templog::ingest::IngestPipeline;
use templog::storage::SqliteStore;
use templog::timeutil::{Calendar, SystemClock};
use tokio::sync::oneshot;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging();

    let config = ServerConfig::parse();
    let addr = match config.validate().and_then(|_| config.http_addr()) {
        Ok(addr) => addr,
        Err(e) => {
            error!("❌ {}", e);
            std::process::exit(2);
        }
    };

    info!("🌡️  Starting temp_server");
    info!("   ├─ Database: {}", config.db.display());
    info!("   ├─ Source: {:?}", config.source);
    info!("   ├─ HTTP: {}", addr);
    info!("   └─ Retention: raw {}s, hourly {}s, daily current year", config.retention.raw_keep_sec, config.retention.hour_keep_sec);

    let calendar = Calendar::local();

    let writer = SqliteStore::open(&config.db)?.with_retention(calendar, config.retention.plan());
    writer.init_schema()?;
    let reader = SqliteStore::open(&config.db)?;

    let source = config.open_source()?;

    let server = tokio::spawn(start_server(addr, ApiState::new(reader)));

    // Blocking reads stay off the runtime; the oneshot reports end of input
    let (done_tx, done_rx) = oneshot::channel();
    let compact_sec = config.retention.compact_sec;
    std::thread::Builder::new()
        .name("ingest".to_string())
        .spawn(move || {
            let mut pipeline = IngestPipeline::new(writer, SystemClock, calendar, compact_sec);
            let stats = pipeline.run(source);
            let _ = done_tx.send(stats);
        })?;

    tokio::select! {
        stats = done_rx => {
            match stats {
                Ok(stats) => info!(
                    "✅ Input closed: {} accepted, {} skipped, {} storage errors",
                    stats.accepted, stats.skipped, stats.sink_errors
                ),
                Err(_) => warn!("⚠️  Ingestion thread ended without reporting"),
            }
        }
        result = server => {
            match result {
                Ok(Ok(())) => info!("HTTP server stopped"),
                Ok(Err(e)) => {
                    error!("❌ HTTP server failed: {}", e);
                    return Err(e.into());
                }
                Err(e) => {
                    error!("❌ HTTP server task panicked: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
