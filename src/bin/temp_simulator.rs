//! temp_simulator - emits a synthetic temperature reading every interval
//!
//! Usage:
//!   cargo run --bin temp_simulator -- --interval 1 | temp_logger --source stdin
//!   temp_simulator --out serial --port /dev/pts/3

use clap::Parser;
use dotenv::dotenv;
use log::{error, info};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use templog::config::{init_logging, log_serial_settings, OutputKind, SimulatorConfig};
use templog::simulator::{format_sample, SignalModel};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging();

    let config = SimulatorConfig::parse();
    if let Err(e) = config.validate() {
        error!("❌ {}", e);
        std::process::exit(2);
    }

    let mut out: Box<dyn Write> = match (config.out, &config.port) {
        (OutputKind::Serial, Some(port)) => {
            log_serial_settings(port, config.baud);
            Box::new(OpenOptions::new().write(true).open(port)?)
        }
        _ => Box::new(io::stdout()),
    };

    info!(
        "🎲 Simulating base {:.2} ± {:.2}, noise σ {:.2}, every {}s",
        config.base, config.amp, config.noise, config.interval
    );

    let mut model = SignalModel::new(config.base, config.amp, config.noise);
    let started = Instant::now();
    let interval = Duration::from_secs(config.interval.max(1));

    loop {
        let value = model.sample(started.elapsed().as_secs_f64());
        out.write_all(format_sample(value).as_bytes())?;
        out.flush()?;
        std::thread::sleep(interval);
    }
}
