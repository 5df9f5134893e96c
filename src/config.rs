//! Command-line / environment configuration for the binaries
//!
//! Every flag can also be set through the environment variable named in its
//! `env` attribute; a `.env` file in the working directory is loaded first.

use crate::ingest::{device_source, stdin_source, BoxedSource};
use crate::storage::{LogPaths, RetentionPlan};
use clap::{Args, Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    MissingValue(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingValue(msg) => write!(f, "Missing configuration value: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    Stdin,
    Serial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputKind {
    Stdout,
    Serial,
}

/// Retention horizons and compaction cadence shared by logger and server
#[derive(Debug, Clone, Args)]
pub struct RetentionArgs {
    /// Seconds of raw measurements to keep
    #[arg(long = "raw-keep-sec", env = "TEMP_RAW_KEEP_SEC", default_value_t = 86_400)]
    pub raw_keep_sec: i64,

    /// Seconds of hourly averages to keep
    #[arg(long = "hour-keep-sec", env = "TEMP_HOUR_KEEP_SEC", default_value_t = 2_592_000)]
    pub hour_keep_sec: i64,

    /// Seconds between compaction passes
    #[arg(long = "compact-sec", env = "TEMP_COMPACT_SEC", default_value_t = 300)]
    pub compact_sec: i64,
}

impl RetentionArgs {
    pub fn plan(&self) -> RetentionPlan {
        RetentionPlan::new(self.raw_keep_sec, self.hour_keep_sec)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("--raw-keep-sec", self.raw_keep_sec),
            ("--hour-keep-sec", self.hour_keep_sec),
            ("--compact-sec", self.compact_sec),
        ] {
            if value <= 0 {
                return Err(ConfigError::InvalidValue(format!("{} must be positive, got {}", name, value)));
            }
        }
        Ok(())
    }
}

const DEFAULT_BAUD: u32 = 9600;

/// Line speed is not set from here; the device must already be configured
pub fn log_serial_settings(port: &Path, baud: u32) {
    log::info!(
        "🔌 Serial {} expected at {} baud (configure with `stty -F {} {} raw`)",
        port.display(),
        baud,
        port.display(),
        baud
    );
}

fn open_source(
    source: SourceKind,
    port: Option<&PathBuf>,
    baud: u32,
) -> Result<BoxedSource, Box<dyn std::error::Error>> {
    match (source, port) {
        (SourceKind::Stdin, _) => Ok(stdin_source()),
        (SourceKind::Serial, Some(port)) => {
            log_serial_settings(port, baud);
            device_source(port)
                .map_err(|e| format!("can't open serial port {}: {}", port.display(), e).into())
        }
        (SourceKind::Serial, None) => Err(Box::new(ConfigError::MissingValue(
            "--port required for serial".to_string(),
        ))),
    }
}

fn require_port(serial: bool, port: Option<&PathBuf>) -> Result<(), ConfigError> {
    if serial && port.is_none() {
        return Err(ConfigError::MissingValue("--port required for serial".to_string()));
    }
    Ok(())
}

/// temp_logger: ingest into raw/hourly/daily retention log files
#[derive(Debug, Clone, Parser)]
#[command(name = "temp_logger", version)]
pub struct LoggerConfig {
    #[arg(long, value_enum, env = "TEMP_SOURCE", default_value = "serial")]
    pub source: SourceKind,

    /// Serial device path, e.g. /dev/ttyUSB0
    #[arg(long, env = "TEMP_PORT")]
    pub port: Option<PathBuf>,

    /// Serial line speed
    #[arg(long, env = "TEMP_BAUD", default_value_t = DEFAULT_BAUD)]
    pub baud: u32,

    #[arg(long, env = "TEMP_RAW_LOG", default_value = "measurements.log")]
    pub raw: PathBuf,

    #[arg(long, env = "TEMP_HOUR_LOG", default_value = "hourly_avg.log")]
    pub hour: PathBuf,

    #[arg(long, env = "TEMP_DAY_LOG", default_value = "daily_avg.log")]
    pub day: PathBuf,

    #[command(flatten)]
    pub retention: RetentionArgs,
}

impl LoggerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_port(self.source == SourceKind::Serial, self.port.as_ref())?;
        self.retention.validate()
    }

    pub fn log_paths(&self) -> LogPaths {
        LogPaths {
            raw: self.raw.clone(),
            hourly: self.hour.clone(),
            daily: self.day.clone(),
        }
    }

    pub fn open_source(&self) -> Result<BoxedSource, Box<dyn std::error::Error>> {
        open_source(self.source, self.port.as_ref(), self.baud)
    }
}

/// temp_server: ingest into SQLite and serve the query API
#[derive(Debug, Clone, Parser)]
#[command(name = "temp_server", version)]
pub struct ServerConfig {
    #[arg(long, env = "TEMP_DB_PATH", default_value = "temp.db")]
    pub db: PathBuf,

    #[arg(long, value_enum, env = "TEMP_SOURCE", default_value = "stdin")]
    pub source: SourceKind,

    #[arg(long, env = "TEMP_PORT")]
    pub port: Option<PathBuf>,

    #[arg(long, env = "TEMP_BAUD", default_value_t = DEFAULT_BAUD)]
    pub baud: u32,

    #[arg(long = "http-host", env = "TEMP_HTTP_HOST", default_value = "127.0.0.1")]
    pub http_host: String,

    #[arg(long = "http-port", env = "TEMP_HTTP_PORT", default_value_t = 8080)]
    pub http_port: u16,

    #[command(flatten)]
    pub retention: RetentionArgs,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_port(self.source == SourceKind::Serial, self.port.as_ref())?;
        self.http_addr()?;
        self.retention.validate()
    }

    pub fn http_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.http_host, self.http_port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("bad --http-host {}", self.http_host)))
    }

    pub fn open_source(&self) -> Result<BoxedSource, Box<dyn std::error::Error>> {
        open_source(self.source, self.port.as_ref(), self.baud)
    }
}

/// temp_simulator: emit a synthetic daily temperature curve
#[derive(Debug, Clone, Parser)]
#[command(name = "temp_simulator", version)]
pub struct SimulatorConfig {
    /// Seconds between samples
    #[arg(long, env = "SIM_INTERVAL", default_value_t = 1)]
    pub interval: u64,

    #[arg(long, env = "SIM_BASE", default_value_t = 22.0)]
    pub base: f64,

    /// Amplitude of the 24h sine
    #[arg(long, env = "SIM_AMP", default_value_t = 2.0)]
    pub amp: f64,

    /// Standard deviation of the gaussian noise
    #[arg(long, env = "SIM_NOISE", default_value_t = 0.2)]
    pub noise: f64,

    #[arg(long, value_enum, env = "SIM_OUT", default_value = "stdout")]
    pub out: OutputKind,

    #[arg(long, env = "SIM_PORT")]
    pub port: Option<PathBuf>,

    #[arg(long, env = "SIM_BAUD", default_value_t = DEFAULT_BAUD)]
    pub baud: u32,
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_port(self.out == OutputKind::Serial, self.port.as_ref())?;
        if !(self.noise >= 0.0 && self.noise.is_finite()) {
            return Err(ConfigError::InvalidValue(format!("--noise must be >= 0, got {}", self.noise)));
        }
        Ok(())
    }
}

/// Logger setup shared by all binaries: stderr, `info` unless RUST_LOG says otherwise
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();
}
