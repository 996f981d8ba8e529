//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::NonZeroUsize,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::{cache::CacheConfig, hub::HubConfig};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "rfidsystem";
const ENV_PREFIX: &str = "RFID";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_SCAN_LOG_CAPACITY: u64 = 1000;
const DEFAULT_SEED_FILE: &str = "config/students.toml";
const DEFAULT_SIMULATOR_TARGET: &str = "http://127.0.0.1:8080";
const DEFAULT_SIMULATOR_RFID: &str = "ACLC-2023-001";

/// Command-line arguments for the rfidsystem binary.
#[derive(Debug, Parser)]
#[command(
    name = "rfidsystem",
    version,
    about = "RFID card-scan admin service with live dashboard updates"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "RFID_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service and live event stream.
    Serve(Box<ServeArgs>),
    /// Post simulated card scans to a running service.
    #[command(name = "simulate")]
    Simulate(SimulateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the per-view lookup cache capacity.
    #[arg(long = "cache-capacity", value_name = "COUNT")]
    pub cache_capacity: Option<u64>,

    /// Override the lookup cache entry lifetime.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Override the expired-entry sweep cadence (0 disables the sweep).
    #[arg(long = "cache-purge-interval-seconds", value_name = "SECONDS")]
    pub cache_purge_interval_seconds: Option<u64>,

    /// Override the per-subscriber event buffer.
    #[arg(long = "hub-subscriber-capacity", value_name = "COUNT")]
    pub hub_subscriber_capacity: Option<u64>,

    /// Override the stream keep-alive cadence.
    #[arg(long = "hub-heartbeat-seconds", value_name = "SECONDS")]
    pub hub_heartbeat_seconds: Option<u64>,

    /// Override how many scan log entries are retained.
    #[arg(long = "scan-log-capacity", value_name = "COUNT")]
    pub scan_log_capacity: Option<u64>,

    /// Override the student seed file.
    #[arg(long = "directory-seed-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub directory_seed_file: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Base URL of the running service.
    #[arg(long, value_name = "URL", default_value = DEFAULT_SIMULATOR_TARGET)]
    pub target: String,

    /// Card to scan; repeat to cycle through several cards.
    #[arg(long = "rfid", value_name = "RFID", default_value = DEFAULT_SIMULATOR_RFID)]
    pub rfids: Vec<String>,

    /// Seconds between scans.
    #[arg(long = "interval-seconds", value_name = "SECONDS", default_value_t = 5)]
    pub interval_seconds: u64,

    /// Stop after this many scans instead of running until interrupted.
    #[arg(long, value_name = "COUNT")]
    pub count: Option<u64>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub hub: HubSettings,
    pub directory: DirectorySettings,
    pub scan_log: ScanLogSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub capacity: NonZeroUsize,
    pub ttl: Duration,
    /// `None` disables the background sweep; expired entries are then only
    /// reclaimed when read.
    pub purge_interval: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct HubSettings {
    pub register_capacity: NonZeroUsize,
    pub unregister_capacity: NonZeroUsize,
    pub publish_capacity: NonZeroUsize,
    pub subscriber_capacity: NonZeroUsize,
    pub housekeeping_interval: Duration,
    pub heartbeat_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct DirectorySettings {
    pub seed_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ScanLogSettings {
    /// Entries retained before the oldest are discarded.
    pub capacity: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Simulate(_)) | None => {}
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    hub: RawHubSettings,
    directory: RawDirectorySettings,
    scan_log: RawScanLogSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache.capacity = Some(capacity);
        }
        if let Some(seconds) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.cache_purge_interval_seconds {
            self.cache.purge_interval_seconds = Some(seconds);
        }
        if let Some(capacity) = overrides.hub_subscriber_capacity {
            self.hub.subscriber_capacity = Some(capacity);
        }
        if let Some(seconds) = overrides.hub_heartbeat_seconds {
            self.hub.heartbeat_seconds = Some(seconds);
        }
        if let Some(capacity) = overrides.scan_log_capacity {
            self.scan_log.capacity = Some(capacity);
        }
        if let Some(path) = overrides.directory_seed_file.as_ref() {
            self.directory.seed_file = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cache,
            hub,
            directory,
            scan_log,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            hub: build_hub_settings(hub)?,
            directory: build_directory_settings(directory)?,
            scan_log: build_scan_log_settings(scan_log)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    let graceful_shutdown = positive_seconds(graceful_secs, "server.graceful_shutdown_seconds")?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let defaults = CacheConfig::default();
    let capacity = non_zero_usize(
        cache.capacity.unwrap_or(defaults.capacity as u64),
        "cache.capacity",
    )?;
    let ttl = positive_seconds(
        cache.ttl_seconds.unwrap_or(defaults.ttl_seconds),
        "cache.ttl_seconds",
    )?;
    let purge_seconds = cache
        .purge_interval_seconds
        .unwrap_or(defaults.purge_interval_seconds);

    Ok(CacheSettings {
        capacity,
        ttl,
        purge_interval: (purge_seconds > 0).then(|| Duration::from_secs(purge_seconds)),
    })
}

fn build_hub_settings(hub: RawHubSettings) -> Result<HubSettings, LoadError> {
    let defaults = HubConfig::default();
    Ok(HubSettings {
        register_capacity: non_zero_usize(
            hub.register_capacity
                .unwrap_or(defaults.register_capacity as u64),
            "hub.register_capacity",
        )?,
        unregister_capacity: non_zero_usize(
            hub.unregister_capacity
                .unwrap_or(defaults.unregister_capacity as u64),
            "hub.unregister_capacity",
        )?,
        publish_capacity: non_zero_usize(
            hub.publish_capacity
                .unwrap_or(defaults.publish_capacity as u64),
            "hub.publish_capacity",
        )?,
        subscriber_capacity: non_zero_usize(
            hub.subscriber_capacity
                .unwrap_or(defaults.subscriber_capacity as u64),
            "hub.subscriber_capacity",
        )?,
        housekeeping_interval: positive_seconds(
            hub.housekeeping_seconds
                .unwrap_or(defaults.housekeeping_interval.as_secs()),
            "hub.housekeeping_seconds",
        )?,
        heartbeat_interval: positive_seconds(
            hub.heartbeat_seconds
                .unwrap_or(defaults.heartbeat_interval.as_secs()),
            "hub.heartbeat_seconds",
        )?,
    })
}

fn build_scan_log_settings(scan_log: RawScanLogSettings) -> Result<ScanLogSettings, LoadError> {
    Ok(ScanLogSettings {
        capacity: non_zero_usize(
            scan_log.capacity.unwrap_or(DEFAULT_SCAN_LOG_CAPACITY),
            "scan_log.capacity",
        )?,
    })
}

fn build_directory_settings(
    directory: RawDirectorySettings,
) -> Result<DirectorySettings, LoadError> {
    let seed_file = directory
        .seed_file
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SEED_FILE));
    if seed_file.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "directory.seed_file",
            "path must not be empty",
        ));
    }

    Ok(DirectorySettings { seed_file })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    capacity: Option<u64>,
    ttl_seconds: Option<u64>,
    purge_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawHubSettings {
    register_capacity: Option<u64>,
    unregister_capacity: Option<u64>,
    publish_capacity: Option<u64>,
    subscriber_capacity: Option<u64>,
    housekeeping_seconds: Option<u64>,
    heartbeat_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDirectorySettings {
    seed_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawScanLogSettings {
    capacity: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn positive_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}
