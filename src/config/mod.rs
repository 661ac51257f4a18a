//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "quaderno";
const ENV_PREFIX: &str = "QUADERNO";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_FEED_PAGE_SIZE: u32 = 10;
const DEFAULT_SNAPSHOT_TTL_SECONDS: u64 = 20;
const DEFAULT_SESSION_TTL_HOURS: u64 = 24 * 14;
const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Command-line arguments for the quaderno binary.
#[derive(Debug, Parser)]
#[command(name = "quaderno", version, about = "quaderno blog server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "QUADERNO_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the log level (error, warn, info, debug, trace).
    #[arg(long = "log-level", value_name = "LEVEL", value_enum)]
    pub log_level: Option<LogLevel>,

    /// Override the log format (compact, json).
    #[arg(long = "log-format", value_name = "FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Read(#[from] config::ConfigError),
    #[error("invalid listener address `{value}`: {message}")]
    InvalidAddress { value: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerSettings {
    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        let value = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&value).map_err(|err| ConfigError::InvalidAddress {
            value,
            message: err.to_string(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: NonZeroU32::new(DEFAULT_DB_MAX_CONNECTIONS)
                .expect("default max connections is non-zero"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Posts per page across every feed.
    pub page_size: NonZeroU32,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            page_size: NonZeroU32::new(DEFAULT_FEED_PAGE_SIZE)
                .expect("default page size is non-zero"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Snapshot cache kill-switch for the home feed.
    pub enabled: bool,
    /// Seconds a home-feed snapshot stays valid.
    pub index_ttl_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            index_ttl_seconds: DEFAULT_SNAPSHOT_TTL_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub ttl_hours: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_hours: DEFAULT_SESSION_TTL_HOURS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub directory: PathBuf,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_UPLOAD_DIR),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub logging: LoggingSettings,
    pub feed: FeedSettings,
    pub cache: CacheSettings,
    pub sessions: SessionSettings,
    pub uploads: UploadSettings,
}

/// Parse CLI arguments and load settings with file → env → CLI precedence.
pub fn load_with_cli() -> Result<(CliArgs, Settings), ConfigError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

pub fn load(cli: &CliArgs) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = &cli.config_file {
        builder = builder.add_source(File::from(path.clone()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let mut settings: Settings = builder.build()?.try_deserialize()?;

    if let Some(url) = &cli.database_url {
        settings.database.url = Some(url.clone());
    }
    if let Some(host) = &cli.server_host {
        settings.server.host = host.clone();
    }
    if let Some(port) = cli.server_port {
        settings.server.port = port;
    }
    if let Some(level) = cli.log_level {
        settings.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        settings.logging.format = format;
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_cli() -> CliArgs {
        CliArgs::parse_from(["quaderno"])
    }

    #[test]
    fn defaults_cover_the_whole_surface() {
        let settings = load(&bare_cli()).expect("defaults load");
        assert_eq!(settings.server.port, DEFAULT_PORT);
        assert_eq!(settings.feed.page_size.get(), DEFAULT_FEED_PAGE_SIZE);
        assert_eq!(settings.cache.index_ttl_seconds, DEFAULT_SNAPSHOT_TTL_SECONDS);
        assert!(settings.cache.enabled);
        assert!(settings.database.url.is_none());
    }

    #[test]
    fn cli_overrides_win() {
        let cli = CliArgs::parse_from([
            "quaderno",
            "--server-port",
            "4000",
            "--database-url",
            "postgres://localhost/quaderno_test",
            "--log-level",
            "debug",
        ]);
        let settings = load(&cli).expect("overrides load");
        assert_eq!(settings.server.port, 4000);
        assert_eq!(
            settings.database.url.as_deref(),
            Some("postgres://localhost/quaderno_test")
        );
        assert_eq!(settings.logging.level, LogLevel::Debug);
    }

    #[test]
    fn listener_address_parses() {
        let settings = load(&bare_cli()).expect("defaults load");
        let addr = settings.server.addr().expect("valid address");
        assert_eq!(addr.port(), DEFAULT_PORT);
    }
}
