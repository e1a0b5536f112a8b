//! Command line flags
//!
//! Every flag can also be set through its environment variable. Flags and
//! environment override the config file, which overrides the defaults.

use clap::Parser;
use std::path::PathBuf;

use crate::config::{ConfigError, ExporterConfig};
use crate::observability::LogFormat;
use crate::script::StringValuePolicy;

#[derive(Debug, Parser)]
#[command(
    name = "redis-script-exporter",
    version,
    about = "Exports the results of Redis Lua scripts as Prometheus metrics"
)]
pub struct Cli {
    /// TOML config file
    #[arg(long, short = 'c', env = "REDIS_EXPORTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Redis URL or host:port
    #[arg(long = "redis.addr", env = "REDIS_ADDR")]
    pub redis_addr: Option<String>,

    /// Connect, read and write timeout in milliseconds
    #[arg(long = "connection-timeout-ms", env = "REDIS_EXPORTER_CONNECTION_TIMEOUT_MS")]
    pub connection_timeout_ms: Option<u64>,

    /// Address to listen on for the exposition endpoint
    #[arg(long = "web.listen-address", env = "REDIS_EXPORTER_WEB_LISTEN_ADDRESS")]
    pub listen_address: Option<String>,

    /// Path serving the metrics
    #[arg(long = "web.telemetry-path", env = "REDIS_EXPORTER_WEB_TELEMETRY_PATH")]
    pub telemetry_path: Option<String>,

    /// Prefix of exported metric names
    #[arg(long, env = "REDIS_EXPORTER_NAMESPACE")]
    pub namespace: Option<String>,

    /// Lua script to evaluate on every scrape; repeat or comma-separate
    #[arg(long = "script", env = "REDIS_EXPORTER_SCRIPT", value_delimiter = ',')]
    pub scripts: Vec<PathBuf>,

    /// Drop values that are neither numeric nor boolean
    #[arg(long, env = "REDIS_EXPORTER_SUPPRESS_STRING_VALUES")]
    pub suppress_string_values: bool,

    /// Log output format: text or json
    #[arg(long = "log-format", env = "REDIS_EXPORTER_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    /// Log filter, e.g. `info` or `script_exporter=debug`
    #[arg(long = "log-level", env = "REDIS_EXPORTER_LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Resolve the final configuration and validate it.
    pub fn into_config(self) -> Result<ExporterConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ExporterConfig::from_file(path)?,
            None => ExporterConfig::default(),
        };

        if let Some(addr) = self.redis_addr {
            config.redis.url = addr;
        }
        if let Some(timeout) = self.connection_timeout_ms {
            config.redis.connection_timeout_ms = timeout;
        }
        if let Some(addr) = self.listen_address {
            config.listen_addr = addr;
        }
        if let Some(path) = self.telemetry_path {
            config.metrics_path = path;
        }
        if let Some(namespace) = self.namespace {
            config.namespace = namespace;
        }
        if !self.scripts.is_empty() {
            config.scripts = self.scripts;
        }
        if self.suppress_string_values {
            config.string_values = StringValuePolicy::Suppress;
        }
        if let Some(format) = self.log_format {
            config.log.format = format;
        }
        if let Some(level) = self.log_level {
            config.log.level = level;
        }

        config.validate()?;
        Ok(config)
    }
}
