use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::observability::LogFormat;
use crate::script::{Classifier, StringValuePolicy};

/// Error returned when configuration cannot be loaded or is invalid
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read
    Io { path: PathBuf, source: std::io::Error },
    /// Config file is not valid TOML for `ExporterConfig`
    Parse(toml::de::Error),
    /// A value is out of range or inconsistent
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "Failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

/// Connection settings for the Redis server the scripts run against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// `redis://` URL; a bare `host:port` is accepted too
    pub url: String,
    /// Applied to connect, read and write
    pub connection_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            url: "redis://127.0.0.1:6379".to_string(),
            connection_timeout_ms: 15_000,
        }
    }
}

impl RedisConfig {
    /// URL with a `redis://` scheme added when none was given
    pub fn normalized_url(&self) -> String {
        if self.url.contains("://") {
            self.url.clone()
        } else {
            format!("redis://{}", self.url)
        }
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Exporter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Address the HTTP server binds to
    pub listen_addr: String,
    /// Path serving the text exposition
    pub metrics_path: String,
    /// Prefix of every exported family (`<namespace>_script_values`)
    pub namespace: String,
    /// Script files evaluated on every scrape
    pub scripts: Vec<PathBuf>,
    /// Handling of values that are neither numeric nor boolean
    pub string_values: StringValuePolicy,
    /// Keys whose non-numeric values are logged as errors
    pub strict_numeric_keys: Vec<String>,
    pub redis: RedisConfig,
    pub log: LogConfig,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        ExporterConfig {
            listen_addr: "0.0.0.0:9121".to_string(),
            metrics_path: "/metrics".to_string(),
            namespace: "redis".to_string(),
            scripts: Vec::new(),
            string_values: StringValuePolicy::Emit,
            strict_numeric_keys: vec!["weather:skip".to_string()],
            redis: RedisConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl ExporterConfig {
    /// Load from a TOML file; absent fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(ConfigError::Parse)
    }

    /// Add a script file
    pub fn with_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.scripts.push(path.into());
        self
    }

    /// Drop non-numeric, non-boolean values instead of exporting them
    pub fn with_suppressed_string_values(mut self) -> Self {
        self.string_values = StringValuePolicy::Suppress;
        self
    }

    /// Classifier configured from this config
    pub fn classifier(&self) -> Classifier {
        Classifier::new()
            .with_string_values(self.string_values)
            .with_strict_numeric_keys(self.strict_numeric_keys.iter().cloned())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scripts.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one script is required".to_string(),
            ));
        }
        if !self.metrics_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "metrics path '{}' must start with '/'",
                self.metrics_path
            )));
        }
        if self.metrics_path == HEALTH_PATH {
            return Err(ConfigError::Invalid(format!(
                "metrics path cannot be {}",
                HEALTH_PATH
            )));
        }
        self.listen_addr.parse::<SocketAddr>().map_err(|e| {
            ConfigError::Invalid(format!("listen address '{}': {}", self.listen_addr, e))
        })?;
        if !is_valid_namespace(&self.namespace) {
            return Err(ConfigError::Invalid(format!(
                "namespace '{}' is not a valid metric name prefix",
                self.namespace
            )));
        }
        if self.redis.connection_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "connection timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Path of the liveness endpoint
pub const HEALTH_PATH: &str = "/health";

/// Empty, or `[a-zA-Z_][a-zA-Z0-9_]*`.
fn is_valid_namespace(namespace: &str) -> bool {
    let mut chars = namespace.chars();
    match chars.next() {
        None => true,
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
    }
}
