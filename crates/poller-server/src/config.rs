//! Configuration loading and validation for the poller server

use crate::types::{DEFAULT_WEB_ROOT, ServerConfig};
use poller::PollerConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Environment variable pointing at an explicit configuration file
pub const CONFIG_ENV: &str = "POLLER_CONFIG";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub poller: PollerSettings,

    #[serde(default)]
    pub persistence: PersistenceSettings,

    #[serde(default)]
    pub metrics: MetricsSettings,

    #[serde(default)]
    pub telemetry: TelemetrySettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        self.server.validate()?;
        self.poller.validate()?;
        self.persistence.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerSettings {
    #[validate(custom = "validate_listen_addr")]
    pub listen_addr: String,

    /// Directory served for paths that match no API route
    pub web_root: Option<PathBuf>,
}

/// Scheduling and probe settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PollerSettings {
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_poll_interval")]
    pub poll_interval: Duration,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_tick_interval")]
    pub tick_interval: Duration,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_probe_timeout")]
    pub probe_timeout: Duration,

    #[validate(range(max = 20))]
    pub max_redirects: usize,
}

/// Service file settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PersistenceSettings {
    #[validate(custom = "validate_persistence_path")]
    pub path: PathBuf,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_save_interval")]
    pub save_interval: Duration,
}

/// Prometheus metrics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
}

/// OpenTelemetry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    pub enabled: bool,
    pub service_name: String,
    pub otlp_endpoint: String,
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: Option<String>,

    /// "text" or "json"
    #[validate(custom = "validate_log_format")]
    pub format: Option<String>,
}

// Default implementations

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            web_root: Some(PathBuf::from(DEFAULT_WEB_ROOT)),
        }
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        let defaults = PollerConfig::default();
        Self {
            poll_interval: defaults.poll_interval,
            tick_interval: defaults.tick_interval,
            probe_timeout: defaults.probe_timeout,
            max_redirects: defaults.max_redirects,
        }
    }
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("services.json"),
            save_interval: Duration::from_secs(60),
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            service_name: "poller-server".to_string(),
            otlp_endpoint: "http://localhost:4317".to_string(),
        }
    }
}

// Custom validators

fn validate_listen_addr(addr: &str) -> Result<(), ValidationError> {
    addr.trim()
        .parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("listen_addr_invalid"))
}

// Last checks are stored at minute resolution
fn validate_poll_interval(interval: &Duration) -> Result<(), ValidationError> {
    let secs = interval.as_secs();
    if secs < 60 || secs > 86_400 {
        return Err(ValidationError::new("poll_interval_out_of_range"));
    }
    if secs % 60 != 0 || interval.subsec_nanos() != 0 {
        return Err(ValidationError::new("poll_interval_not_whole_minutes"));
    }
    Ok(())
}

fn validate_tick_interval(interval: &Duration) -> Result<(), ValidationError> {
    let millis = interval.as_millis();
    if millis < 10 || millis > 60_000 {
        return Err(ValidationError::new("tick_interval_out_of_range"));
    }
    Ok(())
}

fn validate_probe_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    let millis = timeout.as_millis();
    if millis < 100 || millis > 60_000 {
        return Err(ValidationError::new("probe_timeout_out_of_range"));
    }
    Ok(())
}

fn validate_persistence_path(path: &Path) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() || path.file_name().is_none() {
        return Err(ValidationError::new("persistence_path_invalid"));
    }
    Ok(())
}

fn validate_save_interval(interval: &Duration) -> Result<(), ValidationError> {
    let secs = interval.as_secs();
    if secs < 1 || secs > 3_600 {
        return Err(ValidationError::new("save_interval_out_of_range"));
    }
    Ok(())
}

fn validate_log_format(format: &str) -> Result<(), ValidationError> {
    match format {
        "text" | "json" => Ok(()),
        _ => Err(ValidationError::new("log_format_unknown")),
    }
}

// Configuration loading implementation

impl Config {
    /// Load configuration from default search paths
    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if !path.is_file() {
                return Err(ConfigError::FileNotFound(path));
            }
            return Self::load_from_file(&path);
        }

        match Self::find_config_file() {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/poller/poller.yaml")];

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./poller.yaml"));

        paths.into_iter().find(|p| p.is_file())
    }

    /// Get home directory config path
    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/poller/poller.yaml"))
    }

    /// Log level, defaulting to "info"
    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or("info")
    }

    /// Whether logs should be emitted as JSON
    pub fn json_logs(&self) -> bool {
        self.logging.format.as_deref() == Some("json")
    }

    /// Convert to the runtime ServerConfig
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            listen_addr: self.server.listen_addr.trim().to_string(),
            web_root: self.server.web_root.clone(),
            poller: PollerConfig {
                poll_interval: self.poller.poll_interval,
                tick_interval: self.poller.tick_interval,
                probe_timeout: self.poller.probe_timeout,
                max_redirects: self.poller.max_redirects,
            },
            persistence_path: self.persistence.path.clone(),
            save_interval: self.persistence.save_interval,
            metrics_enabled: self.metrics.enabled,
        }
    }
}
