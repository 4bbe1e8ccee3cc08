//! Types for the poller server and its REST API.

use poller::{PollerConfig, ServiceId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Bundled browser UI shipped with this crate
pub const DEFAULT_WEB_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/webroot");

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the REST API listens on
    pub listen_addr: String,

    /// Static asset directory, served for unmatched paths
    pub web_root: Option<PathBuf>,

    /// Scheduler and probe settings
    pub poller: PollerConfig,

    /// Location of the service file
    pub persistence_path: PathBuf,

    /// Interval between service file saves
    pub save_interval: Duration,

    /// Expose Prometheus metrics on /metrics
    pub metrics_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            web_root: Some(PathBuf::from(DEFAULT_WEB_ROOT)),
            poller: PollerConfig::default(),
            persistence_path: PathBuf::from("services.json"),
            save_interval: Duration::from_secs(60),
            metrics_enabled: true,
        }
    }
}

/// Body of `POST /service`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AddServiceRequest {
    #[validate(custom = "validate_service_name")]
    pub name: String,

    #[validate(custom = "validate_service_url")]
    pub url: String,
}

/// Response of `POST /service`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddServiceResponse {
    pub id: ServiceId,
}

fn validate_service_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::new("name_empty"));
    }
    Ok(())
}

fn validate_service_url(url: &str) -> Result<(), ValidationError> {
    let parsed = reqwest::Url::parse(url.trim()).map_err(|_| ValidationError::new("url_invalid"))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ValidationError::new("url_scheme_unsupported"));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ValidationError::new("url_host_missing"));
    }
    Ok(())
}
