//! Poller Server
//!
//! Hosts the `poller` scheduler behind a small REST API and keeps the
//! registered services on disk between restarts.
//!
//! # Components
//!
//! - **API**: `GET/POST /service`, `DELETE /service/:id`, `GET /metrics` and
//!   the browser UI from `webroot/`
//! - **Persistence**: JSON service file loaded at startup and saved
//!   periodically
//! - **Telemetry**: `tracing` subscriber with optional OTLP export

pub mod api;
pub mod config;
pub mod persistence;
pub mod server;
pub mod telemetry;
pub mod types;

pub use api::{ApiError, ApiState};
pub use config::{Config, ConfigError};
pub use persistence::{PeriodicSaver, ServiceFile};
pub use server::PollerServer;
pub use telemetry::{TelemetryGuard, setup_tracing};
pub use types::{AddServiceRequest, AddServiceResponse, DEFAULT_WEB_ROOT, ServerConfig};
