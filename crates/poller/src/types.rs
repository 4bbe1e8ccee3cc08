//! Service records, probe results and scheduler configuration.

use crate::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Service ID
pub type ServiceId = String;

/// Last known reachability of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Never probed
    Unknown,
    /// Last probe got a 2xx response
    Up,
    /// Last probe got a non-2xx response, timed out or failed
    Down,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Unknown => write!(f, "UNKNOWN"),
            Status::Up => write!(f, "UP"),
            Status::Down => write!(f, "DOWN"),
        }
    }
}

/// A tracked endpoint.
///
/// `id`, `name` and `url` never change after creation. `status` and
/// `last_check` are only written by the dispatcher through
/// [`DeadlineStore::update`](crate::store::DeadlineStore::update).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    pub url: String,
    pub status: Status,
    #[serde(with = "timestamp::serde_minutes")]
    pub last_check: DateTime<Utc>,
}

impl Service {
    /// Create a never-checked service. Its `last_check` is the epoch, so it
    /// is due on the first tick.
    pub fn new(id: impl Into<ServiceId>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            status: Status::Unknown,
            last_check: timestamp::epoch(),
        }
    }
}

/// Wrapper document holding a list of services.
///
/// Shared by the list endpoint and the persistence file:
/// `{"services": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceList {
    pub services: Vec<Service>,
}

/// Outcome of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeOutcome {
    /// Response received with a 2xx status code
    Up,
    /// Response received with any other status code
    Down,
    /// No response within the probe timeout
    Timeout,
    /// Transport failure (DNS, connection refused, TLS, redirect limit)
    Error,
}

impl ProbeOutcome {
    /// The status recorded for this outcome. Everything but a 2xx
    /// response counts as down.
    pub fn status(self) -> Status {
        match self {
            ProbeOutcome::Up => Status::Up,
            ProbeOutcome::Down | ProbeOutcome::Timeout | ProbeOutcome::Error => Status::Down,
        }
    }

    /// Lowercase name used as a metric label.
    pub fn as_label(self) -> &'static str {
        match self {
            ProbeOutcome::Up => "up",
            ProbeOutcome::Down => "down",
            ProbeOutcome::Timeout => "timeout",
            ProbeOutcome::Error => "error",
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Up => write!(f, "UP"),
            ProbeOutcome::Down => write!(f, "DOWN"),
            ProbeOutcome::Timeout => write!(f, "TIMEOUT"),
            ProbeOutcome::Error => write!(f, "ERROR"),
        }
    }
}

/// Probe result
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Outcome of the probe
    pub outcome: ProbeOutcome,

    /// Duration of the probe
    pub duration: Duration,

    /// Optional error message
    pub message: Option<String>,

    /// Response code, when a response was received
    pub response_code: Option<u16>,
}

impl ProbeResult {
    /// Create a result for a 2xx response
    pub fn up(duration: Duration, response_code: u16) -> Self {
        Self {
            outcome: ProbeOutcome::Up,
            duration,
            message: None,
            response_code: Some(response_code),
        }
    }

    /// Create a result for a non-2xx response
    pub fn down(duration: Duration, response_code: u16) -> Self {
        Self {
            outcome: ProbeOutcome::Down,
            duration,
            message: Some(format!("Unexpected status code: {}", response_code)),
            response_code: Some(response_code),
        }
    }

    /// Create a timeout result
    pub fn timeout(duration: Duration) -> Self {
        Self {
            outcome: ProbeOutcome::Timeout,
            duration,
            message: Some("Probe timed out".to_string()),
            response_code: None,
        }
    }

    /// Create a transport error result
    pub fn error(duration: Duration, message: impl Into<String>) -> Self {
        Self {
            outcome: ProbeOutcome::Error,
            duration,
            message: Some(message.into()),
            response_code: None,
        }
    }

    /// Status to record for this result
    pub fn status(&self) -> Status {
        self.outcome.status()
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// A service is due this long after its last check
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// How often the scheduler looks for due services
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,

    /// Timeout for a single probe
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,

    /// Maximum number of redirects followed by a probe
    pub max_redirects: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            tick_interval: Duration::from_secs(1),
            probe_timeout: Duration::from_secs(2),
            max_redirects: 5,
        }
    }
}
