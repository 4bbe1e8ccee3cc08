//! Prometheus metrics for the poller.

use crate::types::ProbeOutcome;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::time::Duration;

/// Labels for probe result metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ProbeLabels {
    /// Outcome (up, down, timeout, error)
    pub outcome: String,
}

/// Labels for API request metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ApiLabels {
    /// Operation (list, add, delete)
    pub operation: String,
    /// Response status code
    pub code: String,
}

/// Labels for persistence metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PersistenceLabels {
    /// Operation (load, save)
    pub operation: String,
}

/// Metrics registry with all poller metrics
pub struct MetricsRegistry {
    /// Prometheus registry
    pub registry: Registry,

    // Probe metrics
    probes_total: Family<ProbeLabels, Counter>,
    probe_duration_seconds: Histogram,
    stale_completions_total: Counter,

    // Scheduler metrics
    services_tracked: Gauge,
    services_in_flight: Gauge,
    dispatched_total: Counter,
    tick_duration_seconds: Histogram,

    // Collaborator metrics
    api_requests_total: Family<ApiLabels, Counter>,
    persistence_saves_total: Counter,
    persistence_errors_total: Family<PersistenceLabels, Counter>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let probes_total = Family::<ProbeLabels, Counter>::default();
        registry.register(
            "poller_probes",
            "Total probes completed by outcome",
            probes_total.clone(),
        );

        // Exponential buckets from 1ms to ~8s
        let probe_duration_seconds = Histogram::new(exponential_buckets(0.001, 2.0, 14));
        registry.register(
            "poller_probe_duration_seconds",
            "Probe duration in seconds",
            probe_duration_seconds.clone(),
        );

        let stale_completions_total = Counter::default();
        registry.register(
            "poller_stale_completions",
            "Probe results dropped because the service was removed in flight",
            stale_completions_total.clone(),
        );

        let services_tracked = Gauge::default();
        registry.register(
            "poller_services_tracked",
            "Number of tracked services",
            services_tracked.clone(),
        );

        let services_in_flight = Gauge::default();
        registry.register(
            "poller_services_in_flight",
            "Number of services with a probe in flight",
            services_in_flight.clone(),
        );

        let dispatched_total = Counter::default();
        registry.register(
            "poller_dispatched",
            "Total probes dispatched by the scheduler",
            dispatched_total.clone(),
        );

        let tick_duration_seconds = Histogram::new(exponential_buckets(0.0001, 2.0, 12));
        registry.register(
            "poller_tick_duration_seconds",
            "Scheduler tick duration in seconds",
            tick_duration_seconds.clone(),
        );

        let api_requests_total = Family::<ApiLabels, Counter>::default();
        registry.register(
            "poller_api_requests",
            "Total API requests by operation and status code",
            api_requests_total.clone(),
        );

        let persistence_saves_total = Counter::default();
        registry.register(
            "poller_persistence_saves",
            "Total successful saves of the service file",
            persistence_saves_total.clone(),
        );

        let persistence_errors_total = Family::<PersistenceLabels, Counter>::default();
        registry.register(
            "poller_persistence_errors",
            "Total persistence errors by operation",
            persistence_errors_total.clone(),
        );

        Self {
            registry,
            probes_total,
            probe_duration_seconds,
            stale_completions_total,
            services_tracked,
            services_in_flight,
            dispatched_total,
            tick_duration_seconds,
            api_requests_total,
            persistence_saves_total,
            persistence_errors_total,
        }
    }

    /// Record a completed probe
    pub fn record_probe(&self, outcome: ProbeOutcome, duration: Duration) {
        self.probes_total
            .get_or_create(&ProbeLabels {
                outcome: outcome.as_label().to_string(),
            })
            .inc();

        self.probe_duration_seconds.observe(duration.as_secs_f64());
    }

    /// Record a probe result that arrived after its service was removed
    pub fn record_stale_completion(&self) {
        self.stale_completions_total.inc();
    }

    /// Record one scheduler tick
    pub fn record_tick(&self, dispatched: usize, duration: Duration) {
        self.dispatched_total.inc_by(dispatched as u64);
        self.tick_duration_seconds.observe(duration.as_secs_f64());
    }

    /// Update tracked and in-flight gauges
    pub fn update_service_counts(&self, tracked: usize, in_flight: usize) {
        self.services_tracked.set(tracked as i64);
        self.services_in_flight.set(in_flight as i64);
    }

    /// Record an API request
    pub fn record_api_request(&self, operation: &str, code: u16) {
        self.api_requests_total
            .get_or_create(&ApiLabels {
                operation: operation.to_string(),
                code: code.to_string(),
            })
            .inc();
    }

    /// Record a successful save
    pub fn record_save(&self) {
        self.persistence_saves_total.inc();
    }

    /// Record a persistence error
    pub fn record_persistence_error(&self, operation: &str) {
        self.persistence_errors_total
            .get_or_create(&PersistenceLabels {
                operation: operation.to_string(),
            })
            .inc();
    }

    /// Encode all metrics in the Prometheus text format
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
