//! Probe dispatch and result handling.

use crate::clock::Clock;
use crate::metrics::MetricsRegistry;
use crate::probe::Prober;
use crate::store::StoreHandle;
use crate::timestamp;
use crate::types::{ProbeOutcome, ProbeResult, Service};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Runs probes for due services and feeds the results back into the store
#[derive(Clone)]
pub struct Dispatcher {
    store: StoreHandle,
    prober: Arc<dyn Prober>,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl Dispatcher {
    pub fn new(
        store: StoreHandle,
        prober: Arc<dyn Prober>,
        clock: Arc<dyn Clock>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            store,
            prober,
            clock,
            metrics,
        }
    }

    /// Start a probe for `service` and return without waiting for it.
    ///
    /// The returned handle completes once the result has been applied to the
    /// store. Dropping it does not cancel the probe.
    pub fn check(&self, service: Service) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.run_check(service).await })
    }

    async fn run_check(&self, service: Service) {
        debug!(id = %service.id, url = %service.url, "Making request");

        // A panicking prober must still reschedule the service, otherwise it
        // would stay in flight forever.
        let prober = self.prober.clone();
        let url = service.url.clone();
        let result = match tokio::spawn(async move { prober.probe(&url).await }).await {
            Ok(result) => result,
            Err(e) => ProbeResult::error(Duration::ZERO, format!("Probe task failed: {}", e)),
        };

        let last_check = timestamp::truncate_to_minute(self.clock.now());
        let status = result.status();

        match result.outcome {
            ProbeOutcome::Up => {
                debug!(
                    id = %service.id,
                    url = %service.url,
                    code = result.response_code,
                    duration_ms = result.duration.as_millis(),
                    "Service is UP"
                );
            }
            ProbeOutcome::Down => {
                warn!(
                    id = %service.id,
                    url = %service.url,
                    code = result.response_code,
                    "Service is DOWN"
                );
            }
            ProbeOutcome::Timeout => {
                warn!(id = %service.id, url = %service.url, "Service is DOWN (timed out)");
            }
            ProbeOutcome::Error => {
                warn!(
                    id = %service.id,
                    url = %service.url,
                    error = result.message.as_deref().unwrap_or("unknown"),
                    "Service is DOWN (request failed)"
                );
            }
        }

        if let Some(ref m) = self.metrics {
            m.record_probe(result.outcome, result.duration);
        }

        if !self.store.update(&service.id, status, last_check).await {
            debug!(id = %service.id, "Service removed while probe was in flight, dropping result");
            if let Some(ref m) = self.metrics {
                m.record_stale_completion();
            }
        }
    }
}
