//! Scheduler loop driving the deadline store.

use crate::clock::Clock;
use crate::dispatcher::Dispatcher;
use crate::metrics::MetricsRegistry;
use crate::store::StoreHandle;
use crate::timestamp;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

/// Periodically hands every due service to the dispatcher
#[derive(Clone)]
pub struct Scheduler {
    store: StoreHandle,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
    metrics: Option<Arc<MetricsRegistry>>,
    stop_signal: Arc<Notify>,
}

impl Scheduler {
    pub fn new(
        store: StoreHandle,
        dispatcher: Dispatcher,
        clock: Arc<dyn Clock>,
        tick_interval: Duration,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            clock,
            tick_interval,
            metrics,
            stop_signal: Arc::new(Notify::new()),
        }
    }

    /// Dispatch every service that is due now.
    ///
    /// Returns the handles of the probes started by this tick without
    /// waiting for them.
    pub async fn tick(&self) -> Vec<JoinHandle<()>> {
        let start = Instant::now();
        let now = self.clock.now();

        let due = self.store.pop_all_due(now).await;
        let mut handles = Vec::with_capacity(due.len());

        for service in due {
            info!(
                id = %service.id,
                url = %service.url,
                last_check = %timestamp::format(service.last_check),
                "Deadline passed, checking service"
            );
            handles.push(self.dispatcher.check(service));
        }

        if let Some(ref m) = self.metrics {
            let (tracked, in_flight) = self.store.counts().await;
            m.update_service_counts(tracked, in_flight);
            m.record_tick(handles.len(), start.elapsed());
        }

        if !handles.is_empty() {
            debug!(dispatched = handles.len(), "Tick finished");
        }
        handles
    }

    /// Start the tick loop in the background
    pub fn start(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run().await })
    }

    /// Stop the tick loop. Probes already in flight still complete.
    pub fn stop(&self) {
        self.stop_signal.notify_one();
    }

    async fn run(&self) {
        info!(tick_interval = ?self.tick_interval, "Scheduler started");

        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = self.stop_signal.notified() => {
                    info!("Scheduler stopping");
                    break;
                }
            }
        }
    }
}
