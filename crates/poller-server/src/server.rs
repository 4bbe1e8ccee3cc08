//! Main poller server implementation.

use crate::api::{self, ApiState};
use crate::persistence::{self, PeriodicSaver, ServiceFile};
use crate::types::ServerConfig;
use anyhow::Context;
use poller::{
    Clock, DeadlineStore, Dispatcher, HttpProber, MetricsRegistry, Prober, Scheduler,
    StoreHandle, SystemClock,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Poller server
pub struct PollerServer {
    config: ServerConfig,
}

impl PollerServer {
    /// Create a new poller server
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Run the server until Ctrl-C
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run the server until `shutdown` completes.
    ///
    /// On shutdown the scheduler stops dispatching and the store is saved
    /// one last time.
    pub async fn run_until<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Starting poller server");

        let metrics = if self.config.metrics_enabled {
            info!("Metrics enabled on {}/metrics", self.config.listen_addr);
            Some(Arc::new(MetricsRegistry::new()))
        } else {
            info!("Metrics disabled");
            None
        };

        let store = StoreHandle::new(DeadlineStore::new(self.config.poller.poll_interval));
        let file = ServiceFile::new(&self.config.persistence_path);
        persistence::load_or_seed(&file, &store, metrics.as_deref()).await;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let prober = HttpProber::from_config(&self.config.poller)
            .context("failed to build HTTP prober")?;
        info!(
            prober = prober.name(),
            timeout = ?self.config.poller.probe_timeout,
            poll_interval = ?self.config.poller.poll_interval,
            "Probe settings"
        );
        let dispatcher = Dispatcher::new(
            store.clone(),
            Arc::new(prober),
            clock.clone(),
            metrics.clone(),
        );
        let scheduler = Scheduler::new(
            store.clone(),
            dispatcher,
            clock,
            self.config.poller.tick_interval,
            metrics.clone(),
        );
        let saver = PeriodicSaver::new(
            file,
            store.clone(),
            self.config.save_interval,
            metrics.clone(),
        );

        let listener = TcpListener::bind(&self.config.listen_addr)
            .await
            .with_context(|| format!("failed to bind {}", self.config.listen_addr))?;
        info!(listen_addr = %listener.local_addr()?, "API server listening");

        if let Some(root) = &self.config.web_root {
            if root.is_dir() {
                info!(web_root = %root.display(), "Serving web UI");
            } else {
                warn!(web_root = %root.display(), "Web root is not a directory, UI will not be served");
            }
        }

        let app = api::router(
            ApiState::new(store.clone(), metrics),
            self.config.web_root.as_deref(),
        );

        let scheduler_handle = scheduler.start();
        let saver_handle = saver.start();

        info!("All tasks spawned, server running");

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        scheduler.stop();
        saver.stop();
        let _ = scheduler_handle.await;
        let _ = saver_handle.await;

        if let Err(e) = saver.save_now().await {
            warn!(error = %e, "Failed to save services on shutdown");
        }

        served.context("API server error")?;
        info!("Poller server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
