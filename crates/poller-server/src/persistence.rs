//! Service file persistence.
//!
//! The service set is stored as a pretty-printed JSON document
//! (`{"services": [...]}`) and written atomically through a sibling temp
//! file.

use common::{Error, Result};
use poller::{MetricsRegistry, Service, ServiceList, StoreHandle};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

/// Services registered when no service file can be loaded
pub const SEED_SERVICES: [(&str, &str); 4] = [
    ("google-ssl", "https://google.com/"),
    ("google", "http://google.com/"),
    ("Spotify", "http://www.spotify.com"),
    ("Centralway", "http://www.centralway.com"),
];

/// JSON service file on disk
#[derive(Debug, Clone)]
pub struct ServiceFile {
    path: PathBuf,
}

impl ServiceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every service from the file
    pub async fn load(&self) -> Result<Vec<Service>> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let list: ServiceList = serde_json::from_str(&contents)?;
        Ok(list.services)
    }

    /// Replace the file contents with `list`
    pub async fn save(&self, list: &ServiceList) -> Result<()> {
        let json = serde_json::to_string_pretty(list)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.tmp_path()?;
        tokio::fs::write(&tmp, json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    fn tmp_path(&self) -> Result<PathBuf> {
        let name = self.path.file_name().ok_or_else(|| {
            Error::persistence(format!("not a file path: {}", self.path.display()))
        })?;
        let mut tmp = OsString::from(".");
        tmp.push(name);
        tmp.push(".tmp");
        Ok(self.path.with_file_name(tmp))
    }
}

/// Register the default seed services
pub async fn seed(store: &StoreHandle) -> usize {
    for (name, url) in SEED_SERVICES {
        store.add(name, url).await;
    }
    SEED_SERVICES.len()
}

/// Populate `store` from `file`, falling back to the seed set.
///
/// Returns the number of services now in the store.
pub async fn load_or_seed(
    file: &ServiceFile,
    store: &StoreHandle,
    metrics: Option<&MetricsRegistry>,
) -> usize {
    match file.load().await {
        Ok(services) => {
            let count = store.load(services).await;
            info!(path = %file.path().display(), count, "Loaded services");
            count
        }
        Err(Error::Io(e)) if e.kind() == ErrorKind::NotFound => {
            info!(path = %file.path().display(), "No service file, seeding defaults");
            seed(store).await
        }
        Err(e) => {
            error!(path = %file.path().display(), error = %e, "Failed to load services, seeding defaults");
            if let Some(m) = metrics {
                m.record_persistence_error("load");
            }
            seed(store).await
        }
    }
}

/// Periodically writes the store to the service file
#[derive(Clone)]
pub struct PeriodicSaver {
    file: ServiceFile,
    store: StoreHandle,
    save_interval: Duration,
    metrics: Option<Arc<MetricsRegistry>>,
    stop_signal: Arc<Notify>,
}

impl PeriodicSaver {
    pub fn new(
        file: ServiceFile,
        store: StoreHandle,
        save_interval: Duration,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            file,
            store,
            save_interval,
            metrics,
            stop_signal: Arc::new(Notify::new()),
        }
    }

    /// Save the current store contents once
    pub async fn save_now(&self) -> Result<()> {
        let list = self.store.dump().await;
        let count = list.services.len();

        match self.file.save(&list).await {
            Ok(()) => {
                debug!(path = %self.file.path().display(), count, "Saved services");
                if let Some(ref m) = self.metrics {
                    m.record_save();
                }
                Ok(())
            }
            Err(e) => {
                if let Some(ref m) = self.metrics {
                    m.record_persistence_error("save");
                }
                Err(e)
            }
        }
    }

    /// Start the save loop in the background
    pub fn start(&self) -> JoinHandle<()> {
        let saver = self.clone();
        tokio::spawn(async move { saver.run().await })
    }

    /// Stop the save loop
    pub fn stop(&self) {
        self.stop_signal.notify_one();
    }

    async fn run(&self) {
        info!(path = %self.file.path().display(), save_interval = ?self.save_interval, "Periodic saver started");

        let mut ticker = interval_at(Instant::now() + self.save_interval, self.save_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.save_now().await {
                        warn!(path = %self.file.path().display(), error = %e, "Failed to save services");
                    }
                }
                _ = self.stop_signal.notified() => {
                    debug!("Periodic saver stopping");
                    break;
                }
            }
        }
    }
}
