//! Poller server binary

use poller_server::{Config, PollerServer, setup_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first (needed for logging settings)
    let (config, config_error) = match Config::load() {
        Ok(cfg) => (cfg, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let _telemetry_guard = setup_tracing(&config)?;

    if let Some(e) = config_error {
        tracing::warn!(error = %e, "Configuration error, using default configuration");
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Poller server starting");

    PollerServer::new(config.to_server_config()).run().await?;

    // Telemetry guard will flush spans on drop

    Ok(())
}
