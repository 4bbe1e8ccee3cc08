//! Probe implementations.

use crate::types::{PollerConfig, ProbeResult};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Issues a single health probe against a URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe `url` once. Never fails: every failure is folded into the result.
    async fn probe(&self, url: &str) -> ProbeResult;

    /// Short label for logs
    fn name(&self) -> &'static str;
}

/// HTTP GET prober
pub struct HttpProber {
    client: reqwest::Client,
    timeout_duration: Duration,
}

impl HttpProber {
    /// Create a new HTTP prober that follows up to `max_redirects` redirects
    pub fn new(timeout_duration: Duration, max_redirects: usize) -> common::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout_duration)
            .redirect(reqwest::redirect::Policy::limited(max_redirects))
            .user_agent(concat!("poller/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(common::Error::probe)?;

        Ok(Self {
            client,
            timeout_duration,
        })
    }

    pub fn from_config(config: &PollerConfig) -> common::Result<Self> {
        Self::new(config.probe_timeout, config.max_redirects)
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str) -> ProbeResult {
        let start = Instant::now();

        // The outer timeout bounds connection setup even if the client's own
        // timeout never fires.
        match timeout(self.timeout_duration, self.client.get(url).send()).await {
            Ok(Ok(response)) => {
                let duration = start.elapsed();
                let status = response.status();

                if status.is_success() {
                    debug!(url = %url, status = status.as_u16(), duration_ms = duration.as_millis(),
                           "Probe successful");
                    ProbeResult::up(duration, status.as_u16())
                } else {
                    warn!(url = %url, status = status.as_u16(), "Probe failed: unexpected status code");
                    ProbeResult::down(duration, status.as_u16())
                }
            }
            Ok(Err(e)) if e.is_timeout() => {
                let duration = start.elapsed();
                warn!(url = %url, "Probe timed out");
                ProbeResult::timeout(duration)
            }
            Ok(Err(e)) => {
                let duration = start.elapsed();
                warn!(url = %url, error = %e, "Probe failed");
                ProbeResult::error(duration, format!("HTTP request failed: {}", e))
            }
            Err(_) => {
                let duration = start.elapsed();
                warn!(url = %url, "Probe timed out");
                ProbeResult::timeout(duration)
            }
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
