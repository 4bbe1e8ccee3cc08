//! Periodic HTTP health polling for a set of registered services.
//!
//! Services live in a [`DeadlineStore`], a min-heap keyed on each service's
//! last check time. The [`Scheduler`] wakes every tick, pops every service
//! whose last check is older than the poll interval and hands it to the
//! [`Dispatcher`], which probes the URL and writes the new status back.
//!
//! A service is never probed twice at the same time: it leaves the heap when
//! dispatched and only returns once its result has been recorded.
//!
//! # Example
//!
//! ```no_run
//! use poller::{
//!     DeadlineStore, Dispatcher, HttpProber, PollerConfig, Scheduler, StoreHandle, SystemClock,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PollerConfig::default();
//! let store = StoreHandle::new(DeadlineStore::new(config.poll_interval));
//! store.add("bing", "https://www.bing.com").await;
//!
//! let clock = Arc::new(SystemClock);
//! let prober = Arc::new(HttpProber::from_config(&config)?);
//! let dispatcher = Dispatcher::new(store.clone(), prober, clock.clone(), None);
//!
//! let scheduler = Scheduler::new(store.clone(), dispatcher, clock, config.tick_interval, None);
//! let handle = scheduler.start();
//!
//! // Later
//! scheduler.stop();
//! handle.await?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod dispatcher;
pub mod metrics;
pub mod probe;
pub mod scheduler;
pub mod store;
pub mod timestamp;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::Dispatcher;
pub use metrics::MetricsRegistry;
pub use probe::{HttpProber, Prober};
pub use scheduler::Scheduler;
pub use store::{DeadlineStore, StoreHandle};
pub use types::{PollerConfig, ProbeOutcome, ProbeResult, Service, ServiceId, ServiceList, Status};
