//! Common utilities and types shared across the poller crates.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
