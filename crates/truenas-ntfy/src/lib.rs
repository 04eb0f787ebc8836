//! Forwards TrueNAS alerts to ntfy.
//!
//! A run fetches the alert list from TrueNAS, keeps the alerts that have been
//! active for at least the configured look-back window, composes one ntfy
//! message per alert and publishes them one at a time. A failed publish is
//! logged and does not stop the rest of the run.

pub mod compose;
pub mod config;
pub mod metrics;
pub mod relay;
pub mod severity;
pub mod sinks;
pub mod sources;

use thiserror::Error;

pub use compose::NotificationComposer;
pub use config::{Config, ConfigError};
pub use relay::{Relay, RunReport};
pub use sinks::{DispatchError, NotificationSink, NtfyMessage};
pub use sources::{AlertSource, FetchError, TimeWindow, TrueNasAlert};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Cap an error response body at `max` bytes for logging.
pub(crate) fn truncate_body(mut body: String, max: usize) -> String {
    if body.len() > max {
        let mut end = max;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push_str("...");
    }
    body
}
