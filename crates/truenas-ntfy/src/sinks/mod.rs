pub mod ntfy;
pub mod stdout;

use async_trait::async_trait;
use thiserror::Error;

pub use ntfy::{NtfyAction, NtfyClient, NtfyMessage, NtfyResponse};
pub use stdout::StdoutSink;

/// Errors raised while delivering a single notification.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("request to notification endpoint failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("notification endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode notification acknowledgement: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("could not encode notification: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("could not write notification: {0}")]
    Write(#[source] std::io::Error),
}

/// Where composed notifications are delivered. One attempt per call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, message: &NtfyMessage) -> Result<(), DispatchError>;
}
