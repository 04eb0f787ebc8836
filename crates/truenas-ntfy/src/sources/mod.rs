pub mod truenas;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use truenas::{TrueNasAlert, TrueNasClient};

/// Errors raised while retrieving alerts. None of them are retried.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to alert source failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("alert source returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode alert list: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Where alerts come from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch the current alerts and keep the ones `window` admits.
    async fn fetch(&self, window: &TimeWindow) -> Result<Vec<TrueNasAlert>, FetchError>;
}

/// The in-scope boundary for a run.
///
/// An alert is in scope when it was created at or before the cutoff, that is
/// when it has been active for at least the look-back duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    cutoff_ms: i64,
}

impl TimeWindow {
    /// Cutoff = `now - lookback`. Saturates to the earliest instant on underflow.
    pub fn ending_at(now: DateTime<Utc>, lookback: Duration) -> Self {
        let cutoff_ms = chrono::Duration::from_std(lookback)
            .ok()
            .and_then(|lookback| now.checked_sub_signed(lookback))
            .map(|cutoff| cutoff.timestamp_millis())
            .unwrap_or(i64::MIN);

        Self { cutoff_ms }
    }

    pub fn from_cutoff_millis(cutoff_ms: i64) -> Self {
        Self { cutoff_ms }
    }

    pub fn cutoff_millis(&self) -> i64 {
        self.cutoff_ms
    }

    pub fn contains(&self, alert: &TrueNasAlert) -> bool {
        alert.created_at_millis() <= self.cutoff_ms
    }

    /// Keep in-scope alerts, preserving their order.
    pub fn filter(&self, alerts: Vec<TrueNasAlert>) -> Vec<TrueNasAlert> {
        alerts.into_iter().filter(|alert| self.contains(alert)).collect()
    }
}
