//! TrueNAS alert source
//!
//! Reads `GET /api/v2.0/alert/list` from the TrueNAS REST API using an API key.

use std::fmt;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AlertSource, FetchError, TimeWindow};
use crate::{metrics, truncate_body};

const ALERT_LIST_PATH: &str = "/api/v2.0/alert/list";

/// Longest response body kept in a [`FetchError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Timestamps in the TrueNAS API are wrapped as `{"$date": <epoch ms>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochMillis {
    #[serde(rename = "$date")]
    pub date: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrueNasAlert {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub klass: String,
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub key: String,
    pub datetime: EpochMillis,
    pub last_occurrence: EpochMillis,
    pub dismissed: bool,
    #[serde(default)]
    pub text: String,
    pub level: String,
    pub formatted: String,
    #[serde(default)]
    pub one_shot: bool,
}

impl TrueNasAlert {
    /// Identifier for logs: `uuid`, or `id` on systems that leave it empty.
    pub fn identifier(&self) -> &str {
        if self.uuid.is_empty() {
            &self.id
        } else {
            &self.uuid
        }
    }

    pub fn created_at_millis(&self) -> i64 {
        self.datetime.date
    }

    pub fn last_occurrence_millis(&self) -> i64 {
        self.last_occurrence.date
    }
}

#[derive(Clone)]
pub struct TrueNasClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for TrueNasClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrueNasClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl TrueNasClient {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            api_key: api_key.into(),
        }
    }

    pub fn alert_list_url(&self) -> String {
        format!("{}{}", self.base_url, ALERT_LIST_PATH)
    }

    /// Every alert TrueNAS currently reports, unfiltered.
    pub async fn list_alerts(&self) -> Result<Vec<TrueNasAlert>, FetchError> {
        let url = self.alert_list_url();
        debug!(url = %url, "Requesting TrueNAS alert list");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(FetchError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(FetchError::Transport)?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: truncate_body(body, MAX_ERROR_BODY),
            });
        }

        serde_json::from_str(&body).map_err(FetchError::Decode)
    }
}

#[async_trait]
impl AlertSource for TrueNasClient {
    fn name(&self) -> &'static str {
        "truenas"
    }

    async fn fetch(&self, window: &TimeWindow) -> Result<Vec<TrueNasAlert>, FetchError> {
        let alerts = self.list_alerts().await?;
        let total = alerts.len();
        metrics::ALERTS_FETCHED_TOTAL.inc_by(total as u64);

        let in_scope = window.filter(alerts);
        metrics::ALERTS_IN_SCOPE_TOTAL.inc_by(in_scope.len() as u64);

        debug!(
            total,
            in_scope = in_scope.len(),
            cutoff_ms = window.cutoff_millis(),
            "Filtered TrueNAS alerts"
        );
        Ok(in_scope)
    }
}
