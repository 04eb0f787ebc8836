//! ntfy publisher
//!
//! Publishes JSON messages to the root of an ntfy server
//! (see <https://docs.ntfy.sh/publish/#publish-as-json>).

use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DispatchError, NotificationSink};
use crate::truncate_body;

const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NtfyMessage {
    pub topic: String,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// 0 means "let the server decide" and is left off the wire.
    #[serde(default, skip_serializing_if = "is_unset")]
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<NtfyAction>,
}

fn is_unset(priority: &u8) -> bool {
    *priority == 0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NtfyAction {
    pub action: String,
    pub label: String,
    pub url: String,
}

impl NtfyAction {
    pub fn view(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            action: "View".to_string(),
            label: label.into(),
            url: url.into(),
        }
    }
}

/// Acknowledgement returned by ntfy for a published message.
#[derive(Debug, Clone, Deserialize)]
pub struct NtfyResponse {
    pub id: String,
    pub time: i64,
    pub topic: String,
    #[serde(default)]
    pub expires: Option<i64>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Clone)]
pub struct NtfyClient {
    client: Client,
    url: String,
    token: Option<String>,
}

impl fmt::Debug for NtfyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NtfyClient")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl NtfyClient {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every publish.
    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    pub async fn publish(&self, message: &NtfyMessage) -> Result<NtfyResponse, DispatchError> {
        let mut request = self.client.post(&self.url).json(message);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(DispatchError::Transport)?;
        let status = response.status();
        let body = response.text().await.map_err(DispatchError::Transport)?;

        if status != StatusCode::OK {
            return Err(DispatchError::Status {
                status: status.as_u16(),
                body: truncate_body(body, MAX_ERROR_BODY),
            });
        }

        serde_json::from_str(&body).map_err(DispatchError::Decode)
    }
}

#[async_trait]
impl NotificationSink for NtfyClient {
    fn name(&self) -> &'static str {
        "ntfy"
    }

    async fn send(&self, message: &NtfyMessage) -> Result<(), DispatchError> {
        let ack = self.publish(message).await?;
        debug!(id = %ack.id, topic = %ack.topic, time = ack.time, "ntfy accepted notification");
        Ok(())
    }
}
