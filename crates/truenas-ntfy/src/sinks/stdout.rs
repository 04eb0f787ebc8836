use std::io::Write;

use async_trait::async_trait;

use super::{DispatchError, NotificationSink, NtfyMessage};

/// Prints notifications as JSON instead of delivering them. Used by `--dry-run`.
#[derive(Debug, Default)]
pub struct StdoutSink {
    pretty: bool,
}

impl StdoutSink {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    pub fn render(&self, message: &NtfyMessage) -> Result<String, DispatchError> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(message)
        } else {
            serde_json::to_string(message)
        };
        rendered.map_err(DispatchError::Encode)
    }

    fn write_to<W: Write>(
        &self,
        out: &mut W,
        message: &NtfyMessage,
    ) -> Result<(), DispatchError> {
        let line = self.render(message)?;
        writeln!(out, "{}", line).map_err(DispatchError::Write)
    }
}

#[async_trait]
impl NotificationSink for StdoutSink {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn send(&self, message: &NtfyMessage) -> Result<(), DispatchError> {
        self.write_to(&mut std::io::stdout().lock(), message)
    }
}
