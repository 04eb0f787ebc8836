use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::compose::NotificationComposer;
use crate::config::Config;
use crate::metrics;
use crate::sinks::{NotificationSink, NtfyClient};
use crate::sources::{AlertSource, FetchError, TimeWindow, TrueNasClient};

/// Outcome of one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub in_scope: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Fetch → compose → dispatch, one alert at a time.
pub struct Relay {
    source: Arc<dyn AlertSource>,
    sink: Arc<dyn NotificationSink>,
    composer: NotificationComposer,
}

impl Relay {
    pub fn new(
        source: Arc<dyn AlertSource>,
        sink: Arc<dyn NotificationSink>,
        composer: NotificationComposer,
    ) -> Self {
        Self {
            source,
            sink,
            composer,
        }
    }

    /// TrueNAS in, ntfy out. Both share one HTTP client.
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let client = config.http.client()?;

        let mut ntfy = NtfyClient::new(client.clone(), config.ntfy.url.clone());
        if let Some(token) = &config.ntfy.token {
            ntfy = ntfy.with_token(token.clone());
        }

        Ok(Self::assemble(config, client, Arc::new(ntfy)))
    }

    /// TrueNAS in, `sink` out.
    pub fn with_sink(config: &Config, sink: Arc<dyn NotificationSink>) -> crate::Result<Self> {
        let client = config.http.client()?;
        Ok(Self::assemble(config, client, sink))
    }

    fn assemble(
        config: &Config,
        client: reqwest::Client,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let source = TrueNasClient::new(
            client,
            config.truenas.url.clone(),
            config.truenas.api_key.clone(),
        );
        let composer =
            NotificationComposer::new(config.ntfy.topic.clone(), config.truenas.url.clone());

        Self::new(Arc::new(source), sink, composer)
    }

    /// Process every in-scope alert once.
    ///
    /// A fetch failure ends the run. A failed dispatch is logged and counted,
    /// and the remaining alerts are still processed.
    pub async fn run(&self, window: TimeWindow) -> Result<RunReport, FetchError> {
        info!(
            source = self.source.name(),
            cutoff_ms = window.cutoff_millis(),
            "Fetching alerts"
        );
        metrics::LAST_RUN_TIMESTAMP.set(Utc::now().timestamp());
        let alerts = match self.source.fetch(&window).await {
            Ok(alerts) => alerts,
            Err(e) => {
                metrics::FETCH_FAILURES_TOTAL.inc();
                return Err(e);
            }
        };

        info!("Found {} alerts", alerts.len());

        let mut report = RunReport {
            in_scope: alerts.len(),
            ..RunReport::default()
        };

        for alert in &alerts {
            let message = self.composer.compose(alert);

            match self.sink.send(&message).await {
                Ok(()) => {
                    report.delivered += 1;
                    metrics::NOTIFICATIONS_SENT_TOTAL.inc();
                    info!(
                        alert_id = alert.identifier(),
                        title = %message.title,
                        priority = message.priority,
                        sink = self.sink.name(),
                        "Notification sent"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    metrics::NOTIFICATIONS_FAILED_TOTAL.inc();
                    error!(
                        alert_id = alert.identifier(),
                        title = %message.title,
                        sink = self.sink.name(),
                        error = %e,
                        "Failed to send notification"
                    );
                }
            }
        }

        Ok(report)
    }
}

/// One run against the configured endpoints, cut off at now minus the look-back.
pub async fn run(config: &Config) -> crate::Result<RunReport> {
    run_with_sink(config, None).await
}

/// Like [`run`], publishing to `sink` instead of ntfy when one is given.
pub async fn run_with_sink(
    config: &Config,
    sink: Option<Arc<dyn NotificationSink>>,
) -> crate::Result<RunReport> {
    let relay = match sink {
        Some(sink) => Relay::with_sink(config, sink)?,
        None => Relay::from_config(config)?,
    };
    let window = TimeWindow::ending_at(Utc::now(), config.lookback);
    Ok(relay.run(window).await?)
}
