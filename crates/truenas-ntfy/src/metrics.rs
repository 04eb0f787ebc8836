use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, IntCounter,
    IntGauge, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref ALERTS_FETCHED_TOTAL: IntCounter = register_int_counter_with_registry!(
        "truenas_ntfy_alerts_fetched_total",
        "Alerts returned by the TrueNAS alert list.",
        REGISTRY
    )
    .unwrap();
    pub static ref ALERTS_IN_SCOPE_TOTAL: IntCounter = register_int_counter_with_registry!(
        "truenas_ntfy_alerts_in_scope_total",
        "Alerts inside the look-back window.",
        REGISTRY
    )
    .unwrap();
    pub static ref NOTIFICATIONS_SENT_TOTAL: IntCounter = register_int_counter_with_registry!(
        "truenas_ntfy_notifications_sent_total",
        "Notifications accepted by the sink.",
        REGISTRY
    )
    .unwrap();
    pub static ref NOTIFICATIONS_FAILED_TOTAL: IntCounter = register_int_counter_with_registry!(
        "truenas_ntfy_notifications_failed_total",
        "Notifications the sink rejected or could not be reached for.",
        REGISTRY
    )
    .unwrap();
    pub static ref FETCH_FAILURES_TOTAL: IntCounter = register_int_counter_with_registry!(
        "truenas_ntfy_fetch_failures_total",
        "Runs that ended because the alert list could not be fetched.",
        REGISTRY
    )
    .unwrap();
    pub static ref LAST_RUN_TIMESTAMP: IntGauge = register_int_gauge_with_registry!(
        "truenas_ntfy_last_run_timestamp_seconds",
        "Unix time the last run started.",
        REGISTRY
    )
    .unwrap();
}

/// Force registration so every metric shows up even before it is touched.
pub fn register_metrics() {
    lazy_static::initialize(&ALERTS_FETCHED_TOTAL);
    lazy_static::initialize(&ALERTS_IN_SCOPE_TOTAL);
    lazy_static::initialize(&NOTIFICATIONS_SENT_TOTAL);
    lazy_static::initialize(&NOTIFICATIONS_FAILED_TOTAL);
    lazy_static::initialize(&FETCH_FAILURES_TOTAL);
    lazy_static::initialize(&LAST_RUN_TIMESTAMP);
}

pub fn gather_metrics() -> crate::Result<String> {
    register_metrics();

    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| crate::Error::Internal(e.to_string()))
}

/// Write the exposition for node_exporter's textfile collector.
///
/// The file is written next to `path` and renamed into place so the collector
/// never reads a partial file.
pub fn write_textfile(path: &Path) -> crate::Result<()> {
    let contents = gather_metrics()?;
    let tmp = path.with_extension("prom.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
