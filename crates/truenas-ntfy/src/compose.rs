//! Turns a TrueNAS alert into an ntfy message.

use chrono::{DateTime, FixedOffset, Local, Utc};
use tracing::warn;

use crate::severity;
use crate::sinks::{NtfyAction, NtfyMessage};
use crate::sources::TrueNasAlert;

/// Tag attached to every notification next to the severity tag.
pub const DOMAIN_TAG: &str = "TrueNas";

pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

const ACTION_LABEL: &str = "Admin Panel";

/// Markup TrueNAS embeds in `formatted`, replaced in this order.
const MARKUP: [(&str, &str); 4] = [
    ("<ul><li>", "\n"),
    ("</li><li>", "\n"),
    ("</li></ul>", ""),
    ("<br>", "\n"),
];

#[derive(Debug, Clone)]
pub struct NotificationComposer {
    topic: String,
    source_url: String,
    /// `None` renders each instant in the local zone at that instant.
    offset: Option<FixedOffset>,
}

impl NotificationComposer {
    /// Timestamps render in the process's local time zone, daylight saving included.
    pub fn new(topic: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            source_url: source_url.into(),
            offset: None,
        }
    }

    /// Render every timestamp at a fixed offset instead of local time.
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn compose(&self, alert: &TrueNasAlert) -> NtfyMessage {
        let (tag, priority) = severity::map_level(&alert.level);
        if priority == 0 {
            warn!(
                alert_id = alert.identifier(),
                level = %alert.level,
                "Unknown alert level, sending without severity tag or priority"
            );
        }

        let mut tags = Vec::with_capacity(2);
        if !tag.is_empty() {
            tags.push(tag.to_string());
        }
        tags.push(DOMAIN_TAG.to_string());

        NtfyMessage {
            topic: self.topic.clone(),
            title: title(&alert.formatted).to_string(),
            message: self.body(alert),
            tags,
            priority,
            click: Some(self.source_url.clone()),
            actions: vec![NtfyAction::view(ACTION_LABEL, self.source_url.clone())],
        }
    }

    fn body(&self, alert: &TrueNasAlert) -> String {
        format!(
            "Level: {}\nTime: {}\nLast Occurrence: {}\nDismissed: {}\nMessage: {}",
            alert.level,
            self.timestamp(alert.created_at_millis()),
            self.timestamp(alert.last_occurrence_millis()),
            alert.dismissed,
            strip_markup(&alert.formatted),
        )
    }

    fn timestamp(&self, millis: i64) -> String {
        let Some(at) = DateTime::<Utc>::from_timestamp_millis(millis) else {
            return format!("invalid timestamp ({})", millis);
        };
        match self.offset {
            Some(offset) => at.with_timezone(&offset).format(TIMESTAMP_FORMAT).to_string(),
            None => at.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Everything before the first `:`, or the whole message.
pub fn title(formatted: &str) -> &str {
    formatted.split(':').next().unwrap_or(formatted)
}

pub fn strip_markup(formatted: &str) -> String {
    MARKUP
        .iter()
        .fold(formatted.to_string(), |text, (from, to)| text.replace(from, to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Offset;
    use serde_json::json;

    const NAS_URL: &str = "https://nas.local";

    fn composer() -> NotificationComposer {
        NotificationComposer::new("nas-alerts", NAS_URL).with_offset(Utc.fix())
    }

    fn alert(level: &str, formatted: &str) -> TrueNasAlert {
        serde_json::from_value(json!({
            "uuid": "b1d2",
            "level": level,
            "formatted": formatted,
            // 2024-03-10 12:00:00 UTC / 13:30:05 UTC
            "datetime": { "$date": 1_710_072_000_000_i64 },
            "last_occurrence": { "$date": 1_710_077_405_000_i64 },
            "dismissed": false
        }))
        .unwrap()
    }

    #[test]
    fn test_title_before_first_colon() {
        assert_eq!(title("Pool Degraded: details here"), "Pool Degraded");
        assert_eq!(title("a: b: c"), "a");
    }

    #[test]
    fn test_title_without_colon() {
        assert_eq!(title("Scrub of pool tank finished"), "Scrub of pool tank finished");
        assert_eq!(title(""), "");
    }

    #[test]
    fn test_strip_markup() {
        let input = "Pool tank is DEGRADED<br>Devices:<ul><li>sda</li><li>sdb</li></ul>Check cabling";
        let output = strip_markup(input);

        for token in ["<ul>", "<li>", "</li>", "</ul>", "<br>"] {
            assert!(!output.contains(token), "{} left in {:?}", token, output);
        }
        assert_eq!(output, "Pool tank is DEGRADED\nDevices:\nsda\nsdbCheck cabling");
    }

    #[test]
    fn test_strip_markup_plain_text_untouched() {
        assert_eq!(strip_markup("nothing to do"), "nothing to do");
    }

    #[test]
    fn test_compose_payload() {
        let msg = composer().compose(&alert(
            "CRITICAL",
            "Pool tank state is DEGRADED: removed<br>Devices:<ul><li>sda</li></ul>",
        ));

        assert_eq!(msg.topic, "nas-alerts");
        assert_eq!(msg.title, "Pool tank state is DEGRADED");
        assert_eq!(msg.tags, vec!["red_circle", DOMAIN_TAG]);
        assert_eq!(msg.priority, 5);
        assert_eq!(msg.click.as_deref(), Some(NAS_URL));
        assert_eq!(msg.actions, vec![NtfyAction::view("Admin Panel", NAS_URL)]);
        assert_eq!(
            msg.message,
            "Level: CRITICAL\n\
             Time: 2024/03/10 12:00:00\n\
             Last Occurrence: 2024/03/10 13:30:05\n\
             Dismissed: false\n\
             Message: Pool tank state is DEGRADED: removed\nDevices:\nsda"
        );
    }

    #[test]
    fn test_compose_honours_offset() {
        let composer = composer().with_offset(FixedOffset::east_opt(2 * 3600).unwrap());
        let msg = composer.compose(&alert("INFO", "x"));
        assert!(msg.message.contains("Time: 2024/03/10 14:00:00"));
    }

    #[test]
    fn test_compose_is_pure() {
        let composer = composer();
        let alert = alert("WARNING", "Disk sda: SMART test failed<br>see logs");
        let first = serde_json::to_vec(&composer.compose(&alert)).unwrap();
        let second = serde_json::to_vec(&composer.compose(&alert)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_compose_unknown_level() {
        let msg = composer().compose(&alert("DEBUG", "Something odd"));
        assert_eq!(msg.priority, 0);
        assert_eq!(msg.tags, vec![DOMAIN_TAG]);
        assert_eq!(msg.title, "Something odd");
    }

    #[test]
    fn test_invalid_timestamp_rendering() {
        assert_eq!(composer().timestamp(i64::MAX), format!("invalid timestamp ({})", i64::MAX));
    }

    #[test]
    fn test_local_time_follows_daylight_saving() {
        let previous = std::env::var_os("TZ");
        std::env::set_var("TZ", "EST5EDT,M3.2.0,M11.1.0");

        let composer = NotificationComposer::new("nas-alerts", NAS_URL);
        let mut alert = alert("INFO", "Scrub Finished");
        // 2026-01-15 12:00:00 UTC (EST) and 2026-07-15 12:00:00 UTC (EDT)
        alert.datetime.date = 1_768_478_400_000;
        alert.last_occurrence.date = 1_784_116_800_000;
        let body = composer.compose(&alert).message;

        match previous {
            Some(tz) => std::env::set_var("TZ", tz),
            None => std::env::remove_var("TZ"),
        }

        assert!(body.contains("Time: 2026/01/15 07:00:00"), "{}", body);
        assert!(body.contains("Last Occurrence: 2026/07/15 08:00:00"), "{}", body);
    }
}
