//! Alert level → ntfy tag and priority.

/// Returned by [`map_level`] for a level it does not recognize.
pub const UNKNOWN: (&str, u8) = ("", 0);

/// TrueNAS alert levels, as sent in the `level` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Notice,
    Warning,
    Error,
    Alert,
    Critical,
    Emergency,
}

impl Severity {
    /// Parse a level token. Matching is exact on the uppercase names.
    pub fn parse(level: &str) -> Option<Self> {
        match level {
            "INFO" => Some(Severity::Info),
            "NOTICE" => Some(Severity::Notice),
            "WARNING" => Some(Severity::Warning),
            "ERROR" => Some(Severity::Error),
            "ALERT" => Some(Severity::Alert),
            "CRITICAL" => Some(Severity::Critical),
            "EMERGENCY" => Some(Severity::Emergency),
            _ => None,
        }
    }

    /// ntfy emoji shortcode shown next to the notification.
    pub fn tag(self) -> &'static str {
        match self {
            Severity::Info => "large_blue_circle",
            Severity::Notice => "purple_circle",
            Severity::Warning => "yellow_circle",
            Severity::Error | Severity::Alert => "orange_circle",
            Severity::Critical | Severity::Emergency => "red_circle",
        }
    }

    /// ntfy priority, 1 (min) through 5 (max).
    pub fn priority(self) -> u8 {
        match self {
            Severity::Info => 1,
            Severity::Notice => 2,
            Severity::Warning => 3,
            Severity::Error | Severity::Alert => 4,
            Severity::Critical | Severity::Emergency => 5,
        }
    }
}

/// Map a raw level string to its `(tag, priority)` pair.
///
/// Never fails: anything unrecognized yields [`UNKNOWN`].
pub fn map_level(level: &str) -> (&'static str, u8) {
    Severity::parse(level)
        .map(|severity| (severity.tag(), severity.priority()))
        .unwrap_or(UNKNOWN)
}
