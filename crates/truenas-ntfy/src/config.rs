use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const ENV_TRUENAS_URL: &str = "TRUENASURL";
pub const ENV_API_KEY: &str = "APIKEY";
pub const ENV_NTFY_URL: &str = "NTFYURL";
pub const ENV_TOPIC: &str = "TOPIC";
pub const ENV_INTERVAL: &str = "INTERVAL";
pub const ENV_NTFY_TOKEN: &str = "NTFY_TOKEN";
pub const ENV_HTTP_TIMEOUT: &str = "HTTP_TIMEOUT";
pub const ENV_METRICS_TEXTFILE: &str = "METRICS_TEXTFILE";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var}={value:?} is not a valid duration: {source}")]
    InvalidDuration {
        var: &'static str,
        value: String,
        #[source]
        source: DurationError,
    },

    #[error("{var}={value:?} is not a valid URL: {reason}")]
    InvalidUrl {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{var} {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("failed to load {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,
    #[error("negative durations are not allowed")]
    Negative,
    #[error("expected a number at {0:?}")]
    ExpectedNumber(String),
    #[error("missing unit after {0:?}")]
    MissingUnit(String),
    #[error("unknown unit {0:?} (use ns, us, ms, s, m or h)")]
    UnknownUnit(String),
    #[error("duration too large")]
    Overflow,
}

#[derive(Clone)]
pub struct TrueNasConfig {
    pub url: String,
    pub api_key: String,
}

impl fmt::Debug for TrueNasConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrueNasConfig")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct NtfyConfig {
    pub url: String,
    pub topic: String,
    pub token: Option<String>,
}

impl fmt::Debug for NtfyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NtfyConfig")
            .field("url", &self.url)
            .field("topic", &self.topic)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Applied to every request, connect through body.
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl HttpConfig {
    /// The single client shared by every request of a run.
    pub fn client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricsConfig {
    /// Where to write the Prometheus text exposition after a run.
    pub textfile: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub truenas: TrueNasConfig,
    pub ntfy: NtfyConfig,
    /// How long an alert must have been active before it is forwarded.
    pub lookback: Duration,
    pub http: HttpConfig,
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load from the environment, reading `.env` first if there is one.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_env()
    }

    /// Like [`Config::load`] but with an explicit env file, which must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        dotenvy::from_path(path).map_err(|source| ConfigError::EnvFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_env()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |var: &'static str| {
            lookup(var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |var: &'static str| optional(var).ok_or(ConfigError::Missing(var));

        let truenas_url = parse_url(ENV_TRUENAS_URL, required(ENV_TRUENAS_URL)?)?;
        let api_key = required(ENV_API_KEY)?;
        let ntfy_url = parse_url(ENV_NTFY_URL, required(ENV_NTFY_URL)?)?;
        let topic = required(ENV_TOPIC)?;
        let lookback = duration_var(ENV_INTERVAL, required(ENV_INTERVAL)?)?;

        let timeout = match optional(ENV_HTTP_TIMEOUT) {
            Some(value) => duration_var(ENV_HTTP_TIMEOUT, value)?,
            None => DEFAULT_HTTP_TIMEOUT,
        };
        if timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: ENV_HTTP_TIMEOUT,
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Config {
            truenas: TrueNasConfig {
                url: truenas_url.trim_end_matches('/').to_string(),
                api_key,
            },
            ntfy: NtfyConfig {
                url: ntfy_url,
                topic,
                token: optional(ENV_NTFY_TOKEN),
            },
            lookback,
            http: HttpConfig { timeout },
            metrics: MetricsConfig {
                textfile: optional(ENV_METRICS_TEXTFILE).map(PathBuf::from),
            },
        })
    }
}

fn parse_url(var: &'static str, value: String) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        var,
        value: value.clone(),
        reason,
    };

    let url = Url::parse(&value).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(value.clone()),
        other => Err(invalid(format!("unsupported scheme {:?}", other))),
    }
}

fn duration_var(var: &'static str, value: String) -> Result<Duration, ConfigError> {
    parse_duration(&value).map_err(|source| ConfigError::InvalidDuration { var, value, source })
}

/// Parse a duration such as `300ms`, `1.5h` or `2h45m`.
///
/// A sequence of decimal numbers, each with an optional fraction and a unit
/// suffix (`ns`, `us`/`µs`, `ms`, `s`, `m`, `h`). A bare `0` is accepted.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let mut rest = input.trim();
    if let Some(stripped) = rest.strip_prefix('+') {
        rest = stripped;
    } else if rest.starts_with('-') {
        return Err(DurationError::Negative);
    }

    if rest.is_empty() {
        return Err(DurationError::Empty);
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (int_part, after_int) = rest.split_at(int_len);

        let (frac_part, after_number) = match after_int.strip_prefix('.') {
            Some(after_dot) => {
                let frac_len = after_dot
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(after_dot.len());
                after_dot.split_at(frac_len)
            }
            None => ("", after_int),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(DurationError::ExpectedNumber(rest.to_string()));
        }

        let unit_len = after_number
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after_number.len());
        let (unit, remaining) = after_number.split_at(unit_len);
        if unit.is_empty() {
            return Err(DurationError::MissingUnit(rest.to_string()));
        }
        let scale = unit_nanos(unit).ok_or_else(|| DurationError::UnknownUnit(unit.to_string()))?;

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| DurationError::Overflow)?
        };
        let mut nanos = whole.checked_mul(scale).ok_or(DurationError::Overflow)?;

        // digits beyond 18 cannot change the result at nanosecond scale
        let frac_digits = &frac_part[..frac_part.len().min(18)];
        if !frac_digits.is_empty() {
            let numerator: u128 = frac_digits.parse().map_err(|_| DurationError::Overflow)?;
            let denominator = 10u128.pow(frac_digits.len() as u32);
            nanos += numerator * scale / denominator;
        }

        total = total.checked_add(nanos).ok_or(DurationError::Overflow)?;
        rest = remaining;
    }

    let total = u64::try_from(total).map_err(|_| DurationError::Overflow)?;
    Ok(Duration::from_nanos(total))
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(1_000_000_000),
        "m" => Some(60 * 1_000_000_000),
        "h" => Some(3_600 * 1_000_000_000),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base_env() -> HashMap<String, String> {
        env(&[
            (ENV_TRUENAS_URL, "https://nas.local/"),
            (ENV_API_KEY, "1-abcdef"),
            (ENV_NTFY_URL, "https://ntfy.sh"),
            (ENV_TOPIC, "nas-alerts"),
            (ENV_INTERVAL, "24h"),
        ])
    }

    fn load(vars: &HashMap<String, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_parse_duration() {
        let cases = [
            ("0", Duration::ZERO),
            ("24h", Duration::from_secs(24 * 3600)),
            ("90m", Duration::from_secs(90 * 60)),
            ("1h30m", Duration::from_secs(5400)),
            ("1.5h", Duration::from_secs(5400)),
            (".5s", Duration::from_millis(500)),
            ("300ms", Duration::from_millis(300)),
            ("2h45m10s", Duration::from_secs(2 * 3600 + 45 * 60 + 10)),
            ("+10s", Duration::from_secs(10)),
            ("10us", Duration::from_micros(10)),
            ("10µs", Duration::from_micros(10)),
            ("7ns", Duration::from_nanos(7)),
        ];

        for (input, expected) in cases {
            assert_eq!(parse_duration(input), Ok(expected), "input {:?}", input);
        }
    }

    #[test]
    fn test_parse_duration_errors() {
        assert_eq!(parse_duration(""), Err(DurationError::Empty));
        assert_eq!(parse_duration("-1h"), Err(DurationError::Negative));
        assert_eq!(parse_duration("24"), Err(DurationError::MissingUnit("24".into())));
        assert_eq!(parse_duration("3d"), Err(DurationError::UnknownUnit("d".into())));
        assert_eq!(parse_duration("h"), Err(DurationError::ExpectedNumber("h".into())));
        assert_eq!(parse_duration("1h."), Err(DurationError::ExpectedNumber(".".into())));
        assert_eq!(
            parse_duration("99999999999999999999h"),
            Err(DurationError::Overflow)
        );
    }

    #[test]
    fn test_load_config() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.truenas.url, "https://nas.local");
        assert_eq!(config.truenas.api_key, "1-abcdef");
        assert_eq!(config.ntfy.url, "https://ntfy.sh");
        assert_eq!(config.ntfy.topic, "nas-alerts");
        assert_eq!(config.ntfy.token, None);
        assert_eq!(config.lookback, Duration::from_secs(24 * 3600));
        assert_eq!(config.http.timeout, DEFAULT_HTTP_TIMEOUT);
        assert!(config.metrics.textfile.is_none());
    }

    #[test]
    fn test_optional_settings() {
        let mut vars = base_env();
        vars.insert(ENV_NTFY_TOKEN.into(), "tk_123".into());
        vars.insert(ENV_HTTP_TIMEOUT.into(), "5s".into());
        vars.insert(ENV_METRICS_TEXTFILE.into(), "/var/lib/node_exporter/truenas_ntfy.prom".into());

        let config = load(&vars).unwrap();
        assert_eq!(config.ntfy.token.as_deref(), Some("tk_123"));
        assert_eq!(config.http.timeout, Duration::from_secs(5));
        assert_eq!(
            config.metrics.textfile,
            Some(PathBuf::from("/var/lib/node_exporter/truenas_ntfy.prom"))
        );
    }

    #[test]
    fn test_missing_variables_are_named() {
        for var in [ENV_TRUENAS_URL, ENV_API_KEY, ENV_NTFY_URL, ENV_TOPIC, ENV_INTERVAL] {
            let mut vars = base_env();
            vars.remove(var);
            match load(&vars) {
                Err(ConfigError::Missing(missing)) => assert_eq!(missing, var),
                other => panic!("expected Missing({}), got {:?}", var, other),
            }
        }
    }

    #[test]
    fn test_blank_variable_counts_as_missing() {
        let mut vars = base_env();
        vars.insert(ENV_TOPIC.into(), "   ".into());
        assert!(matches!(load(&vars), Err(ConfigError::Missing(ENV_TOPIC))));
    }

    #[test]
    fn test_malformed_interval() {
        let mut vars = base_env();
        vars.insert(ENV_INTERVAL.into(), "one day".into());
        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { var: ENV_INTERVAL, .. }));
        assert!(err.to_string().contains("INTERVAL"));
    }

    #[test]
    fn test_invalid_urls() {
        let mut vars = base_env();
        vars.insert(ENV_NTFY_URL.into(), "ntfy.sh/topic".into());
        assert!(matches!(load(&vars), Err(ConfigError::InvalidUrl { var: ENV_NTFY_URL, .. })));

        let mut vars = base_env();
        vars.insert(ENV_TRUENAS_URL.into(), "ftp://nas.local".into());
        assert!(matches!(load(&vars), Err(ConfigError::InvalidUrl { var: ENV_TRUENAS_URL, .. })));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut vars = base_env();
        vars.insert(ENV_HTTP_TIMEOUT.into(), "0s".into());
        assert!(matches!(load(&vars), Err(ConfigError::Invalid { var: ENV_HTTP_TIMEOUT, .. })));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut vars = base_env();
        vars.insert(ENV_NTFY_TOKEN.into(), "tk_123".into());
        let rendered = format!("{:?}", load(&vars).unwrap());
        assert!(!rendered.contains("1-abcdef"));
        assert!(!rendered.contains("tk_123"));
    }
}
