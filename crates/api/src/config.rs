use std::time::Duration;

use deadman_core::watchdog::{
    saturating_millis, DEFAULT_REATTEMPT_INTERVAL, DEFAULT_RESEND_INTERVAL, DEFAULT_TICK,
    DEFAULT_TTL,
};
use deadman_core::{CoreError, HeartbeatMatcher, WatchdogPolicy};

/// Error raised while loading [`ServerConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable is present but cannot be used.
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    /// A parsed value was rejected by the watchdog core.
    #[error("{var}: {source}")]
    Rejected {
        var: &'static str,
        #[source]
        source: CoreError,
    },
}

/// How the notify program is invoked on expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

/// Service configuration loaded from environment variables.
///
/// Defaults are suitable for running next to a local Alertmanager.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Expiry, resend and reattempt timing.
    pub watchdog: WatchdogPolicy,
    /// Which webhook payloads count as a heartbeat.
    pub matcher: HeartbeatMatcher,
    /// Command run when the heartbeat expires.
    pub notify: NotifyConfig,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                   | Default                    |
    /// |---------------------------|----------------------------|
    /// | `HOST`                    | `0.0.0.0`                  |
    /// | `PORT`                    | `8080`                     |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                       |
    /// | `WATCHDOG_TTL_SECS`       | `30`                       |
    /// | `WATCHDOG_RESEND_SECS`    | `900`                      |
    /// | `WATCHDOG_REATTEMPT_SECS` | `10` (`off` disables)      |
    /// | `WATCHDOG_TICK_MILLIS`    | `1000`                     |
    /// | `HEARTBEAT_MATCH`         | `alertname=Watchdog`       |
    /// | `NOTIFY_PROGRAM`          | `say`                      |
    /// | `NOTIFY_ARGS`             | `-v Xander woof woof woof` |
    /// | `NOTIFY_TIMEOUT_SECS`     | `30`                       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Only an unset variable takes the default; an empty value is a value.
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string());

        let host = match var("HOST") {
            None => "0.0.0.0".to_string(),
            Some(v) => non_empty("HOST", v, "a bind address")?,
        };
        let port = parse_or("PORT", var("PORT"), 8080u16, "a valid port number")?;
        let request_timeout_secs = positive_secs(
            "REQUEST_TIMEOUT_SECS",
            var("REQUEST_TIMEOUT_SECS"),
            Duration::from_secs(30),
        )?
        .as_secs();

        let ttl = secs_or("WATCHDOG_TTL_SECS", var("WATCHDOG_TTL_SECS"), DEFAULT_TTL)?;
        let resend_interval = secs_or(
            "WATCHDOG_RESEND_SECS",
            var("WATCHDOG_RESEND_SECS"),
            DEFAULT_RESEND_INTERVAL,
        )?;
        let reattempt_interval = match var("WATCHDOG_REATTEMPT_SECS") {
            Some(v) if v.eq_ignore_ascii_case("off") => None,
            other => Some(secs_or(
                "WATCHDOG_REATTEMPT_SECS",
                other,
                DEFAULT_REATTEMPT_INTERVAL,
            )?),
        };
        let tick = Duration::from_millis(parse_or(
            "WATCHDOG_TICK_MILLIS",
            var("WATCHDOG_TICK_MILLIS"),
            saturating_millis(DEFAULT_TICK),
            "a positive number of milliseconds",
        )?);

        let watchdog = WatchdogPolicy {
            ttl,
            resend_interval,
            reattempt_interval,
            tick,
        };
        watchdog
            .validate()
            .map_err(|source| ConfigError::Rejected {
                var: "WATCHDOG_TICK_MILLIS",
                source,
            })?;

        let matcher = match var("HEARTBEAT_MATCH") {
            Some(v) => v.parse().map_err(|source| ConfigError::Rejected {
                var: "HEARTBEAT_MATCH",
                source,
            })?,
            None => HeartbeatMatcher::default(),
        };

        let program = match var("NOTIFY_PROGRAM") {
            None => "say".to_string(),
            Some(v) => non_empty("NOTIFY_PROGRAM", v, "a non-empty program path")?,
        };
        // Split the raw value: an empty NOTIFY_ARGS runs the program bare.
        let args = lookup("NOTIFY_ARGS")
            .unwrap_or_else(|| "-v Xander woof woof woof".into())
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let timeout = positive_secs(
            "NOTIFY_TIMEOUT_SECS",
            var("NOTIFY_TIMEOUT_SECS"),
            Duration::from_secs(30),
        )?;

        Ok(Self {
            host,
            port,
            request_timeout_secs,
            watchdog,
            matcher,
            notify: NotifyConfig {
                program,
                args,
                timeout,
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &'static str,
    raw: Option<String>,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            var,
            expected,
            value,
        }),
    }
}

fn non_empty(
    var: &'static str,
    value: String,
    expected: &'static str,
) -> Result<String, ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Invalid {
            var,
            expected,
            value,
        });
    }
    Ok(value)
}

/// Whole seconds; negative values are rejected explicitly.
fn secs_or(
    var: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(value) = raw else {
        return Ok(default);
    };
    let secs: i64 = value.parse().map_err(|_| ConfigError::Invalid {
        var,
        expected: "an integer",
        value: value.clone(),
    })?;
    let secs = u64::try_from(secs).map_err(|_| ConfigError::Invalid {
        var,
        expected: "zero or a positive number of seconds",
        value,
    })?;
    Ok(Duration::from_secs(secs))
}

/// Like [`secs_or`], but zero is rejected too.
fn positive_secs(
    var: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let value = raw.clone().unwrap_or_default();
    let secs = secs_or(var, raw, default)?;
    if secs.is_zero() {
        return Err(ConfigError::Invalid {
            var,
            expected: "a positive number of seconds",
            value,
        });
    }
    Ok(secs)
}
