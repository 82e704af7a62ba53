//! Alertmanager webhook payload and the heartbeat-qualifying rule.
//!
//! The external alerting system posts a [`WebhookMessage`] (Alertmanager's
//! version 4 webhook body). Only payloads accepted by a [`HeartbeatMatcher`]
//! reset the watchdog.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Label key used by the default sentinel rule.
pub const DEFAULT_SENTINEL_KEY: &str = "alertname";

/// Label value used by the default sentinel rule.
pub const DEFAULT_SENTINEL_VALUE: &str = "Watchdog";

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Top-level webhook body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMessage {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub group_key: String,
    /// `"firing"` or `"resolved"`.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub receiver: String,
    #[serde(default)]
    pub group_labels: HashMap<String, String>,
    #[serde(default)]
    pub common_labels: HashMap<String, String>,
    #[serde(default)]
    pub common_annotations: HashMap<String, String>,
    #[serde(default, rename = "externalURL")]
    pub external_url: String,
    pub alerts: Vec<Alert>,
}

/// One alert entry inside a [`WebhookMessage`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "generatorURL")]
    pub generator_url: String,
    #[serde(default)]
    pub fingerprint: String,
}

impl WebhookMessage {
    /// Decode a raw request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, CoreError> {
        Ok(serde_json::from_slice(body)?)
    }
}

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

/// Rule deciding whether a payload counts as a heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatMatcher {
    /// Every well-formed payload resets the watchdog.
    Any,
    /// The pair must appear in an alert's labels or in the common labels.
    Label { key: String, value: String },
}

impl HeartbeatMatcher {
    pub fn label(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Label {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn qualifies(&self, message: &WebhookMessage) -> bool {
        match self {
            Self::Any => true,
            Self::Label { key, value } => {
                let matches = |labels: &HashMap<String, String>| {
                    labels.get(key).is_some_and(|v| v == value)
                };
                message.alerts.iter().any(|a| matches(&a.labels))
                    || matches(&message.common_labels)
            }
        }
    }
}

impl Default for HeartbeatMatcher {
    fn default() -> Self {
        Self::label(DEFAULT_SENTINEL_KEY, DEFAULT_SENTINEL_VALUE)
    }
}

impl fmt::Display for HeartbeatMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Label { key, value } => write!(f, "{key}={value}"),
        }
    }
}

/// Parses `any` or `key=value`.
impl FromStr for HeartbeatMatcher {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("any") {
            return Ok(Self::Any);
        }

        match s.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() && !value.trim().is_empty() => {
                Ok(Self::label(key.trim(), value.trim()))
            }
            _ => Err(CoreError::Validation(format!(
                "heartbeat matcher must be `any` or `key=value`, got '{s}'"
            ))),
        }
    }
}
