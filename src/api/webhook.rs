//! Datadog monitor webhook payloads.
//!
//! Monitors opt into brownout control with a `brownout:<mode>` tag. Only
//! the "Triggered" transition acts; recoveries and no-data notifications
//! are acknowledged and ignored so the vendor does not retry them.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::types::{BrownoutMode, MetricDimension};

/// Tag prefix naming the target mode.
pub const BROWNOUT_TAG_PREFIX: &str = "brownout:";

/// The transition that activates a brownout.
const TRIGGERED: &str = "Triggered";

/// Subset of the Datadog webhook body this service reads. Everything is
/// optional and unknown fields are ignored.
///
/// Webhook templates are user-edited, so field shapes vary: ids arrive as
/// numbers, `$TAGS` expands to one comma-separated string, and absent
/// variables become `null`. All of those are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatadogWebhookPayload {
    #[serde(deserialize_with = "lenient_string")]
    pub alert_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub alert_transition: String,
    #[serde(deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(deserialize_with = "lenient_string")]
    pub event_title: String,
    #[serde(deserialize_with = "lenient_tags")]
    pub tags: Vec<String>,
}

/// Scalars become their text form; anything else becomes empty.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(scalar_text(Value::deserialize(deserializer)?).unwrap_or_default())
}

/// A list of tags, or one comma-separated string of them.
fn lenient_tags<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let tags = match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().filter_map(scalar_text).collect(),
        Value::String(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    Ok(tags)
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// What to do with a webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertDecision {
    /// Drive the controller toward `mode` through `dimension`.
    Apply {
        mode: BrownoutMode,
        dimension: MetricDimension,
    },
    /// Acknowledge without acting.
    Ignore(String),
}

impl DatadogWebhookPayload {
    /// Pure decision over the payload. Never touches the controller.
    pub fn interpret(&self) -> AlertDecision {
        if !self.alert_transition.trim().eq_ignore_ascii_case(TRIGGERED) {
            return AlertDecision::Ignore("Not a triggered alert".to_string());
        }

        let Some(raw_mode) = self
            .tags
            .iter()
            .find_map(|t| t.trim().strip_prefix(BROWNOUT_TAG_PREFIX))
        else {
            return AlertDecision::Ignore("No brownout mode specified in tags".to_string());
        };

        match raw_mode.parse::<BrownoutMode>() {
            Ok(mode) => AlertDecision::Apply {
                mode,
                dimension: self.relevant_dimension(),
            },
            Err(e) => AlertDecision::Ignore(e.to_string()),
        }
    }

    /// Which signal the alert is about, judged from its title. Latency
    /// unless the title mentions errors or spend.
    pub fn relevant_dimension(&self) -> MetricDimension {
        let text = format!("{} {}", self.title, self.event_title).to_lowercase();
        if ["error", "5xx", "failure"].iter().any(|k| text.contains(k)) {
            MetricDimension::ErrorRate
        } else if ["cost", "token", "spend", "budget"].iter().any(|k| text.contains(k)) {
            MetricDimension::TokenCost
        } else {
            MetricDimension::Latency
        }
    }
}
