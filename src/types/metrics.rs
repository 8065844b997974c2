//! System health samples consumed by the controller

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observation of the health signals that drive mode selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// 95th percentile request latency (ms)
    #[serde(rename = "latency_p95", alias = "latency_p95_ms")]
    pub latency_p95_ms: f64,
    /// Fraction of failed requests (0.0-1.0)
    pub error_rate: f64,
    /// Token spend rate (currency units per hour)
    pub token_cost_per_hour: f64,
    pub timestamp: DateTime<Utc>,
}

impl SystemMetrics {
    /// Sample stamped with the current time.
    pub fn new(latency_p95_ms: f64, error_rate: f64, token_cost_per_hour: f64) -> Self {
        Self::at(latency_p95_ms, error_rate, token_cost_per_hour, Utc::now())
    }

    pub fn at(
        latency_p95_ms: f64,
        error_rate: f64,
        token_cost_per_hour: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            latency_p95_ms,
            error_rate,
            token_cost_per_hour,
            timestamp,
        }
    }

    /// Range-check every dimension. Returns one message per problem.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        check_non_negative("latency_p95", self.latency_p95_ms, &mut problems);
        check_non_negative("token_cost_per_hour", self.token_cost_per_hour, &mut problems);
        if !self.error_rate.is_finite() || !(0.0..=1.0).contains(&self.error_rate) {
            problems.push(format!(
                "error_rate must be within [0, 1] (got {})",
                self.error_rate
            ));
        }
        problems
    }
}

fn check_non_negative(name: &str, value: f64, problems: &mut Vec<String>) {
    if !value.is_finite() {
        problems.push(format!("{name} must be a finite number (got {value})"));
    } else if value < 0.0 {
        problems.push(format!("{name} must be non-negative (got {value})"));
    }
}

/// Loosely-shaped sample as it arrives over the wire.
///
/// Every field is optional so that a missing field is reported as a
/// validation problem instead of an opaque deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSample {
    #[serde(default, alias = "latency_p95_ms")]
    pub latency_p95: Option<f64>,
    #[serde(default)]
    pub error_rate: Option<f64>,
    #[serde(default)]
    pub token_cost_per_hour: Option<f64>,
    /// Defaults to the receive time when absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl MetricsSample {
    /// Convert into a validated [`SystemMetrics`], stamping `received_at`
    /// when the sample carries no timestamp.
    pub fn into_metrics(self, received_at: DateTime<Utc>) -> Result<SystemMetrics, Vec<String>> {
        let mut problems = Vec::new();
        let latency = require(self.latency_p95, "latency_p95", &mut problems);
        let error_rate = require(self.error_rate, "error_rate", &mut problems);
        let cost = require(self.token_cost_per_hour, "token_cost_per_hour", &mut problems);
        if !problems.is_empty() {
            return Err(problems);
        }

        let metrics = SystemMetrics::at(
            latency,
            error_rate,
            cost,
            self.timestamp.unwrap_or(received_at),
        );
        let problems = metrics.problems();
        if problems.is_empty() {
            Ok(metrics)
        } else {
            Err(problems)
        }
    }
}

fn require(value: Option<f64>, name: &str, problems: &mut Vec<String>) -> f64 {
    value.unwrap_or_else(|| {
        problems.push(format!("missing required field '{name}'"));
        0.0
    })
}
