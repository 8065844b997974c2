//! Per-mode brownout thresholds and the mode classification rule

use serde::{Deserialize, Serialize};

use super::{BrownoutMode, SystemMetrics};
use crate::config::defaults;

// ============================================================================
// Metric Dimensions
// ============================================================================

/// One of the three health signals a threshold can bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricDimension {
    Latency,
    ErrorRate,
    TokenCost,
}

impl MetricDimension {
    pub const ALL: [Self; 3] = [Self::Latency, Self::ErrorRate, Self::TokenCost];

    /// Field name as used in threshold objects and samples.
    pub const fn field_name(self) -> &'static str {
        match self {
            Self::Latency => "latency_p95",
            Self::ErrorRate => "error_rate",
            Self::TokenCost => "token_cost_per_hour",
        }
    }

    /// Read this dimension from a sample.
    pub const fn value_of(self, sample: &SystemMetrics) -> f64 {
        match self {
            Self::Latency => sample.latency_p95_ms,
            Self::ErrorRate => sample.error_rate,
            Self::TokenCost => sample.token_cost_per_hour,
        }
    }

    /// Largest legal value for this dimension.
    pub const fn upper_bound(self) -> f64 {
        match self {
            Self::ErrorRate => 1.0,
            Self::Latency | Self::TokenCost => f64::MAX,
        }
    }
}

// ============================================================================
// Mode Thresholds
// ============================================================================

/// Lower bounds that trigger a single degraded mode.
///
/// Breaching any one dimension is sufficient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeThresholds {
    /// p95 latency bound (ms)
    #[serde(rename = "latency_p95", alias = "latency_p95_ms")]
    pub latency_p95_ms: f64,
    /// Error rate bound (0.0-1.0)
    pub error_rate: f64,
    /// Cost bound (currency units per hour)
    #[serde(alias = "cost")]
    pub token_cost_per_hour: f64,
}

impl ModeThresholds {
    pub const fn new(latency_p95_ms: f64, error_rate: f64, token_cost_per_hour: f64) -> Self {
        Self {
            latency_p95_ms,
            error_rate,
            token_cost_per_hour,
        }
    }

    /// Built-in defaults for a degraded mode. `Normal` has no thresholds.
    pub const fn default_for(mode: BrownoutMode) -> Option<Self> {
        match mode {
            BrownoutMode::Normal => None,
            BrownoutMode::Soft => Some(defaults::SOFT_THRESHOLDS),
            BrownoutMode::Hard => Some(defaults::HARD_THRESHOLDS),
            BrownoutMode::Emergency => Some(defaults::EMERGENCY_THRESHOLDS),
        }
    }

    pub const fn get(&self, dimension: MetricDimension) -> f64 {
        match dimension {
            MetricDimension::Latency => self.latency_p95_ms,
            MetricDimension::ErrorRate => self.error_rate,
            MetricDimension::TokenCost => self.token_cost_per_hour,
        }
    }

    /// True when at least one dimension of `sample` is at or above its bound.
    pub fn is_breached_by(&self, sample: &SystemMetrics) -> bool {
        MetricDimension::ALL
            .iter()
            .any(|&d| d.value_of(sample) >= self.get(d))
    }

    fn apply(&mut self, patch: &ModeThresholdsPatch) {
        if let Some(v) = patch.latency_p95_ms {
            self.latency_p95_ms = v;
        }
        if let Some(v) = patch.error_rate {
            self.error_rate = v;
        }
        if let Some(v) = patch.token_cost_per_hour {
            self.token_cost_per_hour = v;
        }
    }
}

// ============================================================================
// Threshold Table
// ============================================================================

/// Threshold table for every degraded mode.
///
/// Deserializing goes through [`ThresholdsPatch`], so any omitted mode or
/// field falls back to the built-in default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "ThresholdsPatch")]
pub struct BrownoutThresholds {
    pub soft: ModeThresholds,
    pub hard: ModeThresholds,
    pub emergency: ModeThresholds,
}

impl Default for BrownoutThresholds {
    fn default() -> Self {
        Self {
            soft: defaults::SOFT_THRESHOLDS,
            hard: defaults::HARD_THRESHOLDS,
            emergency: defaults::EMERGENCY_THRESHOLDS,
        }
    }
}

impl BrownoutThresholds {
    pub const fn for_mode(&self, mode: BrownoutMode) -> Option<&ModeThresholds> {
        match mode {
            BrownoutMode::Normal => None,
            BrownoutMode::Soft => Some(&self.soft),
            BrownoutMode::Hard => Some(&self.hard),
            BrownoutMode::Emergency => Some(&self.emergency),
        }
    }

    fn for_mode_mut(&mut self, mode: BrownoutMode) -> Option<&mut ModeThresholds> {
        match mode {
            BrownoutMode::Normal => None,
            BrownoutMode::Soft => Some(&mut self.soft),
            BrownoutMode::Hard => Some(&mut self.hard),
            BrownoutMode::Emergency => Some(&mut self.emergency),
        }
    }

    /// Map a sample to the most severe mode whose thresholds it breaches.
    ///
    /// Checks run from `Emergency` down to `Soft` and return on the first
    /// breach, so the most severe applicable mode always wins. A value equal
    /// to a bound counts as a breach.
    pub fn classify(&self, sample: &SystemMetrics) -> BrownoutMode {
        BrownoutMode::DEGRADED
            .iter()
            .rev()
            .copied()
            .find(|&mode| {
                self.for_mode(mode)
                    .is_some_and(|t| t.is_breached_by(sample))
            })
            .unwrap_or(BrownoutMode::Normal)
    }

    /// Return a copy with `patch` merged over this table. No validation.
    pub fn merged(&self, patch: &ThresholdsPatch) -> Self {
        let mut next = *self;
        for mode in BrownoutMode::DEGRADED {
            if let (Some(p), Some(t)) = (patch.for_mode(mode), next.for_mode_mut(mode)) {
                t.apply(p);
            }
        }
        next
    }

    /// Every problem with the table: range problems first, then ordering.
    /// Empty means valid.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = self.range_problems();
        problems.extend(self.ordering_problems());
        problems
    }

    /// Bounds that are non-finite, non-positive or above the dimension's
    /// legal maximum.
    pub fn range_problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for mode in BrownoutMode::DEGRADED {
            let Some(t) = self.for_mode(mode) else { continue };
            for d in MetricDimension::ALL {
                let v = t.get(d);
                if !v.is_finite() {
                    problems.push(format!("{mode}.{}: must be finite (got {v})", d.field_name()));
                } else if v <= 0.0 {
                    problems.push(format!("{mode}.{}: must be > 0 (got {v})", d.field_name()));
                } else if v > d.upper_bound() {
                    problems.push(format!(
                        "{mode}.{}: must be <= {} (got {v})",
                        d.field_name(),
                        d.upper_bound()
                    ));
                }
            }
        }
        problems
    }

    /// Dimensions whose bound does not strictly increase from one degraded
    /// mode to the next.
    pub fn ordering_problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for pair in BrownoutMode::DEGRADED.windows(2) {
            let (lower, upper) = (pair[0], pair[1]);
            let (Some(lo), Some(hi)) = (self.for_mode(lower), self.for_mode(upper)) else {
                continue;
            };
            for d in MetricDimension::ALL {
                let (a, b) = (lo.get(d), hi.get(d));
                // NaN comparisons silently pass, finiteness is a range problem
                if a.is_finite() && b.is_finite() && a >= b {
                    problems.push(format!(
                        "{}: {lower} ({a}) must be less than {upper} ({b})",
                        d.field_name()
                    ));
                }
            }
        }
        problems
    }
}

// ============================================================================
// Partial Updates
// ============================================================================

/// Partial update for one mode's thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModeThresholdsPatch {
    #[serde(
        default,
        rename = "latency_p95",
        alias = "latency_p95_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub latency_p95_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,
    #[serde(default, alias = "cost", skip_serializing_if = "Option::is_none")]
    pub token_cost_per_hour: Option<f64>,
}

/// Partial update for the whole threshold table. Absent fields keep their
/// current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft: Option<ModeThresholdsPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard: Option<ModeThresholdsPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency: Option<ModeThresholdsPatch>,
}

impl ThresholdsPatch {
    pub const fn for_mode(&self, mode: BrownoutMode) -> Option<&ModeThresholdsPatch> {
        match mode {
            BrownoutMode::Normal => None,
            BrownoutMode::Soft => self.soft.as_ref(),
            BrownoutMode::Hard => self.hard.as_ref(),
            BrownoutMode::Emergency => self.emergency.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.soft.is_none() && self.hard.is_none() && self.emergency.is_none()
    }
}

impl From<&ModeThresholds> for ModeThresholdsPatch {
    fn from(t: &ModeThresholds) -> Self {
        Self {
            latency_p95_ms: Some(t.latency_p95_ms),
            error_rate: Some(t.error_rate),
            token_cost_per_hour: Some(t.token_cost_per_hour),
        }
    }
}

/// A patch that sets every field of the table.
impl From<&BrownoutThresholds> for ThresholdsPatch {
    fn from(t: &BrownoutThresholds) -> Self {
        Self {
            soft: Some((&t.soft).into()),
            hard: Some((&t.hard).into()),
            emergency: Some((&t.emergency).into()),
        }
    }
}

impl From<ThresholdsPatch> for BrownoutThresholds {
    fn from(patch: ThresholdsPatch) -> Self {
        Self::default().merged(&patch)
    }
}

// ============================================================================
// Tests
// ============================================================================
