//! Samples synthesized to force a particular mode.
//!
//! Manual overrides and webhook alerts name a target mode rather than
//! carrying real measurements. They are turned into a sample that the
//! normal classification rule maps to exactly that mode under the current
//! thresholds, so every transition goes through the same path.

use chrono::{DateTime, Utc};

use crate::types::{BrownoutMode, BrownoutThresholds, MetricDimension, SystemMetrics};

/// Headroom above the emergency bound when there is no next mode to stay under.
const EMERGENCY_OVERSHOOT: f64 = 1.2;

/// Build a sample that classifies as `mode` by pushing `dimension` into the
/// mode's band and leaving every other dimension at zero.
///
/// For a degraded mode the value sits midway between the mode's bound and
/// the next mode's bound. `Normal` uses half the soft latency bound.
pub fn forcing_sample(
    mode: BrownoutMode,
    dimension: MetricDimension,
    thresholds: &BrownoutThresholds,
    at: DateTime<Utc>,
) -> SystemMetrics {
    let mut values = [0.0_f64; 3];

    match thresholds.for_mode(mode) {
        None => {
            values[0] = thresholds.soft.latency_p95_ms / 2.0;
        }
        Some(bounds) => {
            let lower = bounds.get(dimension);
            let value = match mode.more_severe().and_then(|m| thresholds.for_mode(m)) {
                Some(next) => lower + (next.get(dimension) - lower) / 2.0,
                None => (lower * EMERGENCY_OVERSHOOT).min(dimension.upper_bound()).max(lower),
            };
            values[index_of(dimension)] = value;
        }
    }

    SystemMetrics::at(values[0], values[1], values[2], at)
}

const fn index_of(dimension: MetricDimension) -> usize {
    match dimension {
        MetricDimension::Latency => 0,
        MetricDimension::ErrorRate => 1,
        MetricDimension::TokenCost => 2,
    }
}
