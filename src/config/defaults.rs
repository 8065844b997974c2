//! System-wide default constants.
//!
//! Centralises the magic numbers used across the controller, sampler and API.
//! Grouped by subsystem for easy discovery.

use crate::types::ModeThresholds;

// ============================================================================
// Brownout Thresholds
// ============================================================================

/// Soft mode: 2 s p95 latency, 5 % errors, 50/hr spend.
pub const SOFT_THRESHOLDS: ModeThresholds = ModeThresholds::new(2_000.0, 0.05, 50.0);

/// Hard mode: 5 s p95 latency, 10 % errors, 100/hr spend.
pub const HARD_THRESHOLDS: ModeThresholds = ModeThresholds::new(5_000.0, 0.10, 100.0);

/// Emergency mode: 10 s p95 latency, 20 % errors, 200/hr spend.
pub const EMERGENCY_THRESHOLDS: ModeThresholds = ModeThresholds::new(10_000.0, 0.20, 200.0);

// ============================================================================
// Controller
// ============================================================================

/// De-escalation hold window (seconds). 0 disables the cooldown.
pub const COOLDOWN_SECS: u64 = 0;

// ============================================================================
// Server
// ============================================================================

/// HTTP bind address when neither config nor CLI names one.
pub const SERVER_ADDR: &str = "0.0.0.0:8080";

// ============================================================================
// Metrics History
// ============================================================================

/// Samples retained in the in-memory history ring.
///
/// 1 440 = 24 hours at one sample per minute.
pub const HISTORY_CAPACITY: usize = 1_440;

/// Maximum points returned by a single time-series query.
pub const MAX_SERIES_POINTS: usize = 100;

// ============================================================================
// Sampler
// ============================================================================

/// Interval between samples pulled from the configured source (seconds).
pub const SAMPLER_INTERVAL_SECS: u64 = 60;

// ============================================================================
// Synthetic Generator
// ============================================================================

/// Baseline latency range: `BASE + rand * SPAN` (ms).
pub const SYNTHETIC_LATENCY_BASE_MS: f64 = 1_000.0;
pub const SYNTHETIC_LATENCY_SPAN_MS: f64 = 2_000.0;

/// Baseline error rate range: `BASE + rand * SPAN`.
pub const SYNTHETIC_ERROR_BASE: f64 = 0.01;
pub const SYNTHETIC_ERROR_SPAN: f64 = 0.05;

/// Baseline spend range: `BASE + rand * SPAN` (per hour).
pub const SYNTHETIC_COST_BASE: f64 = 20.0;
pub const SYNTHETIC_COST_SPAN: f64 = 40.0;

/// Spike probabilities and maximum spike magnitudes per dimension.
pub const SYNTHETIC_LATENCY_SPIKE_P: f64 = 0.1;
pub const SYNTHETIC_LATENCY_SPIKE_MS: f64 = 5_000.0;
pub const SYNTHETIC_ERROR_SPIKE_P: f64 = 0.05;
pub const SYNTHETIC_ERROR_SPIKE: f64 = 0.15;
pub const SYNTHETIC_COST_SPIKE_P: f64 = 0.1;
pub const SYNTHETIC_COST_SPIKE: f64 = 100.0;

// ============================================================================
// Config Watcher
// ============================================================================

/// Interval between config file mtime checks (milliseconds).
pub const CONFIG_POLL_INTERVAL_MS: u64 = 2_000;

/// Debounce delay after detecting a change (milliseconds).
pub const CONFIG_DEBOUNCE_MS: u64 = 500;
