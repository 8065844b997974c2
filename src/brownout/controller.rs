//! Brownout Controller - mode state machine over latency, errors and spend
//!
//! One controller is shared by every request handler and the background
//! sampler. All state lives behind a single `RwLock` so a reader never sees
//! a mode that disagrees with the thresholds it was derived from.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use super::cooldown::Cooldown;
use super::error::BrownoutError;
use super::synthetic::forcing_sample;
use crate::config::BalancerConfig;
use crate::types::{
    BrownoutMode, BrownoutThresholds, LlmConfig, LlmProfiles, MetricDimension, SystemMetrics,
    ThresholdsPatch,
};

// ============================================================================
// Results
// ============================================================================

/// Outcome of feeding one sample through the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModeChange {
    /// Mode before the sample was applied
    pub previous: BrownoutMode,
    /// Mode after the sample was applied
    pub current: BrownoutMode,
    /// Mode the sample classified as. Differs from `current` only when the
    /// cooldown held a de-escalation.
    pub evaluated: BrownoutMode,
    pub at: DateTime<Utc>,
}

impl ModeChange {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }

    pub fn held(&self) -> bool {
        self.evaluated != self.current
    }
}

/// Consistent view of the controller for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerSnapshot {
    pub current_mode: BrownoutMode,
    pub thresholds: BrownoutThresholds,
    pub llm_config: LlmConfig,
    pub last_transition: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}

/// Activation and sample counters for metrics export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerCounters {
    activations: [u64; 4],
    pub samples_evaluated: u64,
}

impl ControllerCounters {
    /// Number of times the controller entered `mode`.
    pub const fn activations(&self, mode: BrownoutMode) -> u64 {
        self.activations[mode.severity() as usize]
    }
}

// ============================================================================
// Controller
// ============================================================================

#[derive(Debug)]
struct ControllerState {
    mode: BrownoutMode,
    thresholds: BrownoutThresholds,
    last_transition: Option<DateTime<Utc>>,
    counters: ControllerCounters,
}

/// Owns the current mode, the threshold table and the LLM profile table.
///
/// Construct once and share through `Arc`. Mutations (`update_mode`,
/// `update_thresholds`, `force_mode`, `apply_alert`) are serialized by the
/// write lock. Validation always completes before the lock is taken for
/// writing, so a rejected call never changes state.
#[derive(Debug)]
pub struct BrownoutController {
    state: RwLock<ControllerState>,
    profiles: LlmProfiles,
    cooldown: Option<Cooldown>,
}

impl BrownoutController {
    /// Start in `Normal` with the given tables. Both tables are validated.
    pub fn new(thresholds: BrownoutThresholds, profiles: LlmProfiles) -> Result<Self, BrownoutError> {
        let mut problems = thresholds.problems();
        problems.extend(profiles.problems());
        if !problems.is_empty() {
            return Err(BrownoutError::Configuration(problems));
        }

        Ok(Self {
            state: RwLock::new(ControllerState {
                mode: BrownoutMode::Normal,
                thresholds,
                last_transition: None,
                counters: ControllerCounters::default(),
            }),
            profiles,
            cooldown: None,
        })
    }

    /// Built-in thresholds and profiles, no cooldown.
    pub fn with_defaults() -> Self {
        Self {
            state: RwLock::new(ControllerState {
                mode: BrownoutMode::Normal,
                thresholds: BrownoutThresholds::default(),
                last_transition: None,
                counters: ControllerCounters::default(),
            }),
            profiles: LlmProfiles::default(),
            cooldown: None,
        }
    }

    /// Build from a loaded config, including the cooldown window.
    pub fn from_config(config: &BalancerConfig) -> Result<Self, BrownoutError> {
        Ok(Self::new(config.thresholds, config.llm_profiles.clone())?
            .with_cooldown(Cooldown::from_secs(config.controller.cooldown_secs)))
    }

    pub fn with_cooldown(mut self, cooldown: Option<Cooldown>) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub const fn cooldown(&self) -> Option<Cooldown> {
        self.cooldown
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ControllerState> {
        self.state.read().unwrap_or_else(|e| {
            warn!("RwLock poisoned on BrownoutController read, recovering");
            e.into_inner()
        })
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ControllerState> {
        self.state.write().unwrap_or_else(|e| {
            warn!("RwLock poisoned on BrownoutController write, recovering");
            e.into_inner()
        })
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Classify `sample` against the current thresholds. No state change.
    pub fn evaluate(&self, sample: &SystemMetrics) -> Result<BrownoutMode, BrownoutError> {
        validate_sample(sample)?;
        Ok(self.read_state().thresholds.classify(sample))
    }

    pub fn current_mode(&self) -> BrownoutMode {
        self.read_state().mode
    }

    pub fn thresholds(&self) -> BrownoutThresholds {
        self.read_state().thresholds
    }

    /// Profile for the current mode.
    pub fn llm_config(&self) -> LlmConfig {
        let mode = self.current_mode();
        self.profiles.for_mode(mode).clone()
    }

    pub const fn profiles(&self) -> &LlmProfiles {
        &self.profiles
    }

    pub fn last_transition(&self) -> Option<DateTime<Utc>> {
        self.read_state().last_transition
    }

    pub fn counters(&self) -> ControllerCounters {
        self.read_state().counters
    }

    /// Mode, thresholds and profile read under one lock acquisition.
    pub fn snapshot(&self) -> ControllerSnapshot {
        let state = self.read_state();
        ControllerSnapshot {
            current_mode: state.mode,
            thresholds: state.thresholds,
            llm_config: self.profiles.for_mode(state.mode).clone(),
            last_transition: state.last_transition,
            timestamp: Utc::now(),
        }
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Classify `sample` and move to the resulting mode.
    ///
    /// With a cooldown configured, a de-escalation inside the window keeps
    /// the current mode; `ModeChange::evaluated` still reports what the
    /// sample classified as.
    pub fn update_mode(&self, sample: &SystemMetrics) -> Result<ModeChange, BrownoutError> {
        validate_sample(sample)?;
        let mut state = self.write_state();
        Ok(self.apply_sample(&mut state, sample, true))
    }

    /// Merge `patch` into the thresholds and commit if the result is valid.
    ///
    /// Returns the new table. Out-of-range bounds fail with `Validation`,
    /// bounds that break the ordering between modes with `Configuration`.
    /// On failure the previous table stays active.
    /// The current mode is not re-evaluated; the next sample uses the new
    /// table.
    pub fn update_thresholds(
        &self,
        patch: &ThresholdsPatch,
    ) -> Result<BrownoutThresholds, BrownoutError> {
        let mut state = self.write_state();
        let candidate = state.thresholds.merged(patch);
        let problems = candidate.range_problems();
        if !problems.is_empty() {
            warn!(problems = ?problems, "Threshold update rejected: out of range");
            return Err(BrownoutError::Validation(problems));
        }
        let problems = candidate.ordering_problems();
        if !problems.is_empty() {
            warn!(problems = ?problems, "Threshold update rejected: ordering");
            return Err(BrownoutError::Configuration(problems));
        }
        state.thresholds = candidate;
        info!(
            soft = ?candidate.soft,
            hard = ?candidate.hard,
            emergency = ?candidate.emergency,
            "Thresholds updated"
        );
        Ok(candidate)
    }

    /// Operator override. Synthesizes a sample that classifies as `mode` and
    /// applies it, bypassing the cooldown.
    pub fn force_mode(&self, mode: BrownoutMode, reason: &str) -> ModeChange {
        let mut state = self.write_state();
        let sample = forcing_sample(mode, MetricDimension::Latency, &state.thresholds, Utc::now());
        let change = self.apply_sample(&mut state, &sample, false);
        info!(
            previous = %change.previous,
            mode = %change.current,
            reason = %reason,
            "Manual brownout override"
        );
        change
    }

    /// External alert naming a target mode. The synthesized sample pushes
    /// `dimension` into the mode's band and goes through the cooldown like
    /// any measured sample.
    pub fn apply_alert(&self, mode: BrownoutMode, dimension: MetricDimension) -> ModeChange {
        let mut state = self.write_state();
        let sample = forcing_sample(mode, dimension, &state.thresholds, Utc::now());
        self.apply_sample(&mut state, &sample, true)
    }

    fn apply_sample(
        &self,
        state: &mut ControllerState,
        sample: &SystemMetrics,
        respect_cooldown: bool,
    ) -> ModeChange {
        let previous = state.mode;
        let evaluated = state.thresholds.classify(sample);
        state.counters.samples_evaluated += 1;

        let held = respect_cooldown
            && self
                .cooldown
                .is_some_and(|c| c.holds(previous, evaluated, state.last_transition, sample.timestamp));

        let current = if held { previous } else { evaluated };
        let change = ModeChange {
            previous,
            current,
            evaluated,
            at: sample.timestamp,
        };

        if held {
            debug!(mode = %previous, evaluated = %evaluated, "De-escalation held by cooldown");
            return change;
        }

        if current != previous {
            state.mode = current;
            state.last_transition = Some(sample.timestamp);
            state.counters.activations[current.severity() as usize] += 1;
            if current > previous {
                warn!(
                    previous = %previous,
                    mode = %current,
                    latency_p95 = sample.latency_p95_ms,
                    error_rate = sample.error_rate,
                    token_cost_per_hour = sample.token_cost_per_hour,
                    "Brownout escalated"
                );
            } else {
                info!(previous = %previous, mode = %current, "Brownout relaxed");
            }
        }

        change
    }
}

fn validate_sample(sample: &SystemMetrics) -> Result<(), BrownoutError> {
    let problems = sample.problems();
    if problems.is_empty() {
        Ok(())
    } else {
        Err(BrownoutError::Validation(problems))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(latency: f64, error_rate: f64, cost: f64) -> SystemMetrics {
        SystemMetrics::new(latency, error_rate, cost)
    }

    #[test]
    fn test_starts_normal() {
        let c = BrownoutController::with_defaults();
        assert_eq!(c.current_mode(), BrownoutMode::Normal);
        assert_eq!(c.llm_config().max_tokens, 1000);
        assert!(c.last_transition().is_none());
    }

    #[test]
    fn test_evaluate_does_not_mutate() {
        let c = BrownoutController::with_defaults();
        let s = sample(12_000.0, 0.0, 0.0);
        assert_eq!(c.evaluate(&s).unwrap(), BrownoutMode::Emergency);
        assert_eq!(c.evaluate(&s).unwrap(), BrownoutMode::Emergency);
        assert_eq!(c.current_mode(), BrownoutMode::Normal);
        assert_eq!(c.counters().samples_evaluated, 0);
    }

    #[test]
    fn test_update_mode_transitions_and_updates_llm_config() {
        let c = BrownoutController::with_defaults();
        let change = c.update_mode(&sample(2_500.0, 0.01, 10.0)).unwrap();
        assert_eq!(change.previous, BrownoutMode::Normal);
        assert_eq!(change.current, BrownoutMode::Soft);
        assert!(change.changed());
        assert_eq!(c.llm_config().max_tokens, 500);
        assert!(c.last_transition().is_some());
    }

    #[test]
    fn test_non_adjacent_jumps() {
        let c = BrownoutController::with_defaults();
        c.update_mode(&sample(0.0, 0.5, 0.0)).unwrap();
        assert_eq!(c.current_mode(), BrownoutMode::Emergency);
        c.update_mode(&sample(10.0, 0.0, 0.0)).unwrap();
        assert_eq!(c.current_mode(), BrownoutMode::Normal);
    }

    #[test]
    fn test_invalid_sample_rejected_without_mutation() {
        let c = BrownoutController::with_defaults();
        c.update_mode(&sample(6_000.0, 0.0, 0.0)).unwrap();
        let before = c.snapshot();

        let err = c.update_mode(&sample(-5.0, 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, BrownoutError::Validation(_)));
        let err = c.update_mode(&sample(100.0, 1.5, 0.0)).unwrap_err();
        assert!(matches!(err, BrownoutError::Validation(_)));
        let err = c.update_mode(&sample(f64::NAN, 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, BrownoutError::Validation(_)));

        assert_eq!(c.current_mode(), before.current_mode);
        assert_eq!(c.last_transition(), before.last_transition);
        assert_eq!(c.counters().samples_evaluated, 1);
    }

    #[test]
    fn test_threshold_inversion_rejected_and_unchanged() {
        let c = BrownoutController::with_defaults();
        let before = c.thresholds();
        let patch: ThresholdsPatch =
            serde_json::from_str(r#"{"soft": {"latency_p95": 6000}}"#).unwrap();
        let err = c.update_thresholds(&patch).unwrap_err();
        assert!(matches!(err, BrownoutError::Configuration(_)));
        assert_eq!(c.thresholds(), before);
    }

    #[test]
    fn test_out_of_range_threshold_is_validation_error() {
        let c = BrownoutController::with_defaults();
        let before = c.thresholds();
        let patch: ThresholdsPatch =
            serde_json::from_str(r#"{"soft": {"latency_p95": -5}}"#).unwrap();
        let err = c.update_thresholds(&patch).unwrap_err();
        assert!(matches!(err, BrownoutError::Validation(_)), "{err:?}");
        assert_eq!(err.code(), "BAD_REQUEST");
        assert_eq!(c.thresholds(), before);
    }

    #[test]
    fn test_threshold_update_applies_to_next_sample() {
        let c = BrownoutController::with_defaults();
        let patch: ThresholdsPatch =
            serde_json::from_str(r#"{"soft": {"latency_p95": 1500}}"#).unwrap();
        let t = c.update_thresholds(&patch).unwrap();
        assert_eq!(t.soft.latency_p95_ms, 1500.0);
        assert_eq!(c.current_mode(), BrownoutMode::Normal);
        c.update_mode(&sample(1_600.0, 0.0, 0.0)).unwrap();
        assert_eq!(c.current_mode(), BrownoutMode::Soft);
    }

    #[test]
    fn test_force_mode_sets_exact_mode() {
        let c = BrownoutController::with_defaults();
        for mode in [
            BrownoutMode::Hard,
            BrownoutMode::Soft,
            BrownoutMode::Emergency,
            BrownoutMode::Normal,
        ] {
            let change = c.force_mode(mode, "test");
            assert_eq!(change.current, mode);
            assert_eq!(c.current_mode(), mode);
        }
    }

    #[test]
    fn test_activation_counters() {
        let c = BrownoutController::with_defaults();
        c.force_mode(BrownoutMode::Soft, "a");
        c.force_mode(BrownoutMode::Soft, "same mode again");
        c.force_mode(BrownoutMode::Emergency, "b");
        c.force_mode(BrownoutMode::Soft, "c");
        let counters = c.counters();
        assert_eq!(counters.activations(BrownoutMode::Soft), 2);
        assert_eq!(counters.activations(BrownoutMode::Emergency), 1);
        assert_eq!(counters.activations(BrownoutMode::Normal), 0);
        assert_eq!(counters.samples_evaluated, 4);
    }

    #[test]
    fn test_new_rejects_inverted_tables() {
        let mut t = BrownoutThresholds::default();
        t.soft.error_rate = 0.3;
        let err = BrownoutController::new(t, LlmProfiles::default()).unwrap_err();
        assert!(matches!(err, BrownoutError::Configuration(_)));
    }

    #[test]
    fn test_cooldown_holds_de_escalation() {
        let c = BrownoutController::with_defaults().with_cooldown(Cooldown::from_secs(60));
        let t0 = Utc::now();
        c.update_mode(&SystemMetrics::at(6_000.0, 0.0, 0.0, t0)).unwrap();
        assert_eq!(c.current_mode(), BrownoutMode::Hard);

        let change = c
            .update_mode(&SystemMetrics::at(100.0, 0.0, 0.0, t0 + Duration::seconds(10)))
            .unwrap();
        assert!(change.held());
        assert_eq!(change.evaluated, BrownoutMode::Normal);
        assert_eq!(c.current_mode(), BrownoutMode::Hard);

        // Escalation inside the window is immediate
        c.update_mode(&SystemMetrics::at(0.0, 0.3, 0.0, t0 + Duration::seconds(20)))
            .unwrap();
        assert_eq!(c.current_mode(), BrownoutMode::Emergency);

        // Window restarts at the last transition
        c.update_mode(&SystemMetrics::at(100.0, 0.0, 0.0, t0 + Duration::seconds(70)))
            .unwrap();
        assert_eq!(c.current_mode(), BrownoutMode::Emergency);
        c.update_mode(&SystemMetrics::at(100.0, 0.0, 0.0, t0 + Duration::seconds(80)))
            .unwrap();
        assert_eq!(c.current_mode(), BrownoutMode::Normal);
    }

    #[test]
    fn test_force_mode_bypasses_cooldown_alert_does_not() {
        let c = BrownoutController::with_defaults().with_cooldown(Cooldown::from_secs(3_600));
        c.force_mode(BrownoutMode::Emergency, "incident");

        let change = c.apply_alert(BrownoutMode::Soft, MetricDimension::ErrorRate);
        assert!(change.held());
        assert_eq!(c.current_mode(), BrownoutMode::Emergency);

        c.force_mode(BrownoutMode::Normal, "resolved");
        assert_eq!(c.current_mode(), BrownoutMode::Normal);
    }

    #[test]
    fn test_snapshot_is_consistent() {
        let c = BrownoutController::with_defaults();
        c.force_mode(BrownoutMode::Hard, "snapshot");
        let snap = c.snapshot();
        assert_eq!(snap.current_mode, BrownoutMode::Hard);
        assert_eq!(snap.llm_config, *c.profiles().for_mode(BrownoutMode::Hard));
    }
}
