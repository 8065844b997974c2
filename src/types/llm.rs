//! LLM request behavior profiles keyed by brownout mode

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::BrownoutMode;

/// Response complexity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    High,
    Medium,
    Low,
    Minimal,
}

impl Complexity {
    /// Higher is richer.
    pub const fn richness(self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
            Self::Minimal => 0,
        }
    }
}

/// Behavior profile applied to LLM requests while a mode is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Output token budget per request
    pub max_tokens: u32,
    /// Sampling temperature (0.0-1.0)
    pub temperature: f64,
    pub complexity: Complexity,
    /// Optional capabilities still enabled in this mode
    #[serde(default)]
    pub features: BTreeSet<String>,
    /// Style hint for the system prompt ("comprehensive", "concise", ...)
    #[serde(default)]
    pub response_style: String,
}

impl LlmConfig {
    fn build(
        max_tokens: u32,
        temperature: f64,
        complexity: Complexity,
        features: &[&str],
        response_style: &str,
    ) -> Self {
        Self {
            max_tokens,
            temperature,
            complexity,
            features: features.iter().map(|f| (*f).to_string()).collect(),
            response_style: response_style.to_string(),
        }
    }

    /// Built-in profile for a mode.
    pub fn default_for(mode: BrownoutMode) -> Self {
        match mode {
            BrownoutMode::Normal => Self::build(
                1000,
                0.7,
                Complexity::High,
                &[
                    "code_generation",
                    "detailed_reasoning",
                    "extended_context",
                    "follow_up_suggestions",
                    "streaming",
                ],
                "comprehensive",
            ),
            BrownoutMode::Soft => Self::build(
                500,
                0.5,
                Complexity::Medium,
                &["code_generation", "extended_context", "streaming"],
                "concise",
            ),
            BrownoutMode::Hard => {
                Self::build(200, 0.3, Complexity::Low, &["streaming"], "brief")
            }
            BrownoutMode::Emergency => {
                Self::build(50, 0.1, Complexity::Minimal, &[], "essential")
            }
        }
    }
}

fn default_normal_profile() -> LlmConfig {
    LlmConfig::default_for(BrownoutMode::Normal)
}
fn default_soft_profile() -> LlmConfig {
    LlmConfig::default_for(BrownoutMode::Soft)
}
fn default_hard_profile() -> LlmConfig {
    LlmConfig::default_for(BrownoutMode::Hard)
}
fn default_emergency_profile() -> LlmConfig {
    LlmConfig::default_for(BrownoutMode::Emergency)
}

/// Mode to profile table.
///
/// Richness must strictly decrease with severity; see [`LlmProfiles::problems`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmProfiles {
    #[serde(default = "default_normal_profile")]
    pub normal: LlmConfig,
    #[serde(default = "default_soft_profile")]
    pub soft: LlmConfig,
    #[serde(default = "default_hard_profile")]
    pub hard: LlmConfig,
    #[serde(default = "default_emergency_profile")]
    pub emergency: LlmConfig,
}

impl Default for LlmProfiles {
    fn default() -> Self {
        Self {
            normal: default_normal_profile(),
            soft: default_soft_profile(),
            hard: default_hard_profile(),
            emergency: default_emergency_profile(),
        }
    }
}

impl LlmProfiles {
    pub const fn for_mode(&self, mode: BrownoutMode) -> &LlmConfig {
        match mode {
            BrownoutMode::Normal => &self.normal,
            BrownoutMode::Soft => &self.soft,
            BrownoutMode::Hard => &self.hard,
            BrownoutMode::Emergency => &self.emergency,
        }
    }

    /// Range checks plus the ordering rules between adjacent modes:
    /// - `max_tokens` strictly decreases
    /// - `temperature` never increases
    /// - `complexity` strictly decreases
    /// - each feature set is a subset of the previous one
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for mode in BrownoutMode::ALL {
            let p = self.for_mode(mode);
            if p.max_tokens == 0 {
                problems.push(format!("llm_profiles.{mode}.max_tokens must be > 0"));
            }
            if !p.temperature.is_finite() || !(0.0..=1.0).contains(&p.temperature) {
                problems.push(format!(
                    "llm_profiles.{mode}.temperature must be within [0, 1] (got {})",
                    p.temperature
                ));
            }
        }

        for pair in BrownoutMode::ALL.windows(2) {
            let (richer_mode, leaner_mode) = (pair[0], pair[1]);
            let (richer, leaner) = (self.for_mode(richer_mode), self.for_mode(leaner_mode));

            if leaner.max_tokens >= richer.max_tokens {
                problems.push(format!(
                    "llm_profiles: {leaner_mode}.max_tokens ({}) must be less than {richer_mode}.max_tokens ({})",
                    leaner.max_tokens, richer.max_tokens
                ));
            }
            if leaner.temperature > richer.temperature {
                problems.push(format!(
                    "llm_profiles: {leaner_mode}.temperature ({}) must not exceed {richer_mode}.temperature ({})",
                    leaner.temperature, richer.temperature
                ));
            }
            if leaner.complexity.richness() >= richer.complexity.richness() {
                problems.push(format!(
                    "llm_profiles: {leaner_mode}.complexity ({:?}) must be lower than {richer_mode}.complexity ({:?})",
                    leaner.complexity, richer.complexity
                ));
            }
            let extra: Vec<&str> = leaner
                .features
                .difference(&richer.features)
                .map(String::as_str)
                .collect();
            if !extra.is_empty() {
                problems.push(format!(
                    "llm_profiles: {leaner_mode} enables features not in {richer_mode}: {}",
                    extra.join(", ")
                ));
            }
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profiles_validate() {
        let profiles = LlmProfiles::default();
        assert!(profiles.problems().is_empty(), "{:?}", profiles.problems());
    }

    #[test]
    fn test_default_budgets() {
        let p = LlmProfiles::default();
        assert_eq!(p.normal.max_tokens, 1000);
        assert_eq!(p.soft.max_tokens, 500);
        assert_eq!(p.hard.max_tokens, 200);
        assert_eq!(p.emergency.max_tokens, 50);
        assert_eq!(p.emergency.complexity, Complexity::Minimal);
        assert!(p.emergency.features.is_empty());
    }

    #[test]
    fn test_richer_degraded_profile_rejected() {
        let mut p = LlmProfiles::default();
        p.hard.max_tokens = 800;
        p.hard.features.insert("web_search".to_string());
        let problems = p.problems();
        assert!(problems.iter().any(|m| m.contains("hard.max_tokens")));
        assert!(problems.iter().any(|m| m.contains("web_search")));
    }

    #[test]
    fn test_temperature_range_checked() {
        let mut p = LlmProfiles::default();
        p.normal.temperature = 1.4;
        assert!(p.problems().iter().any(|m| m.contains("normal.temperature")));
    }

    #[test]
    fn test_complexity_serde() {
        let v = serde_json::to_value(LlmConfig::default_for(BrownoutMode::Soft)).unwrap();
        assert_eq!(v["complexity"], "medium");
        assert_eq!(v["max_tokens"], 500);
    }
}
