//! Config validation: unknown-key detection with Levenshtein suggestions
//! and operational range warnings.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for BalancerConfig.
///
/// Maintained by hand to match the struct hierarchy in balancer_config.rs.
/// Any new field added to BalancerConfig must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [server]
        "server",
        "server.addr",
        // [thresholds]
        "thresholds",
        "thresholds.soft",
        "thresholds.soft.latency_p95",
        "thresholds.soft.error_rate",
        "thresholds.soft.token_cost_per_hour",
        "thresholds.soft.latency_p95_ms",
        "thresholds.soft.cost",
        "thresholds.hard",
        "thresholds.hard.latency_p95",
        "thresholds.hard.error_rate",
        "thresholds.hard.token_cost_per_hour",
        "thresholds.hard.latency_p95_ms",
        "thresholds.hard.cost",
        "thresholds.emergency",
        "thresholds.emergency.latency_p95",
        "thresholds.emergency.error_rate",
        "thresholds.emergency.token_cost_per_hour",
        "thresholds.emergency.latency_p95_ms",
        "thresholds.emergency.cost",
        // [controller]
        "controller",
        "controller.cooldown_secs",
        // [llm_profiles]
        "llm_profiles",
        "llm_profiles.normal",
        "llm_profiles.normal.max_tokens",
        "llm_profiles.normal.temperature",
        "llm_profiles.normal.complexity",
        "llm_profiles.normal.features",
        "llm_profiles.normal.response_style",
        "llm_profiles.soft",
        "llm_profiles.soft.max_tokens",
        "llm_profiles.soft.temperature",
        "llm_profiles.soft.complexity",
        "llm_profiles.soft.features",
        "llm_profiles.soft.response_style",
        "llm_profiles.hard",
        "llm_profiles.hard.max_tokens",
        "llm_profiles.hard.temperature",
        "llm_profiles.hard.complexity",
        "llm_profiles.hard.features",
        "llm_profiles.hard.response_style",
        "llm_profiles.emergency",
        "llm_profiles.emergency.max_tokens",
        "llm_profiles.emergency.temperature",
        "llm_profiles.emergency.complexity",
        "llm_profiles.emergency.features",
        "llm_profiles.emergency.response_style",
        // [sampler]
        "sampler",
        "sampler.enabled",
        "sampler.interval_secs",
        "sampler.source",
        "sampler.seed",
        "sampler.replay_path",
        // [history]
        "history",
        "history.capacity",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1)
                .min(curr[j] + 1)
                .min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for &k in known {
        let dist = levenshtein(unknown, k);
        if dist <= 3 {
            if let Some((_, best_dist)) = best {
                if dist < best_dist {
                    best = Some((k, dist));
                }
            } else {
                best = Some((k, dist));
            }
        }
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns. Whether the file
/// then loads is decided by the serde pass.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // reported by the serde pass
    };

    let known = known_config_keys();
    let found = walk_toml_keys(&value, "");
    let mut warnings = Vec::new();

    for key in &found {
        if !known.contains(key.as_str()) {
            let suggestion = suggest_correction(key, &known);
            let message = format!("Unknown config key '{key}'");
            warnings.push(ValidationWarning {
                field: key.clone(),
                message,
                suggestion,
            });
        }
    }

    warnings
}

// ============================================================================
// Operational Range Warnings
// ============================================================================

/// Cooldown windows longer than this keep a recovered system degraded for
/// an unusually long time.
const COOLDOWN_WARN_SECS: u64 = 3_600;

/// Soft error-rate bounds above this leave most failures unnoticed.
const SOFT_ERROR_RATE_WARN: f64 = 0.5;

/// Check values that are legal but suspicious. Never fatal.
pub fn validate_operational_ranges(config: &super::BalancerConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let cooldown = config.controller.cooldown_secs;
    if cooldown > COOLDOWN_WARN_SECS {
        warnings.push(ValidationWarning {
            field: "controller.cooldown_secs".to_string(),
            message: format!(
                "controller.cooldown_secs = {cooldown} holds de-escalation for over an hour"
            ),
            suggestion: None,
        });
    }

    let soft_errors = config.thresholds.soft.error_rate;
    if soft_errors > SOFT_ERROR_RATE_WARN {
        warnings.push(ValidationWarning {
            field: "thresholds.soft.error_rate".to_string(),
            message: format!(
                "thresholds.soft.error_rate = {soft_errors:.2} tolerates a majority of failed requests before degrading"
            ),
            suggestion: None,
        });
    }

    if config.sampler.enabled && config.sampler.interval_secs > config.history.capacity as u64 * 60 {
        warnings.push(ValidationWarning {
            field: "sampler.interval_secs".to_string(),
            message: format!(
                "sampler.interval_secs = {} is longer than the history window can chart",
                config.sampler.interval_secs
            ),
            suggestion: None,
        });
    }

    warnings
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("soft", "soft"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("emergncy", "emergency"), 1);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [thresholds]
            [thresholds.soft]
            latency_p95 = 2000.0
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"thresholds".to_string()));
        assert!(keys.contains(&"thresholds.soft".to_string()));
        assert!(keys.contains(&"thresholds.soft.latency_p95".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let toml_str = r#"
[controller]
cooldown_sec = 30
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "controller.cooldown_sec");
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("controller.cooldown_secs")
        );
    }

    #[test]
    fn test_all_valid_keys_produce_zero_warnings() {
        let toml_str = r#"
[server]
addr = "127.0.0.1:9000"

[thresholds.hard]
error_rate = 0.12

[llm_profiles.soft]
max_tokens = 400
features = ["streaming"]

[sampler]
enabled = true
seed = 42
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.is_empty(), "Expected 0 warnings, got: {:?}", warnings);
    }

    #[test]
    fn test_unknown_section_produces_warning() {
        let toml_str = r#"
[thresholds.critical]
latency_p95 = 42
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.iter().any(|w| w.field.contains("critical")));
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        assert!(suggest_correction("completely_unrelated_garbage_key_xyz", &known).is_none());
    }

    #[test]
    fn test_operational_defaults_clean() {
        let config = crate::config::BalancerConfig::default();
        let warnings = validate_operational_ranges(&config);
        assert!(warnings.is_empty(), "{:?}", warnings);
    }

    #[test]
    fn test_long_cooldown_warns() {
        let mut config = crate::config::BalancerConfig::default();
        config.controller.cooldown_secs = 7_200;
        let warnings = validate_operational_ranges(&config);
        assert!(warnings.iter().any(|w| w.field == "controller.cooldown_secs"));
    }

    #[test]
    fn test_lax_soft_error_rate_warns() {
        let mut config = crate::config::BalancerConfig::default();
        config.thresholds.soft.error_rate = 0.6;
        config.thresholds.hard.error_rate = 0.7;
        config.thresholds.emergency.error_rate = 0.8;
        let warnings = validate_operational_ranges(&config);
        assert!(warnings.iter().any(|w| w.field == "thresholds.soft.error_rate"));
    }
}
