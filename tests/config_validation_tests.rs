//! Config Validation Tests
//!
//! Typo detection, operational range warnings and file loading for
//! `balancer.toml`, exercised independently from the HTTP surface.

use open_balancer::config::validation::{
    known_config_keys, suggest_correction, validate_operational_ranges, validate_unknown_keys,
};
use open_balancer::config::{BalancerConfig, ConfigError, SamplerSource};
use open_balancer::{BrownoutController, BrownoutMode};

use std::io::Write;

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_threshold_field_warns_with_suggestion() {
    let toml_str = r#"
[thresholds.soft]
latncy_p95 = 1500.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("latncy_p95"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("thresholds.soft.latency_p95")
    );
}

#[test]
fn typo_in_section_name_warns() {
    let toml_str = r#"
[controler]
cooldown_secs = 30
"#;
    let warnings = validate_unknown_keys(toml_str);
    // The table and its child are both unknown
    assert!(warnings.iter().any(|w| w.field == "controler"
        && w.suggestion.as_deref() == Some("controller")));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[server]
addr = "127.0.0.1:9090"

[thresholds.soft]
latency_p95 = 1500.0
error_rate = 0.04
token_cost_per_hour = 40.0

[thresholds.emergency]
latency_p95 = 12000.0

[controller]
cooldown_secs = 60

[llm_profiles.normal]
max_tokens = 2000

[sampler]
enabled = true
interval_secs = 30
source = "synthetic"
seed = 7

[history]
capacity = 720
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
}

#[test]
fn threshold_aliases_produce_zero_warnings() {
    let toml_str = r#"
[thresholds.soft]
latency_p95_ms = 1500.0
cost = 40.0

[thresholds.hard]
latency_p95_ms = 4000.0
cost = 90.0

[thresholds.emergency]
latency_p95_ms = 9000.0
cost = 180.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");

    let config = BalancerConfig::from_toml_str(toml_str).unwrap();
    assert_eq!(config.thresholds.soft.latency_p95_ms, 1_500.0);
    assert_eq!(config.thresholds.hard.token_cost_per_hour, 90.0);
    assert_eq!(config.thresholds.emergency.latency_p95_ms, 9_000.0);
}

#[test]
fn far_off_key_has_no_suggestion() {
    let warnings = validate_unknown_keys("completely_unrelated_key = 1\n");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].suggestion.is_none());
}

#[test]
fn suggestion_prefers_closest_key() {
    let known = known_config_keys();
    assert_eq!(
        suggest_correction("history.capacty", &known).as_deref(),
        Some("history.capacity")
    );
    assert_eq!(suggest_correction("zzzzzzzzzzzz", &known), None);
}

#[test]
fn malformed_toml_yields_no_key_warnings() {
    assert!(validate_unknown_keys("[thresholds\nsoft = ").is_empty());
}

#[test]
fn warning_display_includes_suggestion() {
    let warnings = validate_unknown_keys("[sampler]\nintervl_secs = 5\n");
    assert_eq!(warnings.len(), 1);
    let text = warnings[0].to_string();
    assert!(text.contains("Unknown config key 'sampler.intervl_secs'"));
    assert!(text.contains("did you mean 'sampler.interval_secs'?"));
}

// ============================================================================
// Operational Range Warnings
// ============================================================================

#[test]
fn defaults_have_no_range_warnings() {
    assert!(validate_operational_ranges(&BalancerConfig::default()).is_empty());
}

#[test]
fn long_cooldown_warns() {
    let mut config = BalancerConfig::default();
    config.controller.cooldown_secs = 7_200;
    let warnings = validate_operational_ranges(&config);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field, "controller.cooldown_secs");
}

#[test]
fn huge_cooldown_loads_and_builds_controller() {
    let config =
        BalancerConfig::from_toml_str("[controller]\ncooldown_secs = 10000000000000000\n").unwrap();
    assert!(config.validate().is_ok());

    let controller = BrownoutController::from_config(&config).unwrap();
    assert!(controller.cooldown().is_some());
    assert!(!validate_operational_ranges(&config).is_empty());
}

#[test]
fn permissive_soft_error_rate_warns() {
    let mut config = BalancerConfig::default();
    config.thresholds.soft.error_rate = 0.6;
    config.thresholds.hard.error_rate = 0.7;
    config.thresholds.emergency.error_rate = 0.8;
    let warnings = validate_operational_ranges(&config);
    assert!(warnings
        .iter()
        .any(|w| w.field == "thresholds.soft.error_rate"));
    // Legal, so the config still validates
    assert!(config.validate().is_ok());
}

// ============================================================================
// Hard Validation
// ============================================================================

#[test]
fn inverted_thresholds_fail_validation() {
    let err = BalancerConfig::from_toml_str(
        r#"
[thresholds.soft]
latency_p95 = 6000.0
"#,
    )
    .unwrap_err();

    match err {
        ConfigError::Validation(problems) => {
            assert!(problems.iter().any(|p| p.contains("latency_p95")), "{problems:?}");
        }
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn every_problem_is_reported() {
    let err = BalancerConfig::from_toml_str(
        r#"
[server]
addr = "not-an-address"

[sampler]
interval_secs = 0

[history]
capacity = 0
"#,
    )
    .unwrap_err();

    let ConfigError::Validation(problems) = err else {
        panic!("expected validation error");
    };
    assert_eq!(problems.len(), 3, "{problems:?}");
}

#[test]
fn replay_source_requires_path() {
    let err = BalancerConfig::from_toml_str("[sampler]\nsource = \"replay\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));

    let config = BalancerConfig::from_toml_str(
        "[sampler]\nsource = \"replay\"\nreplay_path = \"samples.jsonl\"\n",
    )
    .unwrap();
    assert_eq!(config.sampler.source, SamplerSource::Replay);
}

#[test]
fn profile_ordering_enforced() {
    let err = BalancerConfig::from_toml_str(
        r#"
[llm_profiles.soft]
max_tokens = 5000
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn wrong_type_is_parse_error() {
    let err = BalancerConfig::from_toml_str("[history]\ncapacity = \"lots\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(..)));
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn empty_file_yields_defaults() {
    let config = BalancerConfig::from_toml_str("").unwrap();
    assert_eq!(config.server.addr, "0.0.0.0:8080");
    assert_eq!(config.controller.cooldown_secs, 0);
    assert_eq!(config.history.capacity, 1_440);
    assert!(!config.sampler.enabled);
    assert_eq!(
        config.thresholds.for_mode(BrownoutMode::Hard).map(|t| t.latency_p95_ms),
        Some(5_000.0)
    );
}

#[test]
fn partial_thresholds_merge_with_defaults() {
    let config = BalancerConfig::from_toml_str(
        r#"
[thresholds.hard]
error_rate = 0.12
"#,
    )
    .unwrap();
    assert_eq!(config.thresholds.hard.error_rate, 0.12);
    assert_eq!(config.thresholds.hard.latency_p95_ms, 5_000.0);
    assert_eq!(config.thresholds.soft.error_rate, 0.05);
}

#[test]
fn load_from_file_roundtrips_through_to_toml() {
    let mut config = BalancerConfig::default();
    config.controller.cooldown_secs = 45;
    config.thresholds.soft.latency_p95_ms = 1_800.0;
    config.sampler.seed = Some(99);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(config.to_toml().unwrap().as_bytes()).unwrap();

    let loaded = BalancerConfig::load_from_file(file.path()).unwrap();
    assert_eq!(loaded.controller.cooldown_secs, 45);
    assert_eq!(loaded.thresholds, config.thresholds);
    assert_eq!(loaded.llm_profiles, config.llm_profiles);
    assert_eq!(loaded.sampler.seed, Some(99));
}

#[test]
fn load_from_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = BalancerConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(..)));
}

#[test]
fn parse_error_names_the_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"[server\naddr = 1").unwrap();

    let err = BalancerConfig::load_from_file(file.path()).unwrap_err();
    match err {
        ConfigError::Parse(path, _) => assert_eq!(path, file.path()),
        other => panic!("expected parse error, got {other}"),
    }
}
