//! Config Validation Tests
//!
//! Exercises loading, typo detection and range validation of
//! `tuner_config.toml` independently from the tuning loop.

use std::io::Write;
use std::path::Path;

use tuneloop::config::validation::{
    known_config_keys, suggest_correction, validate_physical_ranges, validate_unknown_keys,
};
use tuneloop::config::{ConfigError, TunerConfig};

const TWO_COEFFICIENTS: &str = r#"
tuning_order = ["kLift", "kDrag"]

[tuner]
poll_rate_hz = 20.0
min_samples_before_update = 4
telemetry_timeout_ms = 20

[safety]
max_bad_samples = 8
required_good_samples = 2

[[coefficient]]
name = "kDrag"
min = 0.001
max = 0.01
initial = 0.003
step_size = 0.001
telemetry_key = "/Tuning/kDrag"
min_write_interval_secs = 0.5

[[coefficient]]
name = "kLift"
min = 0.0
max = 0.5
initial = 0.1
step_size = 0.05
telemetry_key = "/Tuning/kLift"
reducer = "mean_score"

[coefficient.convergence]
max_iterations = 12
"#;

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn full_file_loads_and_orders_sequence() {
    let file = write_temp(TWO_COEFFICIENTS);
    let config = TunerConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.tuner.poll_rate_hz, 20.0);
    assert_eq!(config.tuner.min_samples_before_update, 4);
    assert_eq!(config.safety.max_bad_samples, 8);

    let registry = config.registry().unwrap();
    let order: Vec<&str> = registry.tuning_sequence().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(order, vec!["kLift", "kDrag"]);

    let lift = registry.get("kLift").unwrap();
    assert_eq!(lift.convergence.max_iterations, 12);
    // Omitted fields fall back to defaults
    assert!(lift.enabled);
    assert_eq!(lift.step_decay_rate, 0.9);
}

#[test]
fn missing_explicit_path_is_an_error() {
    let result = TunerConfig::load(Some(Path::new("/nonexistent/tuner_config.toml")));
    assert!(matches!(result, Err(ConfigError::Io(_, _))));
}

#[test]
fn malformed_toml_reports_parse_error_with_path() {
    let file = write_temp("[tuner\npoll_rate_hz = ");
    match TunerConfig::load_from_file(file.path()) {
        Err(ConfigError::Parse(path, _)) => assert_eq!(path, file.path()),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn config_round_trips_through_toml() {
    let config = TunerConfig::default();
    let text = config.to_toml().unwrap();
    let reparsed = TunerConfig::from_toml_str(&text).unwrap();
    assert_eq!(reparsed.coefficients, config.coefficients);
    assert_eq!(reparsed.tuning_order, config.tuning_order);
}

#[test]
fn built_in_defaults_are_valid() {
    TunerConfig::default().validate().unwrap();
}

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_tuner_section_warns_with_suggestion() {
    let toml_str = r#"
[tuner]
pol_rate_hz = 5.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("pol_rate_hz"));
    assert_eq!(warnings[0].suggestion.as_deref(), Some("tuner.poll_rate_hz"));
}

#[test]
fn typo_inside_coefficient_table_warns() {
    let toml_str = r#"
[[coefficient]]
name = "kDrag"
mn = 0.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field, "coefficient.mn");
    assert_eq!(warnings[0].suggestion.as_deref(), Some("coefficient.min"));
}

#[test]
fn valid_config_produces_zero_warnings() {
    assert!(validate_unknown_keys(TWO_COEFFICIENTS).is_empty());
}

#[test]
fn unrelated_key_has_no_suggestion() {
    let warnings = validate_unknown_keys("[telemetry_bridge]\nendpoint = \"nt://robot\"\n");
    assert!(!warnings.is_empty());
    assert!(warnings.iter().all(|w| w.suggestion.is_none()));
}

#[test]
fn unknown_keys_do_not_fail_loading() {
    let contents = format!("{TWO_COEFFICIENTS}\n[server]\nadress = \"0.0.0.0:9000\"\n");
    let config = TunerConfig::from_toml_str(&contents).unwrap();
    assert_eq!(config.coefficients.len(), 2);
}

#[test]
fn suggestion_is_stable_for_known_keys() {
    let known = known_config_keys();
    assert_eq!(
        suggest_correction("safety.max_bad_sample", &known).as_deref(),
        Some("safety.max_bad_samples")
    );
    assert_eq!(suggest_correction("completely.different.thing", &known), None);
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn inverted_limits_are_errors() {
    let mut config = TunerConfig::default();
    config.limits.min_velocity_mps = 40.0;
    config.limits.max_velocity_mps = 5.0;
    let (errors, _) = validate_physical_ranges(&config);
    assert!(errors.iter().any(|e| e.contains("velocity_mps")));
    assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
}

#[test]
fn slow_timeout_is_only_a_warning() {
    let mut config = TunerConfig::default();
    config.tuner.poll_rate_hz = 10.0;
    config.tuner.telemetry_timeout_ms = 150;
    let (errors, warnings) = validate_physical_ranges(&config);
    assert!(errors.is_empty());
    assert!(warnings.iter().any(|w| w.field == "tuner.telemetry_timeout_ms"));
    config.validate().unwrap();
}

#[test]
fn bad_coefficient_rows_are_all_reported() {
    let contents = r#"
[[coefficient]]
name = "kA"
min = 1.0
max = 0.0
initial = 0.5
step_size = 0.1
telemetry_key = "/Tuning/kA"

[[coefficient]]
name = "kA"
min = 0.0
max = 1.0
initial = 3.0
step_size = 0.1
telemetry_key = ""
"#;
    let Err(ConfigError::Validation(errors)) = TunerConfig::from_toml_str(contents) else {
        panic!("expected validation errors");
    };
    assert!(errors.iter().any(|e| e.contains("must be below max")));
    assert!(errors.iter().any(|e| e.contains("duplicate coefficient name")));
    assert!(errors.iter().any(|e| e.contains("outside")));
    assert!(errors.iter().any(|e| e.contains("telemetry_key is empty")));
}

#[test]
fn tuning_order_with_unknown_name_is_rejected() {
    let contents = TWO_COEFFICIENTS.replace(r#"["kLift", "kDrag"]"#, r#"["kLift", "kSpin"]"#);
    let Err(ConfigError::Validation(errors)) = TunerConfig::from_toml_str(&contents) else {
        panic!("expected validation errors");
    };
    assert!(errors.iter().any(|e| e.contains("kSpin")));
}

#[test]
fn zero_min_samples_is_rejected() {
    let mut config = TunerConfig::default();
    config.tuner.min_samples_before_update = 0;
    let Err(ConfigError::Validation(errors)) = config.validate() else {
        panic!("expected validation errors");
    };
    assert!(errors.iter().any(|e| e.contains("min_samples_before_update")));
}
