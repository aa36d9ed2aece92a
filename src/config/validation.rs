//! Config validation: unknown-key detection with Levenshtein suggestions
//! and physical range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Unknown keys only warn; out-of-range values are errors.

use std::collections::HashSet;

use super::TunerConfig;

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

/// Returns the complete set of valid dotted key paths for `TunerConfig`.
///
/// Keys inside `[[coefficient]]` entries are listed once under the
/// `coefficient.` prefix. Any new field added to the config structs must be
/// added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        "tuning_order",
        // [tuner]
        "tuner",
        "tuner.enabled",
        "tuner.auto_optimize",
        "tuner.auto_advance",
        "tuner.poll_rate_hz",
        "tuner.min_samples_before_update",
        "tuner.telemetry_timeout_ms",
        "tuner.telemetry_failure_limit",
        "tuner.recent_score_window",
        // [safety]
        "safety",
        "safety.max_bad_samples",
        "safety.required_good_samples",
        // [limits]
        "limits",
        "limits.min_distance_m",
        "limits.max_distance_m",
        "limits.min_velocity_mps",
        "limits.max_velocity_mps",
        "limits.min_angle_rad",
        "limits.max_angle_rad",
        // [optimizer]
        "optimizer",
        "optimizer.kind",
        "optimizer.initial_points",
        "optimizer.seed",
        "optimizer.exploration_xi",
        "optimizer.candidate_count",
        "optimizer.min_step_ratio",
        "optimizer.noise_variance",
        // [server]
        "server",
        "server.addr",
        // [[coefficient]]
        "coefficient",
        "coefficient.name",
        "coefficient.enabled",
        "coefficient.min",
        "coefficient.max",
        "coefficient.kind",
        "coefficient.initial",
        "coefficient.step_size",
        "coefficient.step_decay_rate",
        "coefficient.min_write_interval_secs",
        "coefficient.telemetry_key",
        "coefficient.reducer",
        "coefficient.description",
        // [coefficient.convergence]
        "coefficient.convergence",
        "coefficient.convergence.max_iterations",
        "coefficient.convergence.target_score",
        "coefficient.convergence.plateau_window",
        "coefficient.convergence.plateau_epsilon",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`. Arrays of tables contribute their members' keys
/// under the array's own path, so `[[coefficient]]` entries all map onto
/// `coefficient.*`.
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
            match v {
                toml::Value::Table(_) => keys.extend(walk_toml_keys(v, &path)),
                toml::Value::Array(items) => {
                    for item in items.iter().filter(|i| i.is_table()) {
                        for nested in walk_toml_keys(item, &path) {
                            if !keys.contains(&nested) {
                                keys.push(nested);
                            }
                        }
                    }
                }
                _ => {}
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
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for &k in known {
        let dist = levenshtein(unknown, k);
        if dist > 3 {
            continue;
        }
        // Ties break alphabetically so suggestions are stable across runs
        let better = match best {
            None => true,
            Some((best_key, best_dist)) => dist < best_dist || (dist == best_dist && k < best_key),
        };
        if better {
            best = Some((k, dist));
        }
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys; parse errors are left to serde.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    let known = known_config_keys();
    let mut warnings = Vec::new();

    for key in walk_toml_keys(&value, "") {
        if !known.contains(key.as_str()) {
            let suggestion = suggest_correction(&key, &known);
            let message = format!("Unknown config key '{key}'");
            warnings.push(ValidationWarning {
                field: key,
                message,
                suggestion,
            });
        }
    }

    warnings
}

// ============================================================================
// Physical Range Validation
// ============================================================================

/// Validate plausibility limits and loop timing on a parsed config.
///
/// Returns (errors, warnings). Errors are impossible values that must
/// prevent startup; warnings are suspicious but not fatal.
pub fn validate_physical_ranges(config: &TunerConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let l = &config.limits;
    let pairs = [
        ("distance_m", l.min_distance_m, l.max_distance_m),
        ("velocity_mps", l.min_velocity_mps, l.max_velocity_mps),
        ("angle_rad", l.min_angle_rad, l.max_angle_rad),
    ];
    for (name, min, max) in pairs {
        if !min.is_finite() || !max.is_finite() {
            errors.push(format!("limits.*_{name} must be finite (min = {min}, max = {max})"));
        } else if min >= max {
            errors.push(format!(
                "limits.min_{name} = {min} must be below limits.max_{name} = {max}"
            ));
        }
    }

    if l.min_distance_m < 0.0 {
        errors.push(format!("limits.min_distance_m = {} cannot be negative", l.min_distance_m));
    }

    // Launch angle beyond vertical is not a plausible reading
    if l.max_angle_rad > std::f64::consts::PI {
        warnings.push(ValidationWarning {
            field: "limits.max_angle_rad".to_string(),
            message: format!("limits.max_angle_rad = {:.3} exceeds pi", l.max_angle_rad),
            suggestion: None,
        });
    }

    // Telemetry timeout should fit inside one tick
    let t = &config.tuner;
    if t.poll_rate_hz > 0.0 {
        let period_ms = 1000.0 / t.poll_rate_hz;
        if t.telemetry_timeout_ms as f64 >= period_ms {
            warnings.push(ValidationWarning {
                field: "tuner.telemetry_timeout_ms".to_string(),
                message: format!(
                    "tuner.telemetry_timeout_ms = {} is not shorter than one tick ({:.0} ms)",
                    t.telemetry_timeout_ms, period_ms
                ),
                suggestion: None,
            });
        }
        if t.poll_rate_hz > 100.0 {
            warnings.push(ValidationWarning {
                field: "tuner.poll_rate_hz".to_string(),
                message: format!("tuner.poll_rate_hz = {} is unusually high", t.poll_rate_hz),
                suggestion: None,
            });
        }
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("hello", "hello"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("poll_rate_hs", "poll_rate_hz"), 1);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [tuner]
            poll_rate_hz = 10.0
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"tuner".to_string()));
        assert!(keys.contains(&"tuner.poll_rate_hz".to_string()));
    }

    #[test]
    fn test_walk_toml_keys_array_of_tables() {
        let toml: toml::Value = r#"
            [[coefficient]]
            name = "a"
            [coefficient.convergence]
            max_iterations = 3

            [[coefficient]]
            name = "b"
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"coefficient.name".to_string()));
        assert!(keys.contains(&"coefficient.convergence.max_iterations".to_string()));
        assert_eq!(keys.iter().filter(|k| *k == "coefficient.name").count(), 1);
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let toml_str = r#"
[tuner]
poll_rate_hs = 10.0
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].field.contains("poll_rate_hs"));
        assert_eq!(warnings[0].suggestion.as_deref(), Some("tuner.poll_rate_hz"));
    }

    #[test]
    fn test_coefficient_typo_is_caught() {
        let toml_str = r#"
[[coefficient]]
name = "kDrag"
step_sise = 0.1
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].suggestion.as_deref(), Some("coefficient.step_size"));
    }

    #[test]
    fn test_all_valid_keys_produce_zero_warnings() {
        let text = TunerConfig::default().to_toml().unwrap();
        let warnings = validate_unknown_keys(&text);
        assert!(warnings.is_empty(), "Expected 0 warnings, got: {:?}", warnings);
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        assert!(suggest_correction("completely_unrelated_garbage_key_xyz", &known).is_none());
    }

    #[test]
    fn test_inverted_limits_are_errors() {
        let mut config = TunerConfig::default();
        config.limits.min_velocity_mps = 40.0;
        let (errors, _) = validate_physical_ranges(&config);
        assert!(errors.iter().any(|e| e.contains("velocity_mps")));
    }

    #[test]
    fn test_slow_telemetry_timeout_warns() {
        let mut config = TunerConfig::default();
        config.tuner.telemetry_timeout_ms = 500;
        let (errors, warnings) = validate_physical_ranges(&config);
        assert!(errors.is_empty());
        assert!(warnings.iter().any(|w| w.field == "tuner.telemetry_timeout_ms"));
    }

    #[test]
    fn test_physical_range_defaults_clean() {
        let (errors, warnings) = validate_physical_ranges(&TunerConfig::default());
        assert!(errors.is_empty(), "{:?}", errors);
        assert!(warnings.is_empty(), "{:?}", warnings);
    }
}
