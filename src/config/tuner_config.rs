//! Tuner Configuration - coefficient table, thresholds and toggles as TOML
//!
//! Every struct implements `Default` with values matching the built-in
//! constants in `defaults.rs`, so a missing config file still yields a
//! complete, valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;
use crate::optimization::OptimizerKind;
use crate::registry::CoefficientRegistry;
use crate::types::{CoefficientSpec, ConvergenceCriteria, ScoreReducer, ValueKind};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "TUNELOOP_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "tuner_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one tuning session.
///
/// Load with `TunerConfig::load()` which searches:
/// 1. An explicit path (`--config`)
/// 2. `$TUNELOOP_CONFIG`
/// 3. `./tuner_config.toml`
/// 4. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunerConfig {
    /// Coefficient names in tuning order. Empty means declaration order.
    #[serde(default)]
    pub tuning_order: Vec<String>,

    /// Global toggles and loop timing
    #[serde(default)]
    pub tuner: TunerSettings,

    /// Data-quality interlock
    #[serde(default)]
    pub safety: SafetyConfig,

    /// Physical plausibility bounds for samples
    #[serde(default)]
    pub limits: PhysicalLimits,

    /// Optimizer selection and tuning
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Control API
    #[serde(default)]
    pub server: ServerConfig,

    /// Coefficient definitions, one `[[coefficient]]` table each
    #[serde(default = "default_coefficients", rename = "coefficient")]
    pub coefficients: Vec<CoefficientSpec>,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            tuning_order: default_tuning_order(),
            tuner: TunerSettings::default(),
            safety: SafetyConfig::default(),
            limits: PhysicalLimits::default(),
            optimizer: OptimizerConfig::default(),
            server: ServerConfig::default(),
            coefficients: default_coefficients(),
        }
    }
}

impl TunerConfig {
    /// Load configuration using the standard search order.
    ///
    /// A config file that exists but fails to parse or validate is an error:
    /// the daemon must not start on a configuration it cannot trust.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        // 1. Explicit path
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), coefficients = config.coefficients.len(), "Loaded tuner config");
            return Ok(config);
        }

        // 2. Env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if !p.exists() {
                return Err(ConfigError::Io(
                    p,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "file named by TUNELOOP_CONFIG does not exist"),
                ));
            }
            let config = Self::load_from_file(&p)?;
            info!(path = %p.display(), "Loaded tuner config from TUNELOOP_CONFIG");
            return Ok(config);
        }

        // 3. ./tuner_config.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            info!("Loaded tuner config from ./tuner_config.toml");
            return Ok(config);
        }

        // 4. Defaults
        info!("No tuner_config.toml found, using built-in defaults");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        // Two-pass: check for unknown keys first (warnings only)
        for w in &super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Build the validated coefficient registry for this config.
    pub fn registry(&self) -> Result<CoefficientRegistry, ConfigError> {
        CoefficientRegistry::new(self.coefficients.clone(), self.tuning_order.clone())
    }

    /// Validate loop settings, safety parameters, limits and the
    /// coefficient table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let t = &self.tuner;
        if !t.poll_rate_hz.is_finite() || t.poll_rate_hz <= 0.0 {
            errors.push(format!("tuner.poll_rate_hz = {} must be > 0", t.poll_rate_hz));
        }
        if t.min_samples_before_update == 0 {
            errors.push("tuner.min_samples_before_update must be > 0".to_string());
        }
        if t.telemetry_timeout_ms == 0 {
            errors.push("tuner.telemetry_timeout_ms must be > 0".to_string());
        }
        if t.telemetry_failure_limit == 0 {
            errors.push("tuner.telemetry_failure_limit must be > 0".to_string());
        }

        if self.safety.required_good_samples == 0 {
            errors.push("safety.required_good_samples must be > 0".to_string());
        }

        let o = &self.optimizer;
        if o.initial_points == 0 {
            errors.push("optimizer.initial_points must be > 0".to_string());
        }
        if o.candidate_count < 8 {
            errors.push(format!("optimizer.candidate_count = {} must be >= 8", o.candidate_count));
        }
        if !(o.min_step_ratio > 0.0 && o.min_step_ratio <= 1.0) {
            errors.push(format!("optimizer.min_step_ratio = {} must be in (0, 1]", o.min_step_ratio));
        }
        if !o.exploration_xi.is_finite() || o.exploration_xi < 0.0 {
            errors.push(format!("optimizer.exploration_xi = {} must be >= 0", o.exploration_xi));
        }
        if !o.noise_variance.is_finite() || o.noise_variance <= 0.0 {
            errors.push(format!("optimizer.noise_variance = {} must be > 0", o.noise_variance));
        }

        let (range_errors, range_warnings) = super::validation::validate_physical_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        if let Err(ConfigError::Validation(registry_errors)) = self.registry() {
            errors.extend(registry_errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Tuner Settings
// ============================================================================

/// Global toggles and tick-loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunerSettings {
    /// Master enable; the operator toggle starts in this position
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Ask the optimizer for a new value after every update
    #[serde(default = "default_true")]
    pub auto_optimize: bool,

    /// Move to the next coefficient as soon as the current one converges
    #[serde(default = "default_true")]
    pub auto_advance: bool,

    #[serde(default = "default_poll_rate_hz")]
    pub poll_rate_hz: f64,

    #[serde(default = "default_min_samples_before_update")]
    pub min_samples_before_update: usize,

    #[serde(default = "default_telemetry_timeout_ms")]
    pub telemetry_timeout_ms: u64,

    #[serde(default = "default_telemetry_failure_limit")]
    pub telemetry_failure_limit: u32,

    #[serde(default = "default_recent_score_window")]
    pub recent_score_window: usize,
}

fn default_true() -> bool {
    true
}
fn default_poll_rate_hz() -> f64 {
    defaults::POLL_RATE_HZ
}
fn default_min_samples_before_update() -> usize {
    defaults::MIN_SAMPLES_BEFORE_UPDATE
}
fn default_telemetry_timeout_ms() -> u64 {
    defaults::TELEMETRY_TIMEOUT_MS
}
fn default_telemetry_failure_limit() -> u32 {
    defaults::TELEMETRY_FAILURE_LIMIT
}
fn default_recent_score_window() -> usize {
    defaults::RECENT_SCORE_WINDOW
}

impl Default for TunerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_optimize: true,
            auto_advance: true,
            poll_rate_hz: default_poll_rate_hz(),
            min_samples_before_update: default_min_samples_before_update(),
            telemetry_timeout_ms: default_telemetry_timeout_ms(),
            telemetry_failure_limit: default_telemetry_failure_limit(),
            recent_score_window: default_recent_score_window(),
        }
    }
}

impl TunerSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.poll_rate_hz.max(f64::EPSILON))
    }

    pub fn telemetry_timeout(&self) -> Duration {
        Duration::from_millis(self.telemetry_timeout_ms)
    }
}

// ============================================================================
// Safety
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Tuning pauses once the bad-sample streak exceeds this
    #[serde(default = "default_max_bad_samples")]
    pub max_bad_samples: u32,

    /// Consecutive good samples needed to resume after a quality pause
    #[serde(default = "default_required_good_samples")]
    pub required_good_samples: u32,
}

fn default_max_bad_samples() -> u32 {
    defaults::MAX_BAD_SAMPLES
}
fn default_required_good_samples() -> u32 {
    defaults::REQUIRED_GOOD_SAMPLES
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_bad_samples: default_max_bad_samples(),
            required_good_samples: default_required_good_samples(),
        }
    }
}

// ============================================================================
// Physical Limits
// ============================================================================

/// Bounds outside which a sample is treated as a sensor error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalLimits {
    #[serde(default = "default_min_distance")]
    pub min_distance_m: f64,
    #[serde(default = "default_max_distance")]
    pub max_distance_m: f64,
    #[serde(default = "default_min_velocity")]
    pub min_velocity_mps: f64,
    #[serde(default = "default_max_velocity")]
    pub max_velocity_mps: f64,
    #[serde(default = "default_min_angle")]
    pub min_angle_rad: f64,
    #[serde(default = "default_max_angle")]
    pub max_angle_rad: f64,
}

fn default_min_distance() -> f64 {
    defaults::MIN_DISTANCE_M
}
fn default_max_distance() -> f64 {
    defaults::MAX_DISTANCE_M
}
fn default_min_velocity() -> f64 {
    defaults::MIN_VELOCITY_MPS
}
fn default_max_velocity() -> f64 {
    defaults::MAX_VELOCITY_MPS
}
fn default_min_angle() -> f64 {
    defaults::MIN_ANGLE_RAD
}
fn default_max_angle() -> f64 {
    defaults::MAX_ANGLE_RAD
}

impl Default for PhysicalLimits {
    fn default() -> Self {
        Self {
            min_distance_m: default_min_distance(),
            max_distance_m: default_max_distance(),
            min_velocity_mps: default_min_velocity(),
            max_velocity_mps: default_max_velocity(),
            min_angle_rad: default_min_angle(),
            max_angle_rad: default_max_angle(),
        }
    }
}

// ============================================================================
// Optimizer
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default)]
    pub kind: OptimizerKind,

    /// Quasi-random suggestions before the surrogate takes over
    #[serde(default = "default_initial_points")]
    pub initial_points: usize,

    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_xi")]
    pub exploration_xi: f64,

    #[serde(default = "default_candidate_count")]
    pub candidate_count: usize,

    #[serde(default = "default_min_step_ratio")]
    pub min_step_ratio: f64,

    #[serde(default = "default_noise_variance")]
    pub noise_variance: f64,
}

fn default_initial_points() -> usize {
    defaults::INITIAL_POINTS
}
fn default_seed() -> u64 {
    defaults::OPTIMIZER_SEED
}
fn default_xi() -> f64 {
    defaults::EXPLORATION_XI
}
fn default_candidate_count() -> usize {
    defaults::CANDIDATE_COUNT
}
fn default_min_step_ratio() -> f64 {
    defaults::MIN_STEP_RATIO
}
fn default_noise_variance() -> f64 {
    defaults::NOISE_VARIANCE
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            kind: OptimizerKind::default(),
            initial_points: default_initial_points(),
            seed: default_seed(),
            exploration_xi: default_xi(),
            candidate_count: default_candidate_count(),
            min_step_ratio: default_min_step_ratio(),
            noise_variance: default_noise_variance(),
        }
    }
}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

// ============================================================================
// Built-in Coefficient Table
// ============================================================================

fn default_tuning_order() -> Vec<String> {
    [
        "kDragCoefficient",
        "kVelocityIterationCount",
        "kAngleIterationCount",
        "kVelocityTolerance",
        "kAngleTolerance",
        "kLaunchHeight",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

#[allow(clippy::too_many_arguments)]
fn coefficient(
    name: &str,
    enabled: bool,
    initial: f64,
    min: f64,
    max: f64,
    step_size: f64,
    step_decay_rate: f64,
    kind: ValueKind,
    telemetry_key: &str,
    description: &str,
) -> CoefficientSpec {
    CoefficientSpec {
        name: name.to_string(),
        enabled,
        min,
        max,
        kind,
        initial,
        step_size,
        step_decay_rate,
        convergence: ConvergenceCriteria::default(),
        min_write_interval_secs: 0.2,
        telemetry_key: telemetry_key.to_string(),
        reducer: ScoreReducer::MajorityVote,
        description: description.to_string(),
    }
}

fn default_coefficients() -> Vec<CoefficientSpec> {
    vec![
        coefficient(
            "kDragCoefficient", true, 0.003, 0.001, 0.006, 0.001, 0.9, ValueKind::Float,
            "/Tuning/FiringSolver/DragCoefficient",
            "Air resistance coefficient; affects trajectory curvature",
        ),
        coefficient(
            "kAirDensity", false, 1.225, 1.10, 1.30, 0.05, 0.9, ValueKind::Float,
            "/Tuning/FiringSolver/AirDensity",
            "Air density (kg/m^3); constant in the firing solver",
        ),
        coefficient(
            "kVelocityIterationCount", true, 20.0, 10.0, 30.0, 5.0, 0.85, ValueKind::Integer,
            "/Tuning/FiringSolver/VelocityIterations",
            "Solver iterations for velocity",
        ),
        coefficient(
            "kAngleIterationCount", true, 20.0, 10.0, 30.0, 5.0, 0.85, ValueKind::Integer,
            "/Tuning/FiringSolver/AngleIterations",
            "Solver iterations for angle",
        ),
        coefficient(
            "kVelocityTolerance", true, 0.01, 0.005, 0.05, 0.005, 0.9, ValueKind::Float,
            "/Tuning/FiringSolver/VelocityTolerance",
            "Velocity convergence tolerance (m/s)",
        ),
        coefficient(
            "kAngleTolerance", true, 0.0001, 0.00001, 0.001, 0.0001, 0.9, ValueKind::Float,
            "/Tuning/FiringSolver/AngleTolerance",
            "Angle convergence tolerance (rad)",
        ),
        coefficient(
            "kLaunchHeight", true, 0.8, 0.75, 0.85, 0.02, 0.9, ValueKind::Float,
            "/Tuning/FiringSolver/LaunchHeight",
            "Launch height above ground (m)",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = TunerConfig::default();
        assert!(config.validate().is_ok(), "{:?}", config.validate());
    }

    #[test]
    fn default_registry_skips_disabled_air_density() {
        let registry = TunerConfig::default().registry().unwrap();
        let names: Vec<_> = registry.tuning_sequence().iter().map(|s| s.name.as_str()).collect();
        assert!(!names.contains(&"kAirDensity"));
        assert_eq!(names.first(), Some(&"kDragCoefficient"));
        assert_eq!(names.len(), 6);
    }

    #[test]
    fn toml_round_trip_preserves_table() {
        let config = TunerConfig::default();
        let text = config.to_toml().unwrap();
        let back = TunerConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.coefficients, config.coefficients);
        assert_eq!(back.tuning_order, config.tuning_order);
    }

    #[test]
    fn zero_poll_rate_rejected() {
        let mut config = TunerConfig::default();
        config.tuner.poll_rate_hz = 0.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_rate_hz"));
    }

    #[test]
    fn registry_errors_surface_through_validate() {
        let mut config = TunerConfig::default();
        config.tuning_order.push("kDoesNotExist".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("kDoesNotExist"));
    }

    #[test]
    fn tick_interval_follows_poll_rate() {
        let settings = TunerSettings {
            poll_rate_hz: 4.0,
            ..TunerSettings::default()
        };
        assert_eq!(settings.tick_interval(), Duration::from_millis(250));
    }
}
