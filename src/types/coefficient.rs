//! Coefficient definitions: bounds, step schedule, convergence criteria and
//! the per-coefficient score reducer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Sample;

/// Numeric semantics of a coefficient's value domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    #[default]
    Float,
    /// Whole numbers only (e.g. solver iteration counts)
    Integer,
}

/// How a buffer of accepted samples is folded into a single optimizer score.
///
/// Every reducer returns a score where larger is better. Reducers over
/// quantities that should be minimised negate on entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreReducer {
    /// Fraction of samples that hit (0.0–1.0)
    HitRatio,
    /// +1 when hits are a strict majority, -1 otherwise, plus a small
    /// tie-breaker favouring shorter mean distance
    #[default]
    MajorityVote,
    /// Mean of the per-sample derived score
    MeanScore,
    /// Mean absolute error, minimised
    MeanError,
}

impl ScoreReducer {
    /// Reduce a non-empty sample buffer to a score. Returns `None` for an
    /// empty buffer.
    pub fn reduce(self, samples: &[Sample]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let score = match self {
            Self::HitRatio => samples.iter().filter(|s| s.hit).count() as f64 / n,
            Self::MajorityVote => {
                let hits = samples.iter().filter(|s| s.hit).count() as f64;
                let base = if hits > n / 2.0 { 1.0 } else { -1.0 };
                let mean_distance = samples.iter().map(|s| s.distance_m).sum::<f64>() / n;
                if mean_distance > 0.0 {
                    base - 0.01 / mean_distance.max(1.0)
                } else {
                    base
                }
            }
            Self::MeanScore => samples.iter().map(Sample::derived_score).sum::<f64>() / n,
            Self::MeanError => -(samples.iter().map(|s| s.error.abs()).sum::<f64>() / n),
        };
        Some(score)
    }

    /// Whether the underlying quantity is minimised (score is negated).
    pub const fn minimizes(self) -> bool {
        matches!(self, Self::MeanError)
    }
}

impl std::fmt::Display for ScoreReducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HitRatio => write!(f, "hit_ratio"),
            Self::MajorityVote => write!(f, "majority_vote"),
            Self::MeanScore => write!(f, "mean_score"),
            Self::MeanError => write!(f, "mean_error"),
        }
    }
}

/// Per-coefficient stopping criteria. Never global constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceCriteria {
    /// Hard cap on `report_result` calls
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Stop as soon as the best score reaches this value
    #[serde(default)]
    pub target_score: Option<f64>,

    /// Number of most recent scores inspected for a plateau (0 disables)
    #[serde(default = "default_plateau_window")]
    pub plateau_window: usize,

    /// Width of the band the plateau window must fit inside
    #[serde(default = "default_plateau_epsilon")]
    pub plateau_epsilon: f64,
}

fn default_max_iterations() -> u32 {
    20
}
fn default_plateau_window() -> usize {
    5
}
fn default_plateau_epsilon() -> f64 {
    0.01
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            target_score: None,
            plateau_window: default_plateau_window(),
            plateau_epsilon: default_plateau_epsilon(),
        }
    }
}

/// One tunable coefficient. Immutable once the registry is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSpec {
    /// Unique coefficient name
    pub name: String,

    /// Disabled coefficients are never visited
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Lowest value that may ever be written (safety limit)
    pub min: f64,

    /// Highest value that may ever be written (safety limit)
    pub max: f64,

    #[serde(default)]
    pub kind: ValueKind,

    /// Value assumed in effect before the first write
    pub initial: f64,

    /// Initial local search radius
    pub step_size: f64,

    /// Multiplicative decay applied to the step after every update
    #[serde(default = "default_step_decay")]
    pub step_decay_rate: f64,

    #[serde(default)]
    pub convergence: ConvergenceCriteria,

    /// Minimum time between two writes of this coefficient
    #[serde(default)]
    pub min_write_interval_secs: f64,

    /// Key the telemetry link writes this coefficient under
    pub telemetry_key: String,

    #[serde(default)]
    pub reducer: ScoreReducer,

    #[serde(default)]
    pub description: String,
}

fn default_true() -> bool {
    true
}
fn default_step_decay() -> f64 {
    0.9
}

impl CoefficientSpec {
    /// Minimal constructor used by tests and the built-in defaults.
    pub fn new(name: impl Into<String>, min: f64, max: f64, initial: f64) -> Self {
        let name = name.into();
        Self {
            telemetry_key: format!("/Tuning/{name}"),
            name,
            enabled: true,
            min,
            max,
            kind: ValueKind::Float,
            initial,
            step_size: (max - min) / 4.0,
            step_decay_rate: default_step_decay(),
            convergence: ConvergenceCriteria::default(),
            min_write_interval_secs: 0.0,
            reducer: ScoreReducer::default(),
            description: String::new(),
        }
    }

    /// Force a value into `[min, max]`.
    ///
    /// Integer coefficients are rounded and re-clamped. Non-finite input
    /// yields the (clamped) initial value.
    pub fn clamp(&self, value: f64) -> f64 {
        let value = if value.is_finite() { value } else { self.initial };
        let clamped = value.clamp(self.min, self.max);
        match self.kind {
            ValueKind::Float => clamped,
            ValueKind::Integer => clamped.round().clamp(self.min.ceil(), self.max.floor()),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn min_write_interval(&self) -> Duration {
        Duration::from_secs_f64(self.min_write_interval_secs.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(hit: bool, distance: f64, error: f64) -> Sample {
        Sample {
            hit,
            distance_m: distance,
            error,
            ..Sample::default()
        }
    }

    #[test]
    fn clamp_float_into_bounds() {
        let spec = CoefficientSpec::new("k", 0.0, 1.0, 0.5);
        assert_eq!(spec.clamp(-3.0), 0.0);
        assert_eq!(spec.clamp(7.0), 1.0);
        assert_eq!(spec.clamp(0.25), 0.25);
    }

    #[test]
    fn clamp_integer_rounds() {
        let mut spec = CoefficientSpec::new("iters", 10.0, 30.0, 20.0);
        spec.kind = ValueKind::Integer;
        assert_eq!(spec.clamp(12.6), 13.0);
        assert_eq!(spec.clamp(30.4), 30.0);
        assert_eq!(spec.clamp(2.0), 10.0);
    }

    #[test]
    fn clamp_non_finite_uses_initial() {
        let spec = CoefficientSpec::new("k", 0.0, 1.0, 0.5);
        assert_eq!(spec.clamp(f64::NAN), 0.5);
        assert_eq!(spec.clamp(f64::INFINITY), 0.5);
    }

    #[test]
    fn hit_ratio_counts_hits() {
        let buf = vec![sample(true, 3.0, 0.0), sample(false, 3.0, 0.0), sample(true, 3.0, 0.0), sample(true, 3.0, 0.0)];
        assert_eq!(ScoreReducer::HitRatio.reduce(&buf), Some(0.75));
    }

    #[test]
    fn majority_vote_requires_strict_majority() {
        let tie = vec![sample(true, 4.0, 0.0), sample(false, 4.0, 0.0)];
        let score = ScoreReducer::MajorityVote.reduce(&tie).unwrap();
        assert!(score < -0.99 && score > -1.01);

        let win = vec![sample(true, 4.0, 0.0), sample(true, 4.0, 0.0), sample(false, 4.0, 0.0)];
        let score = ScoreReducer::MajorityVote.reduce(&win).unwrap();
        assert!((score - (1.0 - 0.0025)).abs() < 1e-12);
    }

    #[test]
    fn mean_error_is_negated() {
        let buf = vec![sample(false, 3.0, 0.2), sample(false, 3.0, -0.4)];
        let score = ScoreReducer::MeanError.reduce(&buf).unwrap();
        assert!((score + 0.3).abs() < 1e-12);
        assert!(ScoreReducer::MeanError.minimizes());
        assert!(!ScoreReducer::HitRatio.minimizes());
    }

    #[test]
    fn empty_buffer_has_no_score() {
        assert!(ScoreReducer::MeanScore.reduce(&[]).is_none());
    }
}
