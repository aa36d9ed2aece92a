//! Coordinator state machine states and the published status snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level tuning state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TunerState {
    /// Waiting for the telemetry link to connect
    #[default]
    Idle,
    TuningLoop,
    /// Interlock or operator disable is active
    Disabled,
    /// Data quality or telemetry problem; waiting to recover
    Paused,
    /// Every enabled coefficient has been tuned
    Complete,
    /// Terminal
    Shutdown,
}

impl TunerState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Shutdown)
    }
}

impl std::fmt::Display for TunerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::TuningLoop => write!(f, "TUNING_LOOP"),
            Self::Disabled => write!(f, "DISABLED"),
            Self::Paused => write!(f, "PAUSED"),
            Self::Complete => write!(f, "COMPLETE"),
            Self::Shutdown => write!(f, "SHUTDOWN"),
        }
    }
}

/// Machine-readable code attached to every user-visible condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Ok,
    ConfigurationError,
    TelemetryError,
    TelemetryUnavailable,
    SampleRejected,
    SafetyOverride,
    OperatorDisabled,
    OptimizerFallback,
    UnknownCoefficient,
}

impl StatusCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
            Self::TelemetryError => "TELEMETRY_ERROR",
            Self::TelemetryUnavailable => "TELEMETRY_UNAVAILABLE",
            Self::SampleRejected => "SAMPLE_REJECTED",
            Self::SafetyOverride => "SAFETY_OVERRIDE",
            Self::OperatorDisabled => "OPERATOR_DISABLED",
            Self::OptimizerFallback => "OPTIMIZER_FALLBACK",
            Self::UnknownCoefficient => "UNKNOWN_COEFFICIENT",
        }
    }
}

/// A human-readable message paired with its code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub code: StatusCode,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl StatusMessage {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Final (or current) result for one coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSummary {
    pub name: String,
    pub iterations: u32,
    pub best_value: f64,
    pub best_score: Option<f64>,
    pub converged: bool,
}

/// Snapshot of the coordinator published after every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TuningStatus {
    pub state: TunerState,
    pub enabled: bool,
    pub active_coefficient: Option<String>,
    /// Position within the enabled tuning sequence
    pub active_index: Option<usize>,
    pub sequence_len: usize,
    pub iteration: u32,
    pub converged: bool,
    pub best_value: Option<f64>,
    pub best_score: Option<f64>,
    pub current_value: Option<f64>,
    pub step_size: Option<f64>,
    pub pending_samples: usize,
    pub pending_write: Option<f64>,
    pub recent_scores: Vec<f64>,
    pub bad_sample_streak: u32,
    pub good_sample_streak: u32,
    pub telemetry_failures: u32,
    pub writes: u64,
    pub ticks: u64,
    pub last_error: Option<StatusMessage>,
    pub completed: Vec<CoefficientSummary>,
}

impl TuningStatus {
    /// One-line summary for driver feedback.
    pub fn headline(&self) -> String {
        match (self.state, &self.active_coefficient) {
            (TunerState::Complete, _) => "Tuning complete".to_string(),
            (TunerState::TuningLoop, Some(name)) => format!(
                "Tuning {name} (iter {}, step {:.6})",
                self.iteration,
                self.step_size.unwrap_or_default()
            ),
            (state, Some(name)) => format!("{state}: {name}"),
            (state, None) => state.to_string(),
        }
    }
}
