//! Safety gate: decides each tick whether tuning may proceed
//!
//! Checks run in priority order and the first one that fires wins:
//! 1. External interlock (e.g. a match in progress) → disabled
//! 2. Operator toggle off → disabled
//! 3. Telemetry fault → paused
//! 4. Data quality (bad-sample streak, recovery streak) → paused
//!
//! The gate holds only thresholds. Everything it looks at is passed in, so
//! evaluating it never changes anything.

use serde::Serialize;

use crate::config::SafetyConfig;

/// Why tuning is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisableReason {
    SafetyInterlock,
    Operator,
}

/// Why tuning is paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    Telemetry,
    SampleQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum GateDecision {
    Open,
    Disabled(DisableReason),
    Paused(PauseReason),
}

impl GateDecision {
    pub fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Everything the gate looks at for one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateInputs {
    /// External must-not-tune-now signal
    pub tuning_disallowed: bool,
    /// Operator toggle
    pub operator_enabled: bool,
    /// Telemetry failed this tick
    pub telemetry_fault: bool,
    pub bad_sample_streak: u32,
    pub good_sample_streak: u32,
    /// Data-quality hold is active (recovery needs a good streak). Survives
    /// interruptions by other pauses and disables; see [`SafetyGate::quality_hold`].
    pub quality_paused: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SafetyGate {
    max_bad_samples: u32,
    required_good_samples: u32,
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self::new(&SafetyConfig::default())
    }
}

impl SafetyGate {
    pub fn new(config: &SafetyConfig) -> Self {
        Self {
            max_bad_samples: config.max_bad_samples,
            required_good_samples: config.required_good_samples,
        }
    }

    /// Next value of the data-quality hold.
    ///
    /// The hold is set once the bad streak exceeds `max_bad_samples` and is
    /// released only by `required_good_samples` consecutive good samples.
    pub fn quality_hold(&self, held: bool, bad_sample_streak: u32, good_sample_streak: u32) -> bool {
        if held {
            good_sample_streak < self.required_good_samples
        } else {
            bad_sample_streak > self.max_bad_samples
        }
    }

    pub fn evaluate(&self, inputs: &GateInputs) -> GateDecision {
        if inputs.tuning_disallowed {
            return GateDecision::Disabled(DisableReason::SafetyInterlock);
        }
        if !inputs.operator_enabled {
            return GateDecision::Disabled(DisableReason::Operator);
        }
        if inputs.telemetry_fault {
            return GateDecision::Paused(PauseReason::Telemetry);
        }
        if inputs.quality_paused {
            if inputs.good_sample_streak >= self.required_good_samples {
                return GateDecision::Open;
            }
            return GateDecision::Paused(PauseReason::SampleQuality);
        }
        if inputs.bad_sample_streak > self.max_bad_samples {
            return GateDecision::Paused(PauseReason::SampleQuality);
        }
        GateDecision::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> SafetyGate {
        SafetyGate::new(&SafetyConfig {
            max_bad_samples: 10,
            required_good_samples: 3,
        })
    }

    fn open_inputs() -> GateInputs {
        GateInputs {
            operator_enabled: true,
            ..GateInputs::default()
        }
    }

    #[test]
    fn interlock_overrides_everything() {
        let inputs = GateInputs {
            tuning_disallowed: true,
            operator_enabled: false,
            telemetry_fault: true,
            bad_sample_streak: 99,
            ..GateInputs::default()
        };
        assert_eq!(
            gate().evaluate(&inputs),
            GateDecision::Disabled(DisableReason::SafetyInterlock)
        );
    }

    #[test]
    fn operator_disable_beats_pauses() {
        let inputs = GateInputs {
            operator_enabled: false,
            telemetry_fault: true,
            ..GateInputs::default()
        };
        assert_eq!(gate().evaluate(&inputs), GateDecision::Disabled(DisableReason::Operator));
    }

    #[test]
    fn telemetry_fault_pauses() {
        let inputs = GateInputs {
            telemetry_fault: true,
            ..open_inputs()
        };
        assert_eq!(gate().evaluate(&inputs), GateDecision::Paused(PauseReason::Telemetry));
    }

    #[test]
    fn bad_streak_must_exceed_threshold() {
        let at = GateInputs {
            bad_sample_streak: 10,
            ..open_inputs()
        };
        let over = GateInputs {
            bad_sample_streak: 11,
            ..open_inputs()
        };
        assert!(gate().evaluate(&at).is_open());
        assert_eq!(gate().evaluate(&over), GateDecision::Paused(PauseReason::SampleQuality));
    }

    #[test]
    fn quality_pause_needs_good_streak() {
        let recovering = GateInputs {
            quality_paused: true,
            good_sample_streak: 2,
            ..open_inputs()
        };
        let recovered = GateInputs {
            quality_paused: true,
            good_sample_streak: 3,
            ..open_inputs()
        };
        assert_eq!(
            gate().evaluate(&recovering),
            GateDecision::Paused(PauseReason::SampleQuality)
        );
        assert!(gate().evaluate(&recovered).is_open());
    }

    #[test]
    fn quality_hold_latches_until_good_streak() {
        let g = gate();
        assert!(!g.quality_hold(false, 10, 0));
        assert!(g.quality_hold(false, 11, 0));
        // A reset bad streak alone does not release the hold
        assert!(g.quality_hold(true, 0, 1));
        assert!(g.quality_hold(true, 0, 2));
        assert!(!g.quality_hold(true, 0, 3));
    }

    #[test]
    fn default_inputs_are_operator_disabled() {
        assert_eq!(
            gate().evaluate(&GateInputs::default()),
            GateDecision::Disabled(DisableReason::Operator)
        );
    }
}
