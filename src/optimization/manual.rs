//! Manual hold: the optimizer for coefficients driven by an operator

use super::{CoefficientOptimizer, OptimizerError, OptimizerState};
use crate::types::CoefficientSpec;

/// Never moves the coefficient on its own.
///
/// Suggests the last reported value (the value that was in effect), or the
/// initial value before any report. Results are still recorded so the
/// status shows scores and convergence.
#[derive(Debug, Clone)]
pub struct ManualHold {
    state: OptimizerState,
}

impl ManualHold {
    pub fn new(spec: &CoefficientSpec, min_step_ratio: f64) -> Self {
        Self {
            state: OptimizerState::new(spec, min_step_ratio),
        }
    }
}

impl CoefficientOptimizer for ManualHold {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn suggest_next_value(&self) -> Result<f64, OptimizerError> {
        Ok(self
            .state
            .history
            .last()
            .map_or(self.state.initial_value, |o| o.value))
    }

    fn report_result(&mut self, value: f64, score: f64) {
        self.state.record(value, score);
    }

    fn is_converged(&self) -> bool {
        self.state.check_converged()
    }

    fn state(&self) -> &OptimizerState {
        &self.state
    }
}
