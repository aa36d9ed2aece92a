//! Quasi-random exploration over a coefficient's range

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{CoefficientOptimizer, OptimizerError, OptimizerState};
use crate::types::CoefficientSpec;

/// Radical inverse of `index` in base 2.
fn van_der_corput(mut index: u64) -> f64 {
    let mut result = 0.0;
    let mut denom = 1.0;
    while index > 0 {
        denom *= 2.0;
        result += (index & 1) as f64 / denom;
        index >>= 1;
    }
    result
}

/// Point `index` of a seeded, rotated van der Corput sequence mapped onto
/// `[min, max]`.
///
/// The rotation (Cranley-Patterson shift) keeps different seeds from
/// producing the same sequence while preserving low discrepancy.
pub fn quasi_random_point(seed: u64, index: usize, min: f64, max: f64) -> f64 {
    let shift: f64 = StdRng::seed_from_u64(seed).gen();
    let u = (van_der_corput(index as u64 + 1) + shift).fract();
    min + u * (max - min)
}

/// Spreads suggestions evenly over the range without modelling the
/// objective.
#[derive(Debug, Clone)]
pub struct QuasiRandomExplorer {
    state: OptimizerState,
    seed: u64,
}

impl QuasiRandomExplorer {
    pub fn new(spec: &CoefficientSpec, seed: u64, min_step_ratio: f64) -> Self {
        Self {
            state: OptimizerState::new(spec, min_step_ratio),
            seed,
        }
    }
}

impl CoefficientOptimizer for QuasiRandomExplorer {
    fn name(&self) -> &'static str {
        "quasi_random"
    }

    fn suggest_next_value(&self) -> Result<f64, OptimizerError> {
        if let Some(index) = self.state.first_non_finite() {
            return Err(OptimizerError::NonFiniteHistory { index });
        }
        Ok(quasi_random_point(
            self.seed,
            self.state.history.len(),
            self.state.min,
            self.state.max,
        ))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn van_der_corput_base_two() {
        assert_eq!(van_der_corput(1), 0.5);
        assert_eq!(van_der_corput(2), 0.25);
        assert_eq!(van_der_corput(3), 0.75);
    }

    #[test]
    fn points_stay_in_range() {
        for i in 0..64 {
            let p = quasi_random_point(7, i, 0.001, 0.006);
            assert!((0.001..=0.006).contains(&p), "{p}");
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let a: Vec<f64> = (0..8).map(|i| quasi_random_point(42, i, 0.0, 1.0)).collect();
        let b: Vec<f64> = (0..8).map(|i| quasi_random_point(42, i, 0.0, 1.0)).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn suggestion_depends_only_on_history() {
        let spec = CoefficientSpec::new("k", 0.0, 1.0, 0.5);
        let mut opt = QuasiRandomExplorer::new(&spec, 3, 0.1);
        let first = opt.suggest_next_value().unwrap();
        assert_eq!(first, opt.suggest_next_value().unwrap());
        opt.report_result(first, 0.2);
        assert_ne!(first, opt.suggest_next_value().unwrap());
    }

    #[test]
    fn non_finite_history_is_an_error() {
        let spec = CoefficientSpec::new("k", 0.0, 1.0, 0.5);
        let mut opt = QuasiRandomExplorer::new(&spec, 3, 0.1);
        opt.report_result(f64::NAN, 0.0);
        assert!(matches!(
            opt.suggest_next_value(),
            Err(OptimizerError::NonFiniteHistory { index: 0 })
        ));
    }
}
