//! Surrogate-model optimizer: quasi-random warm-up, then GP + expected
//! improvement.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::explorer::quasi_random_point;
use super::surrogate::{expected_improvement, GaussianProcess};
use super::{CoefficientOptimizer, OptimizerError, OptimizerState};
use crate::config::OptimizerConfig;
use crate::types::CoefficientSpec;

/// Points in the local grid around the incumbent best value.
const LOCAL_CANDIDATES: usize = 21;

/// Sample-efficient optimizer for one coefficient.
///
/// The first `initial_points` suggestions come from the quasi-random
/// sequence. After that every suggestion fits a fresh GP to the full
/// history and returns the candidate with the highest expected
/// improvement. Candidates are a global grid over `[min, max]` (offset by a
/// seeded jitter that depends on the history length) plus a local grid of
/// radius `step_size` around the best value, so the decaying step narrows
/// the search as results come in.
#[derive(Debug, Clone)]
pub struct SurrogateOptimizer {
    state: OptimizerState,
    settings: OptimizerConfig,
}

impl SurrogateOptimizer {
    pub fn new(spec: &CoefficientSpec, settings: OptimizerConfig) -> Self {
        Self {
            state: OptimizerState::new(spec, settings.min_step_ratio),
            settings,
        }
    }

    fn normalise(&self, value: f64) -> f64 {
        (value - self.state.min) / self.state.span()
    }

    fn candidates(&self) -> Vec<f64> {
        let s = &self.state;
        let count = self.settings.candidate_count.max(2);
        let mut rng = StdRng::seed_from_u64(self.settings.seed ^ (s.history.len() as u64).rotate_left(32));
        let jitter: f64 = rng.gen::<f64>() / count as f64;

        let mut out: Vec<f64> = (0..count)
            .map(|i| s.min + ((i as f64 / count as f64) + jitter) * s.span())
            .collect();

        if let Some(best) = s.best_value {
            let lo = (best - s.step_size).max(s.min);
            let hi = (best + s.step_size).min(s.max);
            let steps = (LOCAL_CANDIDATES - 1) as f64;
            out.extend((0..LOCAL_CANDIDATES).map(|i| lo + (hi - lo) * i as f64 / steps));
        }
        out
    }
}

impl CoefficientOptimizer for SurrogateOptimizer {
    fn name(&self) -> &'static str {
        "surrogate"
    }

    fn suggest_next_value(&self) -> Result<f64, OptimizerError> {
        let s = &self.state;
        if let Some(index) = s.first_non_finite() {
            return Err(OptimizerError::NonFiniteHistory { index });
        }

        if s.history.len() < self.settings.initial_points {
            return Ok(quasi_random_point(self.settings.seed, s.history.len(), s.min, s.max));
        }

        let xs: Vec<f64> = s.history.iter().map(|o| self.normalise(o.value)).collect();
        let ys: Vec<f64> = s.history.iter().map(|o| o.score).collect();
        let gp = GaussianProcess::fit(&xs, &ys, self.settings.noise_variance)?;
        let best_score = s.best_score.ok_or(OptimizerError::InsufficientHistory)?;

        let mut best: Option<(f64, f64)> = None;
        for candidate in self.candidates() {
            let (mean, std_dev) = gp.predict(self.normalise(candidate));
            let ei = expected_improvement(mean, std_dev, best_score, self.settings.exploration_xi);
            if !ei.is_finite() {
                continue;
            }
            if best.map_or(true, |(_, top)| ei > top) {
                best = Some((candidate, ei));
            }
        }

        best.map(|(value, _)| value).ok_or(OptimizerError::NoCandidate)
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

    fn spec() -> CoefficientSpec {
        let mut spec = CoefficientSpec::new("kDragCoefficient", 0.001, 0.006, 0.003);
        spec.step_size = 0.001;
        spec.convergence.max_iterations = 100;
        spec.convergence.plateau_window = 0;
        spec
    }

    /// Smooth objective peaking at 0.0045
    fn objective(x: f64) -> f64 {
        1.0 - ((x - 0.0045) / 0.002).powi(2)
    }

    #[test]
    fn warm_up_matches_quasi_random_sequence() {
        let settings = OptimizerConfig::default();
        let opt = SurrogateOptimizer::new(&spec(), settings.clone());
        let expected = quasi_random_point(settings.seed, 0, 0.001, 0.006);
        assert_eq!(opt.suggest_next_value().unwrap(), expected);
    }

    #[test]
    fn suggestions_are_reproducible() {
        let run = || {
            let mut opt = SurrogateOptimizer::new(&spec(), OptimizerConfig::default());
            let mut values = Vec::new();
            for _ in 0..10 {
                let v = opt.suggest_next_value().unwrap().clamp(0.001, 0.006);
                opt.report_result(v, objective(v));
                values.push(v);
            }
            values
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn finds_region_of_optimum() {
        let mut opt = SurrogateOptimizer::new(&spec(), OptimizerConfig::default());
        for _ in 0..15 {
            let v = opt.suggest_next_value().unwrap().clamp(0.001, 0.006);
            opt.report_result(v, objective(v));
        }
        let best = opt.state().best_value.unwrap();
        assert!((best - 0.0045).abs() < 0.001, "best = {best}");
    }

    #[test]
    fn suggest_does_not_mutate() {
        let mut opt = SurrogateOptimizer::new(&spec(), OptimizerConfig::default());
        for v in [0.002, 0.003, 0.004, 0.005, 0.0055, 0.0015] {
            opt.report_result(v, objective(v));
        }
        let before = opt.state().clone();
        let a = opt.suggest_next_value().unwrap();
        let b = opt.suggest_next_value().unwrap();
        assert_eq!(a, b);
        assert_eq!(opt.state(), &before);
    }

    #[test]
    fn non_finite_score_is_reported_as_error() {
        let mut opt = SurrogateOptimizer::new(&spec(), OptimizerConfig::default());
        opt.report_result(0.003, f64::NAN);
        assert!(opt.suggest_next_value().is_err());
    }
}
