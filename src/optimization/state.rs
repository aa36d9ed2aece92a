//! Per-coefficient optimizer bookkeeping shared by every optimizer variant

use serde::Serialize;

use crate::types::{CoefficientSpec, ConvergenceCriteria};

/// One reported (value, score) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    pub value: f64,
    pub score: f64,
}

/// History, best-so-far and step schedule for the active coefficient.
///
/// Created fresh every time a coefficient becomes active and owned by the
/// optimizer bound to it. Scores are always maximised.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizerState {
    pub min: f64,
    pub max: f64,
    pub initial_value: f64,
    pub history: Vec<Observation>,
    pub best_value: Option<f64>,
    pub best_score: Option<f64>,
    pub step_size: f64,
    pub initial_step: f64,
    pub step_decay_rate: f64,
    pub min_step_ratio: f64,
    pub iterations: u32,
    pub converged: bool,
    pub criteria: ConvergenceCriteria,
}

impl OptimizerState {
    pub fn new(spec: &CoefficientSpec, min_step_ratio: f64) -> Self {
        Self {
            min: spec.min,
            max: spec.max,
            initial_value: spec.initial,
            history: Vec::new(),
            best_value: None,
            best_score: None,
            step_size: spec.step_size,
            initial_step: spec.step_size,
            step_decay_rate: spec.step_decay_rate,
            min_step_ratio,
            iterations: 0,
            converged: false,
            criteria: spec.convergence.clone(),
        }
    }

    /// Fold one result into the state.
    ///
    /// Appends to history, updates the best-so-far, decays the step (never
    /// below `initial_step * min_step_ratio`), bumps the iteration count and
    /// refreshes the converged flag. Values that were never suggested are
    /// accepted as-is.
    pub fn record(&mut self, value: f64, score: f64) {
        self.history.push(Observation { value, score });

        let improves = match self.best_score {
            None => score.is_finite(),
            Some(best) => score.is_finite() && score > best,
        };
        if improves {
            self.best_score = Some(score);
            self.best_value = Some(value);
        }

        let floor = self.initial_step * self.min_step_ratio;
        self.step_size = (self.step_size * self.step_decay_rate).max(floor);
        self.iterations = self.iterations.saturating_add(1);
        self.converged = self.check_converged();
    }

    /// Evaluate the stopping criteria without touching any state.
    pub fn check_converged(&self) -> bool {
        let c = &self.criteria;
        if self.iterations >= c.max_iterations {
            return true;
        }
        if let (Some(target), Some(best)) = (c.target_score, self.best_score) {
            if best >= target {
                return true;
            }
        }
        self.on_plateau()
    }

    fn on_plateau(&self) -> bool {
        let window = self.criteria.plateau_window;
        if window == 0 || self.history.len() < window {
            return false;
        }
        let recent = &self.history[self.history.len() - window..];
        let (lo, hi) = recent.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), o| {
            (lo.min(o.score), hi.max(o.score))
        });
        hi - lo <= self.criteria.plateau_epsilon
    }

    /// Up to `n` most recent scores, oldest first.
    pub fn recent_scores(&self, n: usize) -> Vec<f64> {
        let start = self.history.len().saturating_sub(n);
        self.history[start..].iter().map(|o| o.score).collect()
    }

    /// Index of the first non-finite history entry, if any.
    pub fn first_non_finite(&self) -> Option<usize> {
        self.history
            .iter()
            .position(|o| !o.value.is_finite() || !o.score.is_finite())
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(max_iterations: u32) -> OptimizerState {
        let mut spec = CoefficientSpec::new("k", 0.0, 1.0, 0.5);
        spec.step_size = 0.2;
        spec.step_decay_rate = 0.5;
        spec.convergence.max_iterations = max_iterations;
        spec.convergence.plateau_window = 0;
        OptimizerState::new(&spec, 0.1)
    }

    #[test]
    fn best_tracks_maximum() {
        let mut s = state(10);
        s.record(0.1, -1.0);
        s.record(0.7, 0.5);
        s.record(0.3, 0.2);
        assert_eq!(s.best_value, Some(0.7));
        assert_eq!(s.best_score, Some(0.5));
        assert_eq!(s.iterations, 3);
    }

    #[test]
    fn step_decay_is_floored() {
        let mut s = state(100);
        for _ in 0..20 {
            s.record(0.5, 0.0);
        }
        assert!((s.step_size - 0.02).abs() < 1e-12);
    }

    #[test]
    fn max_iterations_converges() {
        let mut s = state(2);
        s.record(0.5, 0.0);
        assert!(!s.converged);
        s.record(0.5, 0.1);
        assert!(s.converged);
    }

    #[test]
    fn target_score_converges() {
        let mut s = state(100);
        s.criteria.target_score = Some(0.9);
        s.record(0.2, 0.5);
        assert!(!s.converged);
        s.record(0.4, 0.95);
        assert!(s.converged);
    }

    #[test]
    fn plateau_converges() {
        let mut s = state(100);
        s.criteria.plateau_window = 3;
        s.criteria.plateau_epsilon = 0.05;
        s.record(0.1, -1.0);
        s.record(0.2, 0.50);
        s.record(0.3, 0.52);
        assert!(!s.converged);
        s.record(0.4, 0.51);
        assert!(s.converged);
    }

    #[test]
    fn check_converged_is_pure() {
        let mut s = state(100);
        s.record(0.3, 0.1);
        let before = s.clone();
        for _ in 0..5 {
            let _ = s.check_converged();
        }
        assert_eq!(s, before);
    }

    #[test]
    fn recent_scores_returns_tail() {
        let mut s = state(100);
        for i in 0..5 {
            s.record(0.5, i as f64);
        }
        assert_eq!(s.recent_scores(2), vec![3.0, 4.0]);
        assert_eq!(s.recent_scores(10).len(), 5);
    }
}
