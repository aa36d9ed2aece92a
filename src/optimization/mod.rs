//! Per-coefficient black-box optimization
//!
//! Every optimizer speaks the same three-call protocol:
//! `suggest_next_value` / `report_result` / `is_converged`. The coordinator
//! owns exactly one optimizer at a time, for the active coefficient, and is
//! the only authority on bounds: suggestions may fall outside `[min, max]`
//! and are clamped before they are written.

mod bayesian;
mod explorer;
mod factory;
mod manual;
mod rate_limiter;
mod state;
pub mod surrogate;

pub use bayesian::SurrogateOptimizer;
pub use explorer::{quasi_random_point, QuasiRandomExplorer};
pub use factory::{OptimizerFactory, OptimizerKind, StandardOptimizerFactory};
pub use manual::ManualHold;
pub use rate_limiter::WriteThrottle;
pub use state::{Observation, OptimizerState};

use thiserror::Error;

/// Numerical failure inside an optimizer. Never fatal: the coordinator
/// falls back to a safe value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizerError {
    #[error("history entry {index} is not finite")]
    NonFiniteHistory { index: usize },

    #[error("surrogate covariance is not positive definite")]
    Factorization,

    #[error("not enough history to fit the surrogate")]
    InsufficientHistory,

    #[error("no candidate produced a finite acquisition value")]
    NoCandidate,
}

/// The suggest/report/converge protocol shared by all optimizer variants.
pub trait CoefficientOptimizer: Send {
    /// Short identifier used in logs and status.
    fn name(&self) -> &'static str;

    /// Propose the next value to try. Pure: depends only on the reported
    /// history and the configured seed.
    fn suggest_next_value(&self) -> Result<f64, OptimizerError>;

    /// Fold one reduced score for `value` into the history. Larger scores
    /// are better.
    fn report_result(&mut self, value: f64, score: f64);

    /// Whether the stopping criteria hold. Never changes state.
    fn is_converged(&self) -> bool;

    fn state(&self) -> &OptimizerState;

    /// Safe value when a suggestion fails: best known, else initial.
    fn fallback_value(&self) -> f64 {
        let s = self.state();
        s.best_value.unwrap_or(s.initial_value)
    }
}
