//! Builds a fresh optimizer whenever a coefficient becomes active

use serde::{Deserialize, Serialize};

use super::{CoefficientOptimizer, ManualHold, QuasiRandomExplorer, SurrogateOptimizer};
use crate::config::OptimizerConfig;
use crate::types::CoefficientSpec;

/// Which optimizer variant drives the coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    QuasiRandom,
    #[default]
    Surrogate,
    Manual,
}

impl std::fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuasiRandom => write!(f, "quasi_random"),
            Self::Surrogate => write!(f, "surrogate"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Source of optimizer instances for the coordinator.
///
/// Closures of the right shape implement this too, which is how tests
/// inject synthetic optimizers.
pub trait OptimizerFactory: Send + Sync {
    fn create(&self, spec: &CoefficientSpec) -> Box<dyn CoefficientOptimizer>;
}

impl<F> OptimizerFactory for F
where
    F: Fn(&CoefficientSpec) -> Box<dyn CoefficientOptimizer> + Send + Sync,
{
    fn create(&self, spec: &CoefficientSpec) -> Box<dyn CoefficientOptimizer> {
        self(spec)
    }
}

/// Factory driven by the `[optimizer]` config section.
#[derive(Debug, Clone, Default)]
pub struct StandardOptimizerFactory {
    config: OptimizerConfig,
}

impl StandardOptimizerFactory {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn kind(&self) -> OptimizerKind {
        self.config.kind
    }
}

impl OptimizerFactory for StandardOptimizerFactory {
    fn create(&self, spec: &CoefficientSpec) -> Box<dyn CoefficientOptimizer> {
        let c = &self.config;
        match c.kind {
            OptimizerKind::QuasiRandom => {
                Box::new(QuasiRandomExplorer::new(spec, c.seed, c.min_step_ratio))
            }
            OptimizerKind::Surrogate => Box::new(SurrogateOptimizer::new(spec, c.clone())),
            OptimizerKind::Manual => Box::new(ManualHold::new(spec, c.min_step_ratio)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_kind_selects_variant() {
        let spec = CoefficientSpec::new("k", 0.0, 1.0, 0.5);
        for (kind, name) in [
            (OptimizerKind::QuasiRandom, "quasi_random"),
            (OptimizerKind::Surrogate, "surrogate"),
            (OptimizerKind::Manual, "manual"),
        ] {
            let factory = StandardOptimizerFactory::new(OptimizerConfig {
                kind,
                ..OptimizerConfig::default()
            });
            assert_eq!(factory.create(&spec).name(), name);
            assert_eq!(kind.to_string(), name);
        }
    }

    #[test]
    fn closures_are_factories() {
        let factory = |spec: &CoefficientSpec| -> Box<dyn CoefficientOptimizer> {
            Box::new(ManualHold::new(spec, 0.1))
        };
        let spec = CoefficientSpec::new("k", 0.0, 1.0, 0.25);
        let opt = OptimizerFactory::create(&factory, &spec);
        assert_eq!(opt.suggest_next_value().unwrap(), 0.25);
    }
}
