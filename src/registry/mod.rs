//! Coefficient registry: the validated, ordered set of coefficients the
//! coordinator walks through.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::config::ConfigError;
use crate::types::{CoefficientSpec, ValueKind};

/// Ordered, validated coefficient definitions plus the tuning order.
///
/// Immutable once built. A reload means building a new registry (and a new
/// coordinator).
#[derive(Debug, Clone)]
pub struct CoefficientRegistry {
    specs: Vec<CoefficientSpec>,
    by_name: HashMap<String, usize>,
    /// Indices into `specs` of the enabled coefficients, in tuning order
    sequence: Vec<usize>,
}

impl CoefficientRegistry {
    /// Validate `specs` and resolve `order` into a tuning sequence.
    ///
    /// An empty `order` means declaration order. Every problem found is
    /// reported at once in a single `ConfigError::Validation`.
    pub fn new(specs: Vec<CoefficientSpec>, order: Vec<String>) -> Result<Self, ConfigError> {
        let mut errors = Vec::new();
        let mut by_name = HashMap::new();

        for (idx, spec) in specs.iter().enumerate() {
            if spec.name.trim().is_empty() {
                errors.push(format!("coefficient #{idx} has an empty name"));
            }
            if by_name.insert(spec.name.clone(), idx).is_some() {
                errors.push(format!("duplicate coefficient name '{}'", spec.name));
            }
            errors.extend(validate_spec(spec));
        }

        let sequence = if order.is_empty() {
            specs
                .iter()
                .enumerate()
                .filter(|(_, s)| s.enabled)
                .map(|(i, _)| i)
                .collect()
        } else {
            let mut seen = HashSet::new();
            let mut sequence = Vec::new();
            for name in &order {
                if !seen.insert(name.as_str()) {
                    errors.push(format!("'{name}' is listed twice in tuning_order"));
                    continue;
                }
                match by_name.get(name) {
                    Some(&idx) if specs[idx].enabled => sequence.push(idx),
                    Some(_) => {}
                    None => errors.push(format!("tuning_order names unknown coefficient '{name}'")),
                }
            }
            for spec in specs.iter().filter(|s| s.enabled && !seen.contains(s.name.as_str())) {
                warn!(
                    coefficient = %spec.name,
                    "Enabled coefficient is not in tuning_order and will not be tuned"
                );
            }
            sequence
        };

        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        Ok(Self {
            specs,
            by_name,
            sequence,
        })
    }

    /// All coefficients in declaration order, enabled or not.
    pub fn iter(&self) -> impl Iterator<Item = &CoefficientSpec> {
        self.specs.iter()
    }

    pub fn get(&self, name: &str) -> Option<&CoefficientSpec> {
        self.by_name.get(name).map(|&i| &self.specs[i])
    }

    /// The enabled coefficients, in the order they will be tuned.
    pub fn tuning_sequence(&self) -> Vec<&CoefficientSpec> {
        self.sequence.iter().map(|&i| &self.specs[i]).collect()
    }

    /// Coefficient at `position` within the tuning sequence.
    pub fn at(&self, position: usize) -> Option<&CoefficientSpec> {
        self.sequence.get(position).map(|&i| &self.specs[i])
    }

    /// Number of coefficients that will be visited.
    pub fn sequence_len(&self) -> usize {
        self.sequence.len()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

fn validate_spec(spec: &CoefficientSpec) -> Vec<String> {
    let mut errors = Vec::new();
    let name = &spec.name;

    if !spec.min.is_finite() || !spec.max.is_finite() {
        errors.push(format!("{name}: bounds must be finite"));
        return errors;
    }
    if spec.min >= spec.max {
        errors.push(format!("{name}: min ({}) must be below max ({})", spec.min, spec.max));
    }
    if spec.kind == ValueKind::Integer && spec.min.ceil() > spec.max.floor() {
        errors.push(format!("{name}: integer range [{}, {}] holds no whole number", spec.min, spec.max));
    }
    if !spec.initial.is_finite() || !spec.contains(spec.initial) {
        errors.push(format!(
            "{name}: initial value {} is outside [{}, {}]",
            spec.initial, spec.min, spec.max
        ));
    }
    if !spec.step_size.is_finite() || spec.step_size <= 0.0 {
        errors.push(format!("{name}: step_size must be > 0"));
    }
    if !(spec.step_decay_rate > 0.0 && spec.step_decay_rate <= 1.0) {
        errors.push(format!("{name}: step_decay_rate {} must be in (0, 1]", spec.step_decay_rate));
    }
    if spec.convergence.max_iterations == 0 {
        errors.push(format!("{name}: convergence.max_iterations must be > 0"));
    }
    if !spec.convergence.plateau_epsilon.is_finite() || spec.convergence.plateau_epsilon < 0.0 {
        errors.push(format!("{name}: convergence.plateau_epsilon must be >= 0"));
    }
    if !spec.min_write_interval_secs.is_finite() || spec.min_write_interval_secs < 0.0 {
        errors.push(format!("{name}: min_write_interval_secs must be >= 0"));
    }
    if spec.telemetry_key.trim().is_empty() {
        errors.push(format!("{name}: telemetry_key is empty"));
    }

    errors
}
