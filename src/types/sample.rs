//! Outcome observations read from the controlled system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observed outcome, consumed once: either folded into an optimizer
/// update or discarded as invalid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    /// Whether the outcome met its target
    pub hit: bool,
    /// Range to target (m)
    pub distance_m: f64,
    /// Exit velocity (m/s)
    pub velocity_mps: f64,
    /// Launch angle (rad)
    pub angle_rad: f64,
    /// Signed miss error reported by the plant (0.0 on a perfect hit)
    #[serde(default)]
    pub error: f64,
    /// Upstream validity flag; the plant clears it for readings it knows are bad
    #[serde(default = "default_valid")]
    pub valid: bool,
}

fn default_valid() -> bool {
    true
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            timestamp: Utc::now(),
            hit: false,
            distance_m: 3.0,
            velocity_mps: 12.0,
            angle_rad: 0.7,
            error: 0.0,
            valid: true,
        }
    }
}

impl Sample {
    /// +1 for a hit, -1 for a miss, with a small distance tie-breaker.
    pub fn derived_score(&self) -> f64 {
        let base = if self.hit { 1.0 } else { -1.0 };
        if self.distance_m > 0.0 {
            base - 0.01 / self.distance_m.max(1.0)
        } else {
            base
        }
    }
}

/// A sample tagged with the coefficient value in effect when it was observed.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSample {
    pub sample: Sample,
    pub value_in_effect: f64,
}
