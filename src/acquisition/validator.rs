//! Physical plausibility checks for outcome samples.

use serde::Serialize;

use crate::config::PhysicalLimits;
use crate::types::Sample;

/// Why a sample was rejected. The first failing check wins.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// The plant flagged the reading as bad itself
    UpstreamInvalid,
    NonFinite { field: &'static str },
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UpstreamInvalid => write!(f, "sample flagged invalid upstream"),
            Self::NonFinite { field } => write!(f, "{field} is not finite"),
            Self::OutOfRange { field, value, min, max } => {
                write!(f, "{field} = {value:.3} outside [{min}, {max}]")
            }
        }
    }
}

/// Outcome of validating one sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum SampleVerdict {
    Valid,
    Invalid(RejectReason),
}

impl SampleVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Checks samples against configured physical limits.
///
/// Stateless; streak counting lives in the coordinator.
#[derive(Debug, Clone)]
pub struct SampleValidator {
    limits: PhysicalLimits,
}

impl Default for SampleValidator {
    fn default() -> Self {
        Self::new(PhysicalLimits::default())
    }
}

impl SampleValidator {
    pub fn new(limits: PhysicalLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &PhysicalLimits {
        &self.limits
    }

    /// Validate a sample.
    ///
    /// Checks in order:
    /// - upstream validity flag
    /// - every numeric field is finite
    /// - distance, velocity and angle within their limits
    pub fn validate(&self, sample: &Sample) -> SampleVerdict {
        if !sample.valid {
            return SampleVerdict::Invalid(RejectReason::UpstreamInvalid);
        }

        let fields: [(&'static str, f64); 4] = [
            ("distance_m", sample.distance_m),
            ("velocity_mps", sample.velocity_mps),
            ("angle_rad", sample.angle_rad),
            ("error", sample.error),
        ];
        if let Some(&(field, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return SampleVerdict::Invalid(RejectReason::NonFinite { field });
        }

        let l = &self.limits;
        let ranges: [(&'static str, f64, f64, f64); 3] = [
            ("distance_m", sample.distance_m, l.min_distance_m, l.max_distance_m),
            ("velocity_mps", sample.velocity_mps, l.min_velocity_mps, l.max_velocity_mps),
            ("angle_rad", sample.angle_rad, l.min_angle_rad, l.max_angle_rad),
        ];
        for (field, value, min, max) in ranges {
            if value < min || value > max {
                return SampleVerdict::Invalid(RejectReason::OutOfRange { field, value, min, max });
            }
        }

        SampleVerdict::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sample_is_valid() {
        assert!(SampleValidator::default().validate(&Sample::default()).is_valid());
    }

    #[test]
    fn upstream_flag_checked_first() {
        let sample = Sample {
            valid: false,
            distance_m: f64::NAN,
            ..Sample::default()
        };
        assert_eq!(
            SampleValidator::default().validate(&sample),
            SampleVerdict::Invalid(RejectReason::UpstreamInvalid)
        );
    }

    #[test]
    fn non_finite_rejected() {
        let sample = Sample {
            velocity_mps: f64::INFINITY,
            ..Sample::default()
        };
        assert_eq!(
            SampleValidator::default().validate(&sample),
            SampleVerdict::Invalid(RejectReason::NonFinite { field: "velocity_mps" })
        );
    }

    #[test]
    fn bounds_are_inclusive() {
        let v = SampleValidator::default();
        let at_min = Sample {
            distance_m: 1.0,
            ..Sample::default()
        };
        let at_max = Sample {
            distance_m: 10.0,
            ..Sample::default()
        };
        assert!(v.validate(&at_min).is_valid());
        assert!(v.validate(&at_max).is_valid());
    }

    #[test]
    fn out_of_range_angle_reports_field() {
        let sample = Sample {
            angle_rad: 2.0,
            ..Sample::default()
        };
        match SampleValidator::default().validate(&sample) {
            SampleVerdict::Invalid(RejectReason::OutOfRange { field, .. }) => assert_eq!(field, "angle_rad"),
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[test]
    fn custom_limits_apply() {
        let limits = PhysicalLimits {
            max_velocity_mps: 10.0,
            ..PhysicalLimits::default()
        };
        let verdict = SampleValidator::new(limits).validate(&Sample::default());
        assert!(!verdict.is_valid());
        assert!(matches!(verdict, SampleVerdict::Invalid(ref r) if r.to_string().contains("velocity_mps")));
    }
}
