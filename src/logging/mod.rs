//! Tuning session logging
//!
//! The coordinator reports samples, events and end-of-run statistics to a
//! [`TuningLogger`]. Loggers never fail from the caller's point of view:
//! I/O problems are reported through `tracing` and otherwise swallowed.

mod jsonl;

pub use jsonl::JsonlLogger;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::types::Sample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// End-of-run statistics, keyed by metric name.
pub type Statistics = BTreeMap<String, serde_json::Value>;

/// Sink for tuning session records.
pub trait TuningLogger: Send {
    /// One validated (or rejected) sample and the value in effect for it.
    fn log_sample(&mut self, coefficient: &str, sample: &Sample, value_in_effect: Option<f64>, accepted: bool);

    fn log_event(&mut self, severity: Severity, message: &str);

    fn log_statistics(&mut self, statistics: &Statistics);

    fn flush(&mut self) {}
}

/// Routes every record to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl TuningLogger for TracingLogger {
    fn log_sample(&mut self, coefficient: &str, sample: &Sample, value_in_effect: Option<f64>, accepted: bool) {
        debug!(
            coefficient,
            hit = sample.hit,
            distance_m = sample.distance_m,
            value = value_in_effect,
            accepted,
            "Sample"
        );
    }

    fn log_event(&mut self, severity: Severity, message: &str) {
        match severity {
            Severity::Debug => debug!("{}", message),
            Severity::Info => info!("{}", message),
            Severity::Warning => warn!("{}", message),
            Severity::Error => error!("{}", message),
        }
    }

    fn log_statistics(&mut self, statistics: &Statistics) {
        for (key, value) in statistics {
            info!(metric = %key, %value, "Session statistic");
        }
    }
}

/// Fan-out to several loggers (e.g. tracing plus a session file).
impl TuningLogger for Vec<Box<dyn TuningLogger>> {
    fn log_sample(&mut self, coefficient: &str, sample: &Sample, value_in_effect: Option<f64>, accepted: bool) {
        for logger in self.iter_mut() {
            logger.log_sample(coefficient, sample, value_in_effect, accepted);
        }
    }

    fn log_event(&mut self, severity: Severity, message: &str) {
        for logger in self.iter_mut() {
            logger.log_event(severity, message);
        }
    }

    fn log_statistics(&mut self, statistics: &Statistics) {
        for logger in self.iter_mut() {
            logger.log_statistics(statistics);
        }
    }

    fn flush(&mut self) {
        for logger in self.iter_mut() {
            logger.flush();
        }
    }
}
