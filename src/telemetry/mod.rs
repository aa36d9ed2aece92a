//! Telemetry link abstraction
//!
//! The coordinator talks to the controlled system only through
//! [`TelemetryLink`]: samples come in, coefficient writes go out, and the
//! external interlock is polled once per tick. Transport details
//! (connection management, wire format, internal batching) stay behind the
//! trait.

mod simulated;

pub use simulated::{SimulatedPlant, SimulationOptions};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::types::{CoefficientSpec, Sample};

/// Recoverable telemetry failure. The coordinator pauses and retries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryError {
    #[error("telemetry link is not connected")]
    NotConnected,

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("read failed: {0}")]
    Read(String),

    #[error("write of {key} failed: {reason}")]
    Write { key: String, reason: String },

    #[error("{operation} timed out")]
    Timeout { operation: &'static str },
}

/// What the link did with a coefficient write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAck {
    /// Applied immediately
    Written,
    /// Queued by the link's own rate limit; delivered on a later flush
    Deferred,
}

/// Connection to the controlled system.
///
/// Implementations enforce their own write-rate limit independently of
/// the coordinator. Every call is wrapped in a timeout by the caller, so
/// implementations should not block for long.
#[async_trait]
pub trait TelemetryLink: Send + 'static {
    /// Human-readable name for logging (e.g. "simulated", "nt").
    fn link_name(&self) -> &str;

    async fn connect(&mut self) -> Result<(), TelemetryError>;

    /// Next outcome observation, or `None` when nothing new arrived.
    async fn read_sample(&mut self) -> Result<Option<Sample>, TelemetryError>;

    /// Write `value` under `spec.telemetry_key`. `force` bypasses the link's
    /// own rate limit.
    async fn write_coefficient(
        &mut self,
        spec: &CoefficientSpec,
        value: f64,
        force: bool,
    ) -> Result<WriteAck, TelemetryError>;

    /// External must-not-tune-now signal (e.g. competition mode).
    async fn is_tuning_disallowed(&mut self) -> Result<bool, TelemetryError>;

    /// Value currently in effect on the controlled system, if the link can
    /// read it back.
    async fn read_coefficient(
        &mut self,
        _spec: &CoefficientSpec,
    ) -> Result<Option<f64>, TelemetryError> {
        Ok(None)
    }

    /// One-line status for operator feedback on the controlled side.
    async fn publish_status(&mut self, _status: &str) -> Result<(), TelemetryError> {
        Ok(())
    }

    /// Deliver any writes the link deferred. Returns how many were written.
    async fn flush(&mut self) -> Result<usize, TelemetryError> {
        Ok(0)
    }
}
