//! tuneloop: closed-loop coefficient tuning
//!
//! Tunes the numeric coefficients of a live controlled system one at a time
//! from observed outcomes.
//!
//! ## Architecture
//!
//! - **Registry**: validated coefficient table and tuning order
//! - **Acquisition**: physical plausibility checks on incoming samples
//! - **Optimization**: suggest/report/converge optimizers (quasi-random,
//!   Gaussian-process surrogate, manual hold) plus the write throttle
//! - **Safety**: interlock, operator toggle and data-quality gate
//! - **Pipeline**: the single-writer coordinator, its tick loop and the
//!   command queue front-ends use to steer it
//! - **Telemetry**: the link to the controlled system (simulated plant included)
//! - **Logging**: session event sinks (tracing, JSON lines)
//! - **API**: HTTP control surface

pub mod acquisition;
pub mod api;
pub mod config;
pub mod logging;
pub mod optimization;
pub mod pipeline;
pub mod registry;
pub mod safety;
pub mod telemetry;
pub mod types;

pub use config::{ConfigError, TunerConfig};
pub use pipeline::{Command, ControlError, ControlHandle, TuningCoordinator, TuningLoop};
pub use registry::CoefficientRegistry;
pub use telemetry::{TelemetryError, TelemetryLink, WriteAck};
pub use types::{CoefficientSpec, Sample, StatusCode, TunerState, TuningStatus};
