//! Sample acquisition
//!
//! Plausibility checks applied to every observation before it can reach an
//! optimizer.

pub mod validator;

pub use validator::{RejectReason, SampleValidator, SampleVerdict};
