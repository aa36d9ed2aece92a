//! Shared data structures for the tuning daemon
//!
//! - `CoefficientSpec`: what may be tuned, within which bounds
//! - `Sample`: one observed outcome from the controlled system
//! - `TuningStatus`: the snapshot published after every tick

mod coefficient;
mod sample;
mod status;

pub use coefficient::*;
pub use sample::*;
pub use status::*;
