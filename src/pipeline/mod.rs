//! Tuning Pipeline Module
//!
//! ```text
//! ControlHandle ──commands──▶ TuningCoordinator ◀──tick── TuningLoop
//!       ▲                        │        │
//!       └──── TuningStatus ◀─────┘        └──▶ TelemetryLink / TuningLogger
//! ```
//!
//! The coordinator is the only writer of tuning state. Front-ends (HTTP API,
//! binary) hold a [`ControlHandle`].

mod coordinator;
mod state;
pub mod commands;
pub mod processing_loop;

pub use commands::{Command, ControlError, ControlHandle};
pub use coordinator::TuningCoordinator;
pub use processing_loop::TuningLoop;
pub use state::{CoordinatorState, PendingWrite, WriteSource};
