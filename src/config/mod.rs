//! Tuner Configuration Module
//!
//! Coefficient table, loop timing, safety thresholds and optimizer settings,
//! loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line
//! 2. `TUNELOOP_CONFIG` environment variable (path to TOML file)
//! 3. `tuner_config.toml` in the current working directory
//! 4. Built-in defaults
//!
//! A file that is found but fails to parse or validate is fatal. The loaded
//! config is passed by value into the coordinator; there is no global.

mod tuner_config;
pub mod defaults;
pub mod validation;

pub use tuner_config::*;
