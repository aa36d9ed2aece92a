//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Tick Loop
// ============================================================================

/// Tick rate of the coordinator loop (Hz).
pub const POLL_RATE_HZ: f64 = 10.0;

/// Accepted samples folded into one optimizer update.
pub const MIN_SAMPLES_BEFORE_UPDATE: usize = 3;

/// Upper bound on any single telemetry call (ms). Must stay below one tick.
pub const TELEMETRY_TIMEOUT_MS: u64 = 50;

/// Consecutive telemetry failures before the link is reported unavailable.
pub const TELEMETRY_FAILURE_LIMIT: u32 = 5;

/// Number of recent optimizer scores kept in the status snapshot.
pub const RECENT_SCORE_WINDOW: usize = 10;

// ============================================================================
// Safety
// ============================================================================

/// Bad-sample streak that, once exceeded, pauses tuning.
pub const MAX_BAD_SAMPLES: u32 = 5;

/// Consecutive good samples required to leave a data-quality pause.
pub const REQUIRED_GOOD_SAMPLES: u32 = 3;

// ============================================================================
// Physical Plausibility
// ============================================================================

pub const MIN_DISTANCE_M: f64 = 1.0;
pub const MAX_DISTANCE_M: f64 = 10.0;
pub const MIN_VELOCITY_MPS: f64 = 5.0;
pub const MAX_VELOCITY_MPS: f64 = 30.0;
/// ~10 degrees
pub const MIN_ANGLE_RAD: f64 = 0.17;
/// ~90 degrees
pub const MAX_ANGLE_RAD: f64 = 1.57;

// ============================================================================
// Optimizer
// ============================================================================

/// Quasi-random suggestions before the surrogate model takes over.
pub const INITIAL_POINTS: usize = 5;

/// Exploration bonus in the expected-improvement acquisition.
pub const EXPLORATION_XI: f64 = 0.01;

/// Candidates scored per acquisition pass (global grid).
pub const CANDIDATE_COUNT: usize = 200;

/// Step size never decays below this fraction of its initial value.
pub const MIN_STEP_RATIO: f64 = 0.1;

/// Observation noise added to the surrogate kernel diagonal.
pub const NOISE_VARIANCE: f64 = 0.05;

/// Default exploration seed.
pub const OPTIMIZER_SEED: u64 = 5892;

// ============================================================================
// Server
// ============================================================================

/// Control API bind address.
pub const SERVER_ADDR: &str = "127.0.0.1:8090";
