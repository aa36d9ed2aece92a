//! Coordinator State
//!
//! Everything the tick mutates, in one struct owned by the coordinator.
//! Nothing outside `TuningCoordinator::tick` writes to it; the rest of the
//! process only ever sees the published `TuningStatus` snapshot.

use std::collections::BTreeMap;
use std::time::Instant;

use crate::optimization::WriteThrottle;
use crate::safety::PauseReason;
use crate::types::{CoefficientSummary, PendingSample, StatusCode, StatusMessage, TunerState};

/// Who asked for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteSource {
    Optimizer,
    Manual,
}

/// A clamped value waiting for its coefficient's write interval to elapse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingWrite {
    pub value: f64,
    /// Bypass the write interval once
    pub force: bool,
    pub source: WriteSource,
}

// ============================================================================
// Coordinator State
// ============================================================================

#[derive(Debug)]
pub struct CoordinatorState {
    pub state: TunerState,

    /// Position of the active coefficient within the tuning sequence
    pub position: usize,

    /// Accepted samples not yet folded into an update
    pub pending_samples: Vec<PendingSample>,

    /// Value assumed in effect for the active coefficient
    pub value_in_effect: f64,

    /// Operator toggle
    pub operator_enabled: bool,

    /// External interlock seen on the last poll
    pub safety_disabled: bool,

    pub pause_reason: Option<PauseReason>,

    pub bad_sample_streak: u32,
    pub good_sample_streak: u32,

    /// Data-quality hold; outlives other pauses until a good streak clears it
    pub quality_hold: bool,

    /// Consecutive failed telemetry round-trips
    pub telemetry_failures: u32,

    /// Per-coefficient last write time and value
    pub throttle: WriteThrottle,

    /// Writes waiting on the throttle, keyed by coefficient name
    pub pending_writes: BTreeMap<String, PendingWrite>,

    /// A result was reported since the last suggestion
    pub reported_since_suggest: bool,

    /// Operator asked for a suggestion now (`Some(force)`)
    pub optimize_requested: Option<bool>,

    pub skip_requested: bool,
    pub previous_requested: bool,
    pub shutdown_requested: bool,

    pub last_error: Option<StatusMessage>,

    /// Results of coefficients already left behind, in visit order
    pub completed: Vec<CoefficientSummary>,

    // === Session counters ===
    pub ticks: u64,
    pub writes: u64,
    pub samples_accepted: u64,
    pub samples_rejected: u64,
    pub started_at: Instant,
}

impl CoordinatorState {
    pub fn new(operator_enabled: bool) -> Self {
        Self {
            state: TunerState::Idle,
            position: 0,
            pending_samples: Vec::new(),
            value_in_effect: 0.0,
            operator_enabled,
            safety_disabled: false,
            pause_reason: None,
            bad_sample_streak: 0,
            good_sample_streak: 0,
            quality_hold: false,
            telemetry_failures: 0,
            throttle: WriteThrottle::new(),
            pending_writes: BTreeMap::new(),
            reported_since_suggest: false,
            optimize_requested: None,
            skip_requested: false,
            previous_requested: false,
            shutdown_requested: false,
            last_error: None,
            completed: Vec::new(),
            ticks: 0,
            writes: 0,
            samples_accepted: 0,
            samples_rejected: 0,
            started_at: Instant::now(),
        }
    }

    /// Record a user-visible condition for the status snapshot.
    pub fn report(&mut self, code: StatusCode, message: impl Into<String>) {
        self.last_error = Some(StatusMessage::new(code, message));
    }

    /// Count one sample verdict and update the streaks.
    pub fn record_verdict(&mut self, valid: bool) {
        if valid {
            self.samples_accepted += 1;
            self.good_sample_streak = self.good_sample_streak.saturating_add(1);
            self.bad_sample_streak = 0;
        } else {
            self.samples_rejected += 1;
            self.bad_sample_streak = self.bad_sample_streak.saturating_add(1);
            self.good_sample_streak = 0;
        }
    }

    /// Drop per-coefficient progress when the active coefficient changes.
    ///
    /// Manual writes survive: they target a named coefficient, not the
    /// active one.
    pub fn reset_for_activation(&mut self, position: usize, value_in_effect: f64) {
        self.position = position;
        self.value_in_effect = value_in_effect;
        self.pending_samples.clear();
        self.pending_writes.retain(|_, w| w.source == WriteSource::Manual);
        self.reported_since_suggest = false;
        self.optimize_requested = None;
        self.skip_requested = false;
        self.previous_requested = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sample;

    #[test]
    fn verdicts_drive_streaks() {
        let mut s = CoordinatorState::new(true);
        s.record_verdict(false);
        s.record_verdict(false);
        assert_eq!((s.bad_sample_streak, s.good_sample_streak), (2, 0));
        s.record_verdict(true);
        assert_eq!((s.bad_sample_streak, s.good_sample_streak), (0, 1));
        assert_eq!((s.samples_accepted, s.samples_rejected), (1, 2));
    }

    #[test]
    fn activation_keeps_manual_writes_only() {
        let mut s = CoordinatorState::new(true);
        s.pending_samples.push(PendingSample {
            sample: Sample::default(),
            value_in_effect: 0.5,
        });
        s.pending_writes.insert(
            "a".into(),
            PendingWrite {
                value: 0.1,
                force: false,
                source: WriteSource::Optimizer,
            },
        );
        s.pending_writes.insert(
            "b".into(),
            PendingWrite {
                value: 0.2,
                force: false,
                source: WriteSource::Manual,
            },
        );
        s.reported_since_suggest = true;

        s.reset_for_activation(1, 0.3);

        assert!(s.pending_samples.is_empty());
        assert_eq!(s.pending_writes.keys().collect::<Vec<_>>(), vec!["b"]);
        assert!(!s.reported_since_suggest);
        assert_eq!(s.position, 1);
        assert_eq!(s.value_in_effect, 0.3);
    }

    #[test]
    fn starts_idle() {
        let s = CoordinatorState::new(false);
        assert_eq!(s.state, TunerState::Idle);
        assert!(!s.operator_enabled);
        assert!(!s.quality_hold);
    }
}
