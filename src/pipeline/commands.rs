//! Operator commands and the handle used to send them
//!
//! Front-ends never touch coordinator state. They queue a [`Command`] through
//! a [`ControlHandle`]; the coordinator drains the queue at the start of the
//! next tick and reads back through the published status snapshot.

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::TuningStatus;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Enable,
    Disable,
    /// Ask the optimizer for a suggestion on the next tick
    OptimizeNow {
        #[serde(default)]
        force: bool,
    },
    SkipNext,
    Previous,
    /// Bypass the optimizer; still clamped and rate limited
    SetManualValue { coefficient: String, value: f64 },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error("tuning coordinator has shut down")]
    Closed,

    #[error("unknown coefficient '{0}'")]
    UnknownCoefficient(String),

    #[error("value {0} is not a finite number")]
    NonFiniteValue(f64),
}

/// Cloneable control surface for one coordinator.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::UnboundedSender<Command>,
    status: Arc<ArcSwap<TuningStatus>>,
    cancel_token: CancellationToken,
    coefficients: Arc<HashSet<String>>,
}

impl ControlHandle {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<Command>,
        status: Arc<ArcSwap<TuningStatus>>,
        cancel_token: CancellationToken,
        coefficients: Arc<HashSet<String>>,
    ) -> Self {
        Self {
            tx,
            status,
            cancel_token,
            coefficients,
        }
    }

    /// Queue a raw command.
    pub fn send(&self, command: Command) -> Result<(), ControlError> {
        if let Command::SetManualValue { coefficient, value } = &command {
            if !self.coefficients.contains(coefficient) {
                return Err(ControlError::UnknownCoefficient(coefficient.clone()));
            }
            if !value.is_finite() {
                return Err(ControlError::NonFiniteValue(*value));
            }
        }
        self.tx.send(command).map_err(|_| ControlError::Closed)
    }

    pub fn enable(&self) -> Result<(), ControlError> {
        self.send(Command::Enable)
    }

    pub fn disable(&self) -> Result<(), ControlError> {
        self.send(Command::Disable)
    }

    pub fn trigger_optimization(&self, force: bool) -> Result<(), ControlError> {
        self.send(Command::OptimizeNow { force })
    }

    pub fn skip_to_next(&self) -> Result<(), ControlError> {
        self.send(Command::SkipNext)
    }

    pub fn previous(&self) -> Result<(), ControlError> {
        self.send(Command::Previous)
    }

    pub fn set_manual_value(&self, coefficient: &str, value: f64) -> Result<(), ControlError> {
        self.send(Command::SetManualValue {
            coefficient: coefficient.to_string(),
            value,
        })
    }

    /// Latest published snapshot. Lock-free.
    pub fn status(&self) -> Arc<TuningStatus> {
        self.status.load_full()
    }

    /// Request a graceful stop and wake the tick loop.
    pub fn shutdown(&self) {
        // The loop may already be gone; cancelling the token is enough then
        let _ = self.tx.send(Command::Shutdown);
        self.cancel_token.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (ControlHandle, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let known: HashSet<String> = ["kDrag".to_string()].into_iter().collect();
        let handle = ControlHandle::new(
            tx,
            Arc::new(ArcSwap::from_pointee(TuningStatus::default())),
            CancellationToken::new(),
            Arc::new(known),
        );
        (handle, rx)
    }

    #[test]
    fn commands_are_queued_in_order() {
        let (handle, mut rx) = handle();
        handle.disable().unwrap();
        handle.trigger_optimization(true).unwrap();
        handle.set_manual_value("kDrag", 0.004).unwrap();
        assert_eq!(rx.try_recv().unwrap(), Command::Disable);
        assert_eq!(rx.try_recv().unwrap(), Command::OptimizeNow { force: true });
        assert_eq!(
            rx.try_recv().unwrap(),
            Command::SetManualValue {
                coefficient: "kDrag".into(),
                value: 0.004
            }
        );
    }

    #[test]
    fn unknown_coefficient_rejected_up_front() {
        let (handle, mut rx) = handle();
        assert_eq!(
            handle.set_manual_value("nope", 1.0),
            Err(ControlError::UnknownCoefficient("nope".into()))
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn non_finite_manual_value_rejected() {
        let (handle, _rx) = handle();
        assert!(matches!(
            handle.set_manual_value("kDrag", f64::NAN),
            Err(ControlError::NonFiniteValue(_))
        ));
    }

    #[test]
    fn closed_queue_reports_error() {
        let (handle, rx) = handle();
        drop(rx);
        assert_eq!(handle.enable(), Err(ControlError::Closed));
    }

    #[test]
    fn shutdown_cancels_token() {
        let (handle, mut rx) = handle();
        handle.shutdown();
        assert!(handle.is_shutting_down());
        assert_eq!(rx.try_recv().unwrap(), Command::Shutdown);
    }

    #[test]
    fn commands_deserialize_from_json() {
        let cmd: Command = serde_json::from_str(r#"{"command":"optimize_now"}"#).unwrap();
        assert_eq!(cmd, Command::OptimizeNow { force: false });
    }
}
