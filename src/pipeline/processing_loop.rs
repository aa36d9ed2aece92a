//! Tick loop that drives a [`TuningCoordinator`] at the configured poll rate.
//!
//! Runs on one tokio task and owns the coordinator outright. Stops when the
//! cancel token fires (Ctrl+C or a `Shutdown` command) and always finishes
//! with the coordinator's flush-and-shutdown sequence.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::coordinator::TuningCoordinator;
use crate::logging::Statistics;
use crate::telemetry::TelemetryLink;

// ============================================================================
// Tuning Loop
// ============================================================================

pub struct TuningLoop<T: TelemetryLink> {
    coordinator: TuningCoordinator<T>,
    tick_interval: Duration,
    cancel_token: CancellationToken,
}

impl<T: TelemetryLink> TuningLoop<T> {
    pub fn new(coordinator: TuningCoordinator<T>) -> Self {
        let tick_interval = coordinator.tick_interval();
        let cancel_token = coordinator.cancel_token();
        Self {
            coordinator,
            tick_interval,
            cancel_token,
        }
    }

    /// Override the tick period (tests run faster than real hardware).
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Run until cancelled or the coordinator shuts itself down. Returns the
    /// final session statistics.
    pub async fn run(mut self) -> Statistics {
        info!(
            tick_ms = self.tick_interval.as_millis() as u64,
            "Tuning loop starting"
        );
        self.coordinator.start().await;

        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Shutdown signal received, stopping tuning loop");
                    break;
                }
                _ = interval.tick() => {
                    if self.coordinator.tick().await.is_terminal() {
                        break;
                    }
                }
            }
        }

        self.coordinator.shutdown().await;
        let stats = self.coordinator.statistics();
        log_final_statistics(&stats);
        stats
    }
}

fn log_final_statistics(stats: &Statistics) {
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("FINAL STATISTICS");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for (key, value) in stats {
        info!("   {:<28} {}", key, value);
    }
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TunerConfig;
    use crate::telemetry::{SimulatedPlant, SimulationOptions};
    use crate::types::TunerState;

    fn coordinator() -> TuningCoordinator<SimulatedPlant> {
        let plant = SimulatedPlant::new(SimulationOptions {
            seed: Some(3),
            interlock_period: 0,
            ..SimulationOptions::default()
        });
        TuningCoordinator::from_config(&TunerConfig::default(), plant).unwrap()
    }

    #[tokio::test]
    async fn handle_shutdown_stops_the_loop() {
        let c = coordinator();
        let handle = c.handle();
        let task = tokio::spawn(TuningLoop::new(c).with_tick_interval(Duration::from_millis(5)).run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown();
        let stats = task.await.unwrap();

        assert_eq!(handle.status().state, TunerState::Shutdown);
        assert!(stats["ticks"].as_u64().unwrap_or(0) > 0);
    }
}
