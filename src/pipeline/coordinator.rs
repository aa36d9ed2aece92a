//! Tuning Coordinator - the per-tick state machine
//!
//! ```text
//! PHASE 1: Drain operator commands
//! PHASE 2: Poll interlock + read one sample (bounded by the telemetry timeout)
//! PHASE 3: Safety gate (outside TUNING_LOOP the optimizer is never touched)
//! PHASE 4: Buffer the sample; fold a full buffer into one optimizer result
//! PHASE 5: Suggest, clamp, and write whatever the throttle lets through
//! PHASE 6: Navigation and convergence (advance / previous / complete)
//! PHASE 7: Publish the status snapshot
//! ```
//!
//! The coordinator is the single writer of all tuning state. Everything else
//! talks to it through a [`ControlHandle`] and reads the published
//! [`TuningStatus`].

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::commands::{Command, ControlHandle};
use super::state::{CoordinatorState, PendingWrite, WriteSource};
use crate::acquisition::{SampleValidator, SampleVerdict};
use crate::config::{ConfigError, TunerConfig, TunerSettings};
use crate::logging::{Severity, Statistics, TracingLogger, TuningLogger};
use crate::optimization::{
    CoefficientOptimizer, OptimizerFactory, OptimizerState, StandardOptimizerFactory,
};
use crate::registry::CoefficientRegistry;
use crate::safety::{DisableReason, GateDecision, GateInputs, PauseReason, SafetyGate};
use crate::telemetry::{TelemetryError, TelemetryLink, WriteAck};
use crate::types::{
    CoefficientSpec, CoefficientSummary, PendingSample, Sample, StatusCode, TunerState,
    TuningStatus,
};

/// Run one telemetry call under `limit`, folding an elapsed timer into
/// [`TelemetryError::Timeout`].
async fn bounded<R, F>(limit: Duration, operation: &'static str, fut: F) -> Result<R, TelemetryError>
where
    F: Future<Output = Result<R, TelemetryError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(TelemetryError::Timeout { operation }),
    }
}

/// Closed-loop tuner for one telemetry link.
pub struct TuningCoordinator<T: TelemetryLink> {
    telemetry: T,
    registry: CoefficientRegistry,
    settings: TunerSettings,
    validator: SampleValidator,
    gate: SafetyGate,
    factory: Box<dyn OptimizerFactory>,
    logger: Box<dyn TuningLogger>,
    /// Optimizer bound to the active coefficient
    optimizer: Option<Box<dyn CoefficientOptimizer>>,
    state: CoordinatorState,
    commands: mpsc::UnboundedReceiver<Command>,
    handle: ControlHandle,
    status: Arc<ArcSwap<TuningStatus>>,
    cancel_token: CancellationToken,
    last_headline: Option<String>,
}

impl<T: TelemetryLink> TuningCoordinator<T> {
    /// Build a coordinator with the standard optimizer factory and a
    /// tracing-backed logger.
    pub fn from_config(config: &TunerConfig, telemetry: T) -> Result<Self, ConfigError> {
        let registry = config.registry()?;
        let known: HashSet<String> = registry.iter().map(|s| s.name.clone()).collect();
        let (tx, rx) = mpsc::unbounded_channel();
        let status = Arc::new(ArcSwap::from_pointee(TuningStatus {
            enabled: config.tuner.enabled,
            sequence_len: registry.sequence_len(),
            ..TuningStatus::default()
        }));
        let cancel_token = CancellationToken::new();
        let handle = ControlHandle::new(tx, status.clone(), cancel_token.clone(), Arc::new(known));

        info!(
            link = telemetry.link_name(),
            coefficients = registry.len(),
            sequence = registry.sequence_len(),
            optimizer = %config.optimizer.kind,
            "Initializing tuning coordinator"
        );

        Ok(Self {
            telemetry,
            settings: config.tuner.clone(),
            validator: SampleValidator::new(config.limits.clone()),
            gate: SafetyGate::new(&config.safety),
            factory: Box::new(StandardOptimizerFactory::new(config.optimizer.clone())),
            logger: Box::new(TracingLogger),
            optimizer: None,
            state: CoordinatorState::new(config.tuner.enabled),
            commands: rx,
            handle,
            status,
            cancel_token,
            last_headline: None,
            registry,
        })
    }

    pub fn with_factory(mut self, factory: impl OptimizerFactory + 'static) -> Self {
        self.factory = Box::new(factory);
        self
    }

    pub fn with_logger(mut self, logger: impl TuningLogger + 'static) -> Self {
        self.logger = Box::new(logger);
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn handle(&self) -> ControlHandle {
        self.handle.clone()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn tick_interval(&self) -> Duration {
        self.settings.tick_interval()
    }

    pub fn state(&self) -> TunerState {
        self.state.state
    }

    /// Latest published snapshot.
    pub fn status(&self) -> Arc<TuningStatus> {
        self.status.load_full()
    }

    pub fn registry(&self) -> &CoefficientRegistry {
        &self.registry
    }

    pub fn active_coefficient(&self) -> Option<&CoefficientSpec> {
        self.registry.at(self.state.position)
    }

    pub fn optimizer_state(&self) -> Option<&OptimizerState> {
        self.optimizer.as_ref().map(|o| o.state())
    }

    pub fn telemetry(&self) -> &T {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut T {
        &mut self.telemetry
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Connect the telemetry link and activate the first coefficient.
    ///
    /// A failed connect leaves the coordinator IDLE; later ticks retry.
    pub async fn start(&mut self) -> TunerState {
        if self.state.state != TunerState::Idle {
            return self.state.state;
        }

        let limit = self.settings.telemetry_timeout();
        match bounded(limit, "connect", self.telemetry.connect()).await {
            Ok(()) => {
                self.state.telemetry_failures = 0;
                info!(link = self.telemetry.link_name(), "Telemetry connected");
                self.logger.log_event(Severity::Info, "Telemetry connected");
                if self.registry.sequence_len() == 0 {
                    self.complete();
                } else {
                    self.state.state = TunerState::TuningLoop;
                    self.activate(self.state.position).await;
                }
            }
            Err(e) => self.telemetry_failed("connect", e),
        }

        self.publish().await;
        self.state.state
    }

    /// Flush telemetry and logs, then enter the terminal SHUTDOWN state.
    /// Idempotent.
    pub async fn shutdown(&mut self) {
        if self.state.state.is_terminal() {
            return;
        }

        if self.state.state != TunerState::Idle {
            let limit = self.settings.telemetry_timeout();
            match bounded(limit, "flush", self.telemetry.flush()).await {
                Ok(count) => debug!(count, "Telemetry flushed"),
                Err(e) => warn!(error = %e, "Telemetry flush failed during shutdown"),
            }
        }

        let stats = self.statistics();
        self.logger.log_event(Severity::Info, "Tuning coordinator shutting down");
        self.logger.log_statistics(&stats);
        self.logger.flush();

        self.state.state = TunerState::Shutdown;
        self.cancel_token.cancel();
        self.status.store(Arc::new(self.snapshot()));
        info!("Tuning coordinator stopped");
    }

    /// Advance the state machine by one tick at the current time.
    pub async fn tick(&mut self) -> TunerState {
        self.tick_at(Instant::now()).await
    }

    /// Advance the state machine by one tick at `now`.
    pub async fn tick_at(&mut self, now: Instant) -> TunerState {
        if self.state.state.is_terminal() {
            return self.state.state;
        }
        self.state.ticks += 1;

        // PHASE 1: Commands
        self.drain_commands();
        if self.state.shutdown_requested {
            self.shutdown().await;
            return self.state.state;
        }

        if self.state.state == TunerState::Idle && self.start().await == TunerState::Idle {
            return self.state.state;
        }
        if self.state.state == TunerState::Complete {
            self.publish().await;
            return self.state.state;
        }

        // PHASE 2: Poll
        let (telemetry_fault, sample) = self.poll().await;
        let sample = sample.and_then(|s| self.screen(s));
        self.state.quality_hold = self.gate.quality_hold(
            self.state.quality_hold,
            self.state.bad_sample_streak,
            self.state.good_sample_streak,
        );

        // PHASE 3: Gate
        let decision = self.gate.evaluate(&GateInputs {
            tuning_disallowed: self.state.safety_disabled,
            operator_enabled: self.state.operator_enabled,
            telemetry_fault,
            bad_sample_streak: self.state.bad_sample_streak,
            good_sample_streak: self.state.good_sample_streak,
            quality_paused: self.state.quality_hold,
        });
        self.apply_gate(decision);

        let mut write_fault = false;
        if self.state.state == TunerState::TuningLoop {
            // PHASE 4: Buffer + report
            if let Some(sample) = sample {
                self.buffer_sample(sample);
            }

            // PHASE 5: Suggest + write
            self.suggest();
            write_fault = self.write_pending(now).await;
        }

        // Failures count as consecutive until a whole tick passes cleanly
        if !telemetry_fault && !write_fault {
            self.state.telemetry_failures = 0;
        }

        // PHASE 6: Navigation + convergence
        self.navigate().await;

        // PHASE 7: Publish
        self.publish().await;
        self.state.state
    }

    // ========================================================================
    // PHASE 1: Commands
    // ========================================================================

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply_command(command);
        }
    }

    fn apply_command(&mut self, command: Command) {
        debug!(?command, "Operator command");
        match command {
            Command::Enable => {
                self.state.operator_enabled = true;
                self.logger.log_event(Severity::Info, "Tuning enabled by operator");
            }
            Command::Disable => {
                self.state.operator_enabled = false;
                self.logger.log_event(Severity::Info, "Tuning disabled by operator");
            }
            Command::OptimizeNow { force } => {
                let previous = self.state.optimize_requested.unwrap_or(false);
                self.state.optimize_requested = Some(previous || force);
            }
            Command::SkipNext => {
                if self.navigable() {
                    self.state.skip_requested = true;
                } else {
                    self.ignored("skip", self.state.state);
                }
            }
            Command::Previous => {
                if self.navigable() {
                    self.state.previous_requested = true;
                } else {
                    self.ignored("previous", self.state.state);
                }
            }
            Command::SetManualValue { coefficient, value } => {
                self.queue_manual_value(&coefficient, value);
            }
            Command::Shutdown => self.state.shutdown_requested = true,
        }
    }

    fn navigable(&self) -> bool {
        matches!(self.state.state, TunerState::TuningLoop | TunerState::Paused)
    }

    fn ignored(&mut self, what: &str, state: TunerState) {
        self.logger
            .log_event(Severity::Warning, &format!("Ignoring {what} command in state {state}"));
    }

    fn queue_manual_value(&mut self, name: &str, value: f64) {
        let Some(spec) = self.registry.get(name) else {
            let message = format!("Unknown coefficient '{name}'");
            self.logger.log_event(Severity::Warning, &message);
            self.state.report(StatusCode::UnknownCoefficient, message);
            return;
        };
        if !value.is_finite() {
            self.logger
                .log_event(Severity::Warning, &format!("Ignoring non-finite manual value for {name}"));
            return;
        }

        let clamped = spec.clamp(value);
        if clamped != value {
            info!(coefficient = name, requested = value, clamped, "Manual value clamped into bounds");
        }
        self.state.pending_writes.insert(
            spec.name.clone(),
            PendingWrite {
                value: clamped,
                force: false,
                source: WriteSource::Manual,
            },
        );
        self.logger
            .log_event(Severity::Info, &format!("Manual value {clamped} queued for {name}"));
    }

    // ========================================================================
    // PHASE 2: Poll
    // ========================================================================

    /// Poll the interlock and read at most one sample. Returns whether any
    /// telemetry call failed this tick.
    async fn poll(&mut self) -> (bool, Option<Sample>) {
        let limit = self.settings.telemetry_timeout();
        let mut fault = false;

        match bounded(limit, "interlock poll", self.telemetry.is_tuning_disallowed()).await {
            Ok(disallowed) => self.state.safety_disabled = disallowed,
            Err(e) => {
                fault = true;
                self.telemetry_failed("interlock poll", e);
            }
        }

        let sample = match bounded(limit, "sample read", self.telemetry.read_sample()).await {
            Ok(sample) => sample,
            Err(TelemetryError::Timeout { .. }) => {
                debug!("Sample read timed out; no data this tick");
                None
            }
            Err(e) => {
                fault = true;
                self.telemetry_failed("sample read", e);
                None
            }
        };

        (fault, sample)
    }

    /// Validate a sample and update the streaks. Returns it only if valid.
    fn screen(&mut self, sample: Sample) -> Option<Sample> {
        let verdict = self.validator.validate(&sample);
        self.state.record_verdict(verdict.is_valid());
        match verdict {
            SampleVerdict::Valid => Some(sample),
            SampleVerdict::Invalid(reason) => {
                let name = self.active_name();
                self.logger.log_sample(&name, &sample, Some(self.state.value_in_effect), false);
                self.state
                    .report(StatusCode::SampleRejected, format!("Sample rejected: {reason}"));
                None
            }
        }
    }

    fn telemetry_failed(&mut self, operation: &str, error: TelemetryError) {
        self.state.telemetry_failures = self.state.telemetry_failures.saturating_add(1);
        let failures = self.state.telemetry_failures;
        let message = format!("Telemetry {operation} failed: {error}");
        warn!(operation, failures, error = %error, "Telemetry failure");
        self.logger.log_event(Severity::Warning, &message);

        if failures >= self.settings.telemetry_failure_limit {
            self.state.report(
                StatusCode::TelemetryUnavailable,
                format!("{failures} consecutive telemetry failures; last: {message}"),
            );
        } else {
            self.state.report(StatusCode::TelemetryError, message);
        }
    }

    // ========================================================================
    // PHASE 3: Gate
    // ========================================================================

    fn apply_gate(&mut self, decision: GateDecision) {
        let (previous_state, previous_reason) = (self.state.state, self.state.pause_reason);
        let (next, reason) = match decision {
            GateDecision::Open => (TunerState::TuningLoop, None),
            GateDecision::Disabled(_) => (TunerState::Disabled, None),
            GateDecision::Paused(r) => (TunerState::Paused, Some(r)),
        };
        self.state.state = next;
        self.state.pause_reason = reason;

        if (previous_state, previous_reason) == (next, reason) {
            return;
        }

        match decision {
            GateDecision::Open => {
                self.logger
                    .log_event(Severity::Info, &format!("Tuning resumed (was {previous_state})"));
            }
            GateDecision::Disabled(why) => {
                self.state.skip_requested = false;
                self.state.previous_requested = false;
                let (code, message) = match why {
                    DisableReason::SafetyInterlock => {
                        (StatusCode::SafetyOverride, "Tuning disabled by safety interlock")
                    }
                    DisableReason::Operator => {
                        (StatusCode::OperatorDisabled, "Tuning disabled by operator")
                    }
                };
                self.logger.log_event(Severity::Warning, message);
                self.state.report(code, message);
            }
            GateDecision::Paused(PauseReason::SampleQuality) => {
                let message = format!(
                    "Tuning paused on sample quality (bad streak {}, good streak {})",
                    self.state.bad_sample_streak, self.state.good_sample_streak
                );
                self.logger.log_event(Severity::Warning, &message);
                self.state.report(StatusCode::SampleRejected, message);
            }
            GateDecision::Paused(PauseReason::Telemetry) => {
                self.logger.log_event(Severity::Warning, "Tuning paused on telemetry failure");
            }
        }
    }

    // ========================================================================
    // PHASE 4: Buffer + report
    // ========================================================================

    fn buffer_sample(&mut self, sample: Sample) {
        let name = self.active_name();
        self.logger.log_sample(&name, &sample, Some(self.state.value_in_effect), true);
        self.state.pending_samples.push(PendingSample {
            sample,
            value_in_effect: self.state.value_in_effect,
        });

        if self.state.pending_samples.len() < self.settings.min_samples_before_update.max(1) {
            return;
        }
        let Some(spec) = self.registry.at(self.state.position) else {
            return;
        };
        let Some(optimizer) = self.optimizer.as_mut() else {
            return;
        };

        let samples: Vec<Sample> = self.state.pending_samples.iter().map(|p| p.sample.clone()).collect();
        let value = self
            .state
            .pending_samples
            .first()
            .map_or(self.state.value_in_effect, |p| p.value_in_effect);
        self.state.pending_samples.clear();

        let Some(score) = spec.reducer.reduce(&samples) else {
            return;
        };
        optimizer.report_result(value, score);
        self.state.reported_since_suggest = true;

        let s = optimizer.state();
        info!(
            coefficient = %spec.name,
            value,
            score,
            iteration = s.iterations,
            best = ?s.best_value,
            "Optimizer updated"
        );
        self.logger.log_event(
            Severity::Info,
            &format!(
                "{}: value {value} scored {score:.4} over {} samples (iteration {})",
                spec.name,
                samples.len(),
                s.iterations
            ),
        );
    }

    // ========================================================================
    // PHASE 5: Suggest + write
    // ========================================================================

    fn suggest(&mut self) {
        let requested = self.state.optimize_requested.is_some();
        let automatic = self.settings.auto_optimize && self.state.reported_since_suggest;
        if !requested && !automatic {
            return;
        }
        let Some(spec) = self.registry.at(self.state.position) else {
            return;
        };
        let Some(optimizer) = self.optimizer.as_ref() else {
            return;
        };

        // A queued manual value wins until it has been written. An operator
        // request stays queued behind it; an automatic one is dropped.
        if self
            .state
            .pending_writes
            .get(&spec.name)
            .is_some_and(|w| w.source == WriteSource::Manual)
        {
            self.state.reported_since_suggest = false;
            if requested {
                debug!(coefficient = %spec.name, "Optimize request held behind queued manual value");
            }
            return;
        }

        let force = self.state.optimize_requested.take().unwrap_or(false);
        self.state.reported_since_suggest = false;

        let raw = match optimizer.suggest_next_value() {
            Ok(v) => v,
            Err(e) => {
                let fallback = optimizer.fallback_value();
                let message =
                    format!("{} ({}) failed: {e}; falling back to {fallback}", spec.name, optimizer.name());
                warn!(coefficient = %spec.name, error = %e, fallback, "Optimizer fallback");
                self.logger.log_event(Severity::Warning, &message);
                self.state.report(StatusCode::OptimizerFallback, message);
                fallback
            }
        };
        let value = spec.clamp(raw);
        if value != raw {
            debug!(coefficient = %spec.name, raw, value, "Suggestion clamped into bounds");
        }

        self.state.pending_writes.insert(
            spec.name.clone(),
            PendingWrite {
                value,
                force,
                source: WriteSource::Optimizer,
            },
        );
    }

    /// Write every pending value whose interval has elapsed. Returns whether
    /// a write failed.
    async fn write_pending(&mut self, now: Instant) -> bool {
        let names: Vec<String> = self.state.pending_writes.keys().cloned().collect();
        let limit = self.settings.telemetry_timeout();

        for name in names {
            let Some(write) = self.state.pending_writes.get(&name).copied() else {
                continue;
            };
            let Some(spec) = self.registry.get(&name).cloned() else {
                self.state.pending_writes.remove(&name);
                continue;
            };
            if !write.force && !self.state.throttle.can_write(&name, spec.min_write_interval(), now) {
                debug!(
                    coefficient = %name,
                    remaining_ms = self.state.throttle.remaining_ms(&name, spec.min_write_interval(), now),
                    "Write deferred by rate limit"
                );
                continue;
            }

            match bounded(limit, "write", self.telemetry.write_coefficient(&spec, write.value, write.force)).await {
                Ok(ack) => {
                    self.state.throttle.record(&name, write.value, now);
                    self.state.writes += 1;
                    self.state.pending_writes.remove(&name);
                    if ack == WriteAck::Deferred {
                        debug!(coefficient = %name, "Write accepted and batched by the link");
                    }

                    let active = self.registry.at(self.state.position).map(|s| s.name.as_str());
                    if active == Some(name.as_str()) && write.value != self.state.value_in_effect {
                        // Samples buffered under the old value no longer apply
                        self.state.value_in_effect = write.value;
                        self.state.pending_samples.clear();
                    }
                    info!(coefficient = %name, value = write.value, ?ack, source = ?write.source, "Coefficient written");
                    self.logger
                        .log_event(Severity::Info, &format!("Wrote {name} = {}", write.value));
                }
                Err(e) => {
                    self.telemetry_failed("write", e);
                    self.state.state = TunerState::Paused;
                    self.state.pause_reason = Some(PauseReason::Telemetry);
                    return true;
                }
            }
        }
        false
    }

    // ========================================================================
    // PHASE 6: Navigation + convergence
    // ========================================================================

    async fn navigate(&mut self) {
        if !self.navigable() {
            return;
        }

        if std::mem::take(&mut self.state.previous_requested) {
            if self.state.position == 0 {
                self.logger
                    .log_event(Severity::Info, "Already at the first coefficient; ignoring previous");
                return;
            }
            let target = self.state.position - 1;
            self.logger
                .log_event(Severity::Info, &format!("Backtracking to coefficient #{}", target + 1));
            self.activate(target).await;
            return;
        }

        let skip = std::mem::take(&mut self.state.skip_requested);
        let converged = self.state.state == TunerState::TuningLoop
            && self.settings.auto_advance
            && self.optimizer.as_ref().is_some_and(|o| o.is_converged());
        if skip || converged {
            self.advance(skip).await;
        }
    }

    async fn advance(&mut self, skipped: bool) {
        if let Some(summary) = self.summarize_active() {
            let verb = if skipped { "skipped" } else { "converged" };
            let message = format!(
                "{} {verb} after {} iterations (best {:?}, score {:?})",
                summary.name, summary.iterations, summary.best_value, summary.best_score
            );
            info!(coefficient = %summary.name, skipped, "{message}");
            self.logger.log_event(Severity::Info, &message);
            self.state.completed.push(summary);
        }

        let next = self.state.position + 1;
        if next >= self.registry.sequence_len() {
            self.complete();
        } else {
            self.activate(next).await;
        }
    }

    /// Bind a fresh optimizer to the coefficient at `position`.
    ///
    /// The value in effect is read back from the link, else the last value
    /// this process wrote, else the configured initial value.
    async fn activate(&mut self, position: usize) {
        let Some(spec) = self.registry.at(position).cloned() else {
            self.complete();
            return;
        };
        let optimizer = self.factory.create(&spec);

        let limit = self.settings.telemetry_timeout();
        let read_back = match bounded(limit, "coefficient read", self.telemetry.read_coefficient(&spec)).await {
            Ok(v) => v.filter(|v| v.is_finite()),
            Err(e) => {
                warn!(coefficient = %spec.name, error = %e, "Could not read value in effect");
                None
            }
        };
        let value = read_back
            .or_else(|| self.state.throttle.last_value(&spec.name))
            .unwrap_or(spec.initial);

        self.state.reset_for_activation(position, value);
        let message = format!(
            "Tuning {} ({}/{}) with {} optimizer, starting at {value}",
            spec.name,
            position + 1,
            self.registry.sequence_len(),
            optimizer.name()
        );
        info!(coefficient = %spec.name, position, value, "{message}");
        self.logger.log_event(Severity::Info, &message);
        self.optimizer = Some(optimizer);
    }

    fn complete(&mut self) {
        self.state.state = TunerState::Complete;
        self.state.pause_reason = None;
        self.state.position = self.registry.sequence_len();
        self.state.pending_samples.clear();
        self.optimizer = None;

        info!(completed = self.state.completed.len(), "Tuning complete");
        self.logger.log_event(Severity::Info, "Tuning complete");
        let stats = self.statistics();
        self.logger.log_statistics(&stats);
    }

    fn summarize_active(&self) -> Option<CoefficientSummary> {
        let spec = self.registry.at(self.state.position)?;
        let optimizer = self.optimizer.as_ref()?;
        let s = optimizer.state();
        Some(CoefficientSummary {
            name: spec.name.clone(),
            iterations: s.iterations,
            best_value: s.best_value.unwrap_or(self.state.value_in_effect),
            best_score: s.best_score,
            converged: optimizer.is_converged(),
        })
    }

    fn active_name(&self) -> String {
        self.registry
            .at(self.state.position)
            .map(|s| s.name.clone())
            .unwrap_or_default()
    }

    // ========================================================================
    // PHASE 7: Publish
    // ========================================================================

    fn snapshot(&self) -> TuningStatus {
        let spec = self.registry.at(self.state.position);
        let opt = self.optimizer.as_ref();
        let s = opt.map(|o| o.state());

        TuningStatus {
            state: self.state.state,
            enabled: self.state.operator_enabled,
            active_coefficient: spec.map(|c| c.name.clone()),
            active_index: spec.map(|_| self.state.position),
            sequence_len: self.registry.sequence_len(),
            iteration: s.map_or(0, |s| s.iterations),
            converged: opt.is_some_and(|o| o.is_converged()),
            best_value: s.and_then(|s| s.best_value),
            best_score: s.and_then(|s| s.best_score),
            current_value: spec.map(|_| self.state.value_in_effect),
            step_size: s.map(|s| s.step_size),
            pending_samples: self.state.pending_samples.len(),
            pending_write: spec
                .and_then(|c| self.state.pending_writes.get(&c.name))
                .map(|w| w.value),
            recent_scores: s
                .map(|s| s.recent_scores(self.settings.recent_score_window))
                .unwrap_or_default(),
            bad_sample_streak: self.state.bad_sample_streak,
            good_sample_streak: self.state.good_sample_streak,
            telemetry_failures: self.state.telemetry_failures,
            writes: self.state.writes,
            ticks: self.state.ticks,
            last_error: self.state.last_error.clone(),
            completed: self.state.completed.clone(),
        }
    }

    async fn publish(&mut self) {
        let status = self.snapshot();
        let headline = status.headline();
        self.status.store(Arc::new(status));

        if self.state.state == TunerState::Idle || self.last_headline.as_deref() == Some(headline.as_str()) {
            return;
        }
        let limit = self.settings.telemetry_timeout();
        match bounded(limit, "status publish", self.telemetry.publish_status(&headline)).await {
            Ok(()) => self.last_headline = Some(headline),
            Err(e) => debug!(error = %e, "Status publish failed"),
        }
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    pub fn statistics(&self) -> Statistics {
        let mut stats = Statistics::new();
        stats.insert("state".into(), json!(self.state.state.to_string()));
        stats.insert("ticks".into(), json!(self.state.ticks));
        stats.insert("writes".into(), json!(self.state.writes));
        stats.insert("samples_accepted".into(), json!(self.state.samples_accepted));
        stats.insert("samples_rejected".into(), json!(self.state.samples_rejected));
        stats.insert("telemetry_failures".into(), json!(self.state.telemetry_failures));
        stats.insert("coefficients_total".into(), json!(self.registry.sequence_len()));
        stats.insert("coefficients_completed".into(), json!(self.state.completed.len()));
        stats.insert(
            "uptime_secs".into(),
            json!(self.state.started_at.elapsed().as_secs_f64()),
        );
        for summary in &self.state.completed {
            stats.insert(
                format!("best.{}", summary.name),
                json!({
                    "value": summary.best_value,
                    "score": summary.best_score,
                    "iterations": summary.iterations,
                    "converged": summary.converged,
                }),
            );
        }
        stats
    }
}

impl<T: TelemetryLink> std::fmt::Debug for TuningCoordinator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TuningCoordinator")
            .field("link", &self.telemetry.link_name())
            .field("state", &self.state.state)
            .field("position", &self.state.position)
            .field("ticks", &self.state.ticks)
            .field("writes", &self.state.writes)
            .finish()
    }
}
