//! Simulated plant for running the daemon without real hardware
//!
//! Each coefficient gets a hidden optimum drawn uniformly from its range the
//! first time the plant sees it. The hit probability of every shot falls
//! off with the normalised distance of the values in effect from their
//! optima, so a working tuner visibly raises the hit rate.
//!
//! Also simulates:
//! - Ticks with no new shot
//! - Occasional implausible readings
//! - A write-rate limit with batched (deferred) writes
//! - A periodic interlock window

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::{debug, info};

use super::{TelemetryError, TelemetryLink, WriteAck};
use crate::optimization::WriteThrottle;
use crate::types::{CoefficientSpec, Sample};

/// Probability floor and ceiling for a hit.
const MIN_HIT_PROBABILITY: f64 = 0.15;
const MAX_HIT_PROBABILITY: f64 = 0.95;

/// How sharply the hit probability drops away from the optimum.
const SHARPNESS: f64 = 12.0;

#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub seed: Option<u64>,
    /// Chance that a given read produces a new shot
    pub shot_probability: f64,
    /// Chance that a produced shot is implausible
    pub invalid_probability: f64,
    /// Interlock cycle length in reads (0 disables the interlock)
    pub interlock_period: u64,
    /// Reads at the end of each cycle during which tuning is disallowed
    pub interlock_length: u64,
    /// The link's own minimum spacing between writes of one key
    pub min_write_interval: Duration,
    /// Number of connect attempts that fail before one succeeds
    pub failed_connects: u32,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            seed: None,
            shot_probability: 0.5,
            invalid_probability: 0.03,
            interlock_period: 1200,
            interlock_length: 100,
            min_write_interval: Duration::from_millis(100),
            failed_connects: 0,
        }
    }
}

struct Channel {
    optimum: f64,
    span: f64,
    value: f64,
}

pub struct SimulatedPlant {
    options: SimulationOptions,
    rng: StdRng,
    connected: bool,
    connect_attempts: u32,
    reads: u64,
    channels: HashMap<String, Channel>,
    pending: HashMap<String, f64>,
    throttle: WriteThrottle,
    last_status: Option<String>,
    shots: u64,
    hits: u64,
}

impl SimulatedPlant {
    pub fn new(options: SimulationOptions) -> Self {
        let rng = match options.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            options,
            rng,
            connected: false,
            connect_attempts: 0,
            reads: 0,
            channels: HashMap::new(),
            pending: HashMap::new(),
            throttle: WriteThrottle::new(),
            last_status: None,
            shots: 0,
            hits: 0,
        }
    }

    /// Hidden optimum for `key`, if the plant has seen it.
    pub fn optimum(&self, key: &str) -> Option<f64> {
        self.channels.get(key).map(|c| c.optimum)
    }

    pub fn last_status(&self) -> Option<&str> {
        self.last_status.as_deref()
    }

    /// Observed hit rate so far.
    pub fn hit_rate(&self) -> f64 {
        if self.shots == 0 {
            0.0
        } else {
            self.hits as f64 / self.shots as f64
        }
    }

    fn channel(&mut self, spec: &CoefficientSpec) -> &mut Channel {
        let rng = &mut self.rng;
        self.channels
            .entry(spec.telemetry_key.clone())
            .or_insert_with(|| Channel {
                optimum: rng.gen_range(spec.min..=spec.max),
                span: spec.span(),
                value: spec.initial,
            })
    }

    fn hit_probability(&self) -> f64 {
        let penalty: f64 = self
            .channels
            .values()
            .map(|c| ((c.value - c.optimum) / c.span).powi(2))
            .sum();
        MIN_HIT_PROBABILITY + (MAX_HIT_PROBABILITY - MIN_HIT_PROBABILITY) * (-SHARPNESS * penalty).exp()
    }

    fn apply_due_writes(&mut self, now: Instant) {
        let interval = self.options.min_write_interval;
        let due: Vec<String> = self
            .pending
            .keys()
            .filter(|k| self.throttle.can_write(k, interval, now))
            .cloned()
            .collect();
        for key in due {
            if let Some(value) = self.pending.remove(&key) {
                self.apply(&key, value, now);
            }
        }
    }

    fn apply(&mut self, key: &str, value: f64, now: Instant) {
        if let Some(channel) = self.channels.get_mut(key) {
            channel.value = value;
        }
        self.throttle.record(key, value, now);
        debug!(key, value, "Simulated plant applied write");
    }

    fn gauss(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    fn generate_shot(&mut self) -> Sample {
        self.shots += 1;
        let hit = self.rng.gen_bool(self.hit_probability().clamp(0.0, 1.0));
        if hit {
            self.hits += 1;
        }

        let distance = self.rng.gen_range(1.5..8.0);
        let velocity = 8.0 + 1.2 * distance + 0.3 * self.gauss();
        let angle = 0.45 + 0.06 * distance + 0.02 * self.gauss();
        let error = if hit {
            0.02 * self.gauss()
        } else {
            0.3 * self.gauss() + 0.2_f64.copysign(self.gauss())
        };

        let mut sample = Sample {
            timestamp: Utc::now(),
            hit,
            distance_m: distance,
            velocity_mps: velocity,
            angle_rad: angle,
            error,
            valid: true,
        };

        if self.rng.gen_bool(self.options.invalid_probability.clamp(0.0, 1.0)) {
            // Either a sensor glitch the plant knows about, or one it does not
            if self.rng.gen_bool(0.5) {
                sample.valid = false;
            } else {
                sample.distance_m = 40.0;
            }
        }
        sample
    }
}

#[async_trait]
impl TelemetryLink for SimulatedPlant {
    fn link_name(&self) -> &str {
        "simulated"
    }

    async fn connect(&mut self) -> Result<(), TelemetryError> {
        self.connect_attempts += 1;
        if self.connect_attempts <= self.options.failed_connects {
            return Err(TelemetryError::Connect(format!(
                "simulated refusal {}/{}",
                self.connect_attempts, self.options.failed_connects
            )));
        }
        self.connected = true;
        info!("Simulated plant connected");
        Ok(())
    }

    async fn read_sample(&mut self) -> Result<Option<Sample>, TelemetryError> {
        if !self.connected {
            return Err(TelemetryError::NotConnected);
        }
        self.reads += 1;
        self.apply_due_writes(Instant::now());

        if !self.rng.gen_bool(self.options.shot_probability.clamp(0.0, 1.0)) {
            return Ok(None);
        }
        Ok(Some(self.generate_shot()))
    }

    async fn write_coefficient(
        &mut self,
        spec: &CoefficientSpec,
        value: f64,
        force: bool,
    ) -> Result<WriteAck, TelemetryError> {
        if !self.connected {
            return Err(TelemetryError::NotConnected);
        }
        self.channel(spec);

        let now = Instant::now();
        let key = spec.telemetry_key.as_str();
        if !force && !self.throttle.can_write(key, self.options.min_write_interval, now) {
            self.pending.insert(key.to_string(), value);
            debug!(key, value, "Queueing write due to rate limit");
            return Ok(WriteAck::Deferred);
        }

        self.pending.remove(key);
        self.apply(key, value, now);
        Ok(WriteAck::Written)
    }

    async fn is_tuning_disallowed(&mut self) -> Result<bool, TelemetryError> {
        if !self.connected {
            return Err(TelemetryError::NotConnected);
        }
        let period = self.options.interlock_period;
        if period == 0 {
            return Ok(false);
        }
        let phase = self.reads % period;
        Ok(phase >= period.saturating_sub(self.options.interlock_length))
    }

    async fn read_coefficient(
        &mut self,
        spec: &CoefficientSpec,
    ) -> Result<Option<f64>, TelemetryError> {
        if !self.connected {
            return Err(TelemetryError::NotConnected);
        }
        Ok(Some(self.channel(spec).value))
    }

    async fn publish_status(&mut self, status: &str) -> Result<(), TelemetryError> {
        if self.last_status.as_deref() != Some(status) {
            debug!(status, "Simulated plant status");
            self.last_status = Some(status.to_string());
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<usize, TelemetryError> {
        let now = Instant::now();
        let pending: Vec<(String, f64)> = self.pending.drain().collect();
        let count = pending.len();
        for (key, value) in pending {
            self.apply(&key, value, now);
        }
        if count > 0 {
            info!(count, "Flushed batched writes");
        }
        Ok(count)
    }
}
