//! Scale simulator
//!
//! Stands in for the serial scale bridge: produces readings that wobble
//! around a vehicle weight and feeds them to the backend, both as the global
//! reading and, through the scale-facing update procedure, onto the newest
//! open weighing.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::backend::{Backend, InMemoryBackend};
use crate::config::SimulatorConfig;
use crate::domain::RecordId;

/// Vibration applied to the fixed weight, in kg
const FIXED_JITTER: f64 = 2.0;

/// Chance per reading that a new vehicle drives on
const NEW_VEHICLE_PROBABILITY: f64 = 0.1;

/// How simulated weights are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SimulatorMode {
    /// Random vehicle weights within the configured range
    #[default]
    Random,
    /// A single fixed weight
    Fixed,
}

impl std::fmt::Display for SimulatorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Random => write!(f, "random"),
            Self::Fixed => write!(f, "fixed"),
        }
    }
}

/// Counters reported when the simulator stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatorStats {
    pub readings: u64,
    pub global_sent: u64,
    pub record_sent: u64,
}

#[derive(Debug, Deserialize)]
struct UpdateWeightReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActiveWeighingReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    record_id: Option<RecordId>,
}

/// Generates scale readings
pub struct ScaleSimulator {
    config: SimulatorConfig,
    rng: StdRng,
    base_weight: Option<f64>,
}

impl ScaleSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            rng: StdRng::from_os_rng(),
            base_weight: None,
        }
    }

    /// Deterministic readings, for tests
    pub fn with_seed(config: SimulatorConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            base_weight: None,
        }
    }

    /// Forget the current vehicle; the next random reading draws a new one
    pub fn reset_vehicle(&mut self) {
        self.base_weight = None;
    }

    /// Next weight in kg, rounded to 2 decimals and never negative
    pub fn next_reading(&mut self) -> f64 {
        let raw = match self.config.mode {
            SimulatorMode::Fixed => self.config.fixed_weight + self.rng.random_range(-FIXED_JITTER..=FIXED_JITTER),
            SimulatorMode::Random => {
                let current = self.base_weight;
                let base = match current {
                    Some(base) if self.rng.random::<f64>() >= NEW_VEHICLE_PROBABILITY => base,
                    _ => {
                        let base = self.rng.random_range(self.config.min_weight..=self.config.max_weight);
                        debug!(base, "ScaleSimulator::next_reading: new vehicle");
                        self.base_weight = Some(base);
                        base
                    }
                };
                let jitter = self.config.jitter.abs();
                base + self.rng.random_range(-jitter..=jitter)
            }
        };
        (raw.max(0.0) * 100.0).round() / 100.0
    }

    /// Feed readings into `backend` until `shutdown` flips to true
    pub async fn run(mut self, backend: Arc<InMemoryBackend>, mut shutdown: watch::Receiver<bool>) -> SimulatorStats {
        info!(mode = %self.config.mode, interval_ms = self.config.interval_ms, "Scale simulator started");

        let mut stats = SimulatorStats::default();
        let mut last_global: Option<f64> = None;
        let mut last_active: Option<RecordId> = None;
        let mut last_sent: Option<(RecordId, f64)> = None;
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let active = active_weighing(&backend).await;
            if active != last_active {
                if let Some(id) = active {
                    info!(%id, "New active weighing");
                    self.reset_vehicle();
                }
                last_active = active;
            }

            let weight = self.next_reading();
            stats.readings += 1;

            if last_global != Some(weight) {
                backend.push_global_reading(weight).await;
                last_global = Some(weight);
                stats.global_sent += 1;
            }

            let Some(active) = active else {
                continue;
            };
            if last_sent != Some((active, weight)) && update_weight(&backend, active, weight).await {
                debug!(%active, weight, "ScaleSimulator::run: reading sent");
                last_sent = Some((active, weight));
                stats.record_sent += 1;
            }
        }

        info!(?stats, "Scale simulator stopped");
        stats
    }
}

fn with_api_key(backend: &InMemoryBackend, mut args: serde_json::Value) -> serde_json::Value {
    if let Some(key) = &backend.config().api_key {
        args["api_key"] = json!(key);
    }
    args
}

async fn update_weight(backend: &InMemoryBackend, id: RecordId, weight: f64) -> bool {
    let config = backend.config();
    let args = with_api_key(backend, json!({ "record_id": id, "weight": weight }));
    let reply = match backend
        .call_procedure(&config.model, &config.update_weight_procedure, args)
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            warn!(%id, error = %e, "Failed to send reading");
            return false;
        }
    };

    match serde_json::from_value::<UpdateWeightReply>(reply) {
        Ok(UpdateWeightReply { success: true, .. }) => true,
        Ok(UpdateWeightReply { message, .. }) => {
            warn!(%id, message = message.as_deref().unwrap_or(""), "Reading rejected");
            false
        }
        Err(e) => {
            warn!(error = %e, "Malformed update weight reply");
            false
        }
    }
}

async fn active_weighing(backend: &InMemoryBackend) -> Option<RecordId> {
    let config = backend.config();
    let args = with_api_key(backend, json!({}));
    let reply = match backend
        .call_procedure(&config.model, &config.active_weighing_procedure, args)
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "Failed to look up active weighing");
            return None;
        }
    };

    match serde_json::from_value::<ActiveWeighingReply>(reply) {
        Ok(ActiveWeighingReply {
            success: true,
            record_id: Some(id),
        }) => Some(id),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "Malformed active weighing reply");
            None
        }
    }
}
