//! LiveValueSynchronizer: the per-record polling pipeline

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use super::{
    ChangeDetector, GateDecision, PollScheduler, Reading, RefreshError, Resolution, SourceResolver, StateGate,
    SyncConfig,
};
use crate::backend::{Backend, RecordBinding};
use crate::config::BackendConfig;
use crate::domain::{RecordId, RecordUpdate, WorkflowState};

/// Name the synchronizer is registered under in the host's widget registry
pub const WIDGET_NAME: &str = "live_weight";

/// Local view of the live weight, owned by one synchronizer
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncState {
    pub last_known_weight: f64,

    /// Local time of the last accepted change
    pub last_update_timestamp: Option<String>,
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Workflow is terminal; polling stops
    Halted(WorkflowState),

    /// Weight changed beyond tolerance and was written back
    Updated { weight: f64, listening: Option<bool> },

    /// Weight within tolerance of the last known value
    Unchanged,

    /// The identified record was not found
    Missing(RecordId),

    /// Fetch or write-back failed; retried on the next tick
    Failed(String),

    /// Detached while the tick was in flight; nothing written
    Detached,
}

impl TickOutcome {
    /// Whether polling must end after this tick
    pub fn stops_polling(&self) -> bool {
        matches!(self, Self::Halted(_) | Self::Detached)
    }
}

#[derive(Debug, Default)]
struct Lifecycle {
    detached: AtomicBool,
    halted: AtomicBool,
}

impl Lifecycle {
    fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }
}

/// Everything a tick touches; locked for the whole tick
struct SyncCore {
    binding: Arc<dyn RecordBinding>,
    gate: StateGate,
    resolver: SourceResolver,
    detector: ChangeDetector,
    timestamp_format: String,
    state: SyncState,
    state_tx: watch::Sender<SyncState>,
    lifecycle: Arc<Lifecycle>,
}

impl SyncCore {
    /// Take the last known weight from the record as it stands now
    ///
    /// Subscribers are not notified: nothing was accepted from the backend.
    async fn seed(&mut self) {
        let weight = self.binding.snapshot().await.current_weight;
        debug!(previous = self.state.last_known_weight, weight, "SyncCore::seed: called");
        self.state.last_known_weight = weight;
        self.state_tx.send_if_modified(|state| {
            state.last_known_weight = weight;
            false
        });
    }

    async fn tick(&mut self) -> TickOutcome {
        if self.lifecycle.is_detached() {
            return TickOutcome::Detached;
        }

        // Identifier and state are re-read every tick: the host may have
        // saved or reloaded the record since the last one.
        let record = self.binding.snapshot().await;
        let identity = record.identity();
        debug!(%identity, state = %record.workflow_state, "SyncCore::tick: called");

        if let GateDecision::Halt(state) = self.gate.check(&record) {
            self.lifecycle.halted.store(true, Ordering::SeqCst);
            info!(%identity, %state, "Workflow finished, stopping live weight polling");
            return TickOutcome::Halted(state);
        }

        let reading = match self.resolver.resolve(identity).await {
            Ok(Resolution::Reading(reading)) => reading,
            Ok(Resolution::Missing(id)) => {
                info!(%id, "Weighing record not found, keeping last known weight");
                return TickOutcome::Missing(id);
            }
            Err(e) => {
                warn!(%identity, error = %e, "Failed to fetch live weight");
                return TickOutcome::Failed(e.to_string());
            }
        };

        if !self.detector.has_changed(self.state.last_known_weight, reading.weight) {
            debug!(
                previous = self.state.last_known_weight,
                candidate = reading.weight,
                "SyncCore::tick: within tolerance"
            );
            return TickOutcome::Unchanged;
        }

        if self.lifecycle.is_detached() {
            debug!("SyncCore::tick: detached during fetch, dropping result");
            return TickOutcome::Detached;
        }

        self.accept(reading).await
    }

    async fn accept(&mut self, reading: Reading) -> TickOutcome {
        let mut update = RecordUpdate::weight(reading.weight);
        if let Some(listening) = reading.listening {
            update = update.listening(listening);
        }

        if let Err(e) = self.binding.update(update).await {
            warn!(error = %e, weight = reading.weight, "Failed to write live weight back to record");
            return TickOutcome::Failed(e.to_string());
        }

        let timestamp = chrono::Local::now().format(&self.timestamp_format).to_string();
        info!(
            previous = self.state.last_known_weight,
            weight = reading.weight,
            %timestamp,
            "Live weight updated"
        );
        self.state.last_known_weight = reading.weight;
        self.state.last_update_timestamp = Some(timestamp);
        self.state_tx.send_replace(self.state.clone());

        TickOutcome::Updated {
            weight: reading.weight,
            listening: reading.listening,
        }
    }
}

/// Keeps a bound record's live weight in sync with the backend
///
/// Created when the widget mounts, [`attach`](Self::attach)ed to start
/// polling and [`detach`](Self::detach)ed when it unmounts. Dropping the
/// synchronizer stops its timer as well.
pub struct LiveValueSynchronizer {
    core: Arc<Mutex<SyncCore>>,
    scheduler: PollScheduler,
    lifecycle: Arc<Lifecycle>,
    state_rx: watch::Receiver<SyncState>,
}

impl LiveValueSynchronizer {
    /// Bind to a record; the last known weight starts at the record's
    /// current weight and is taken again when polling begins
    pub async fn new(
        binding: Arc<dyn RecordBinding>,
        backend: Arc<dyn Backend>,
        sync: &SyncConfig,
        backend_config: &BackendConfig,
    ) -> Self {
        let initial = binding.snapshot().await;
        debug!(
            identifier = ?initial.identifier,
            weight = initial.current_weight,
            "LiveValueSynchronizer::new: called"
        );

        let state = SyncState {
            last_known_weight: initial.current_weight,
            last_update_timestamp: None,
        };
        let (state_tx, state_rx) = watch::channel(state.clone());
        let lifecycle = Arc::new(Lifecycle::default());

        let core = SyncCore {
            binding,
            gate: StateGate,
            resolver: SourceResolver::new(backend, backend_config.clone(), sync.fetch_timeout()),
            detector: ChangeDetector::new(sync.tolerance),
            timestamp_format: sync.timestamp_format.clone(),
            state,
            state_tx,
            lifecycle: lifecycle.clone(),
        };

        Self {
            core: Arc::new(Mutex::new(core)),
            scheduler: PollScheduler::from_config(sync),
            lifecycle,
            state_rx,
        }
    }

    /// Start polling; false when already polling, detached, or halted
    pub fn attach(&mut self) -> bool {
        if self.lifecycle.is_detached() || self.lifecycle.is_halted() {
            debug!("LiveValueSynchronizer::attach: not attachable");
            return false;
        }

        let core = self.core.clone();
        let mut seeded = false;
        self.scheduler.start(move || {
            let core = core.clone();
            let seed = !std::mem::replace(&mut seeded, true);
            async move {
                let mut core = core.lock().await;
                if seed {
                    // The host may have edited the record since construction
                    core.seed().await;
                }
                let outcome = core.tick().await;
                if outcome.stops_polling() {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
        })
    }

    /// Stop polling for good; no reads or writes happen afterwards
    pub fn detach(&mut self) {
        debug!("LiveValueSynchronizer::detach: called");
        self.lifecycle.detached.store(true, Ordering::SeqCst);
        self.scheduler.stop();
    }

    /// Run one tick now, outside the schedule
    ///
    /// Refused while another tick is in flight rather than queued behind it.
    /// A terminal outcome stops the timer just as a scheduled tick would.
    pub async fn refresh_now(&self) -> Result<TickOutcome, RefreshError> {
        if self.lifecycle.is_detached() {
            return Err(RefreshError::Detached);
        }
        let outcome = {
            let mut core = self.core.try_lock().map_err(|_| {
                debug!("LiveValueSynchronizer::refresh_now: tick in flight, skipping");
                RefreshError::InFlight
            })?;
            core.tick().await
        };
        if outcome.stops_polling() {
            self.scheduler.halt();
        }
        Ok(outcome)
    }

    pub fn is_polling(&self) -> bool {
        self.scheduler.is_active()
    }

    /// True once a terminal workflow state was observed
    pub fn is_halted(&self) -> bool {
        self.lifecycle.is_halted()
    }

    pub fn is_detached(&self) -> bool {
        self.lifecycle.is_detached()
    }

    /// Current local state
    pub fn state(&self) -> SyncState {
        self.state_rx.borrow().clone()
    }

    /// Receiver notified on every accepted change, for re-rendering
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state_rx.clone()
    }
}

impl Drop for LiveValueSynchronizer {
    fn drop(&mut self) {
        self.detach();
    }
}
