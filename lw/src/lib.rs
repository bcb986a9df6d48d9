//! LiveWeight - live scale weight synchronization for weighing records
//!
//! A weighing form shows the weight currently on the scale. The value lives
//! in the backend, fed by a scale bridge; this crate keeps the form's bound
//! record in step with it.
//!
//! # Modules
//!
//! - [`sync`] - The synchronizer: scheduler, state gate, source resolver, change detector
//! - [`backend`] - Backend and record binding traits, in-memory implementations
//! - [`domain`] - Weighing record, workflow state, identifiers
//! - [`simulator`] - Simulated scale feeding the in-memory backend
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod backend;
pub mod cli;
pub mod config;
pub mod domain;
pub mod simulator;
pub mod sync;

// Re-export commonly used types
pub use backend::{Backend, BackendError, FieldMap, InMemoryBackend, RecordBinding, SharedRecord};
pub use config::{BackendConfig, Config, SimulatorConfig};
pub use domain::{Identity, RecordId, RecordUpdate, WeighingRecord, WorkflowState};
pub use simulator::{ScaleSimulator, SimulatorMode, SimulatorStats};
pub use sync::{
    ChangeDetector, LiveValueSynchronizer, PollScheduler, RefreshError, SourceResolver, StateGate, SyncConfig,
    SyncError, SyncState, TickOutcome, WIDGET_NAME,
};
