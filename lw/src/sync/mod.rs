//! Live weight synchronization
//!
//! A [`LiveValueSynchronizer`] polls the backend for the live scale weight
//! of its bound record and writes material changes back into the binding.
//! Each tick runs the same pipeline:
//!
//! 1. [`StateGate`] halts polling once the workflow is terminal
//! 2. [`SourceResolver`] reads the record, or the global reading while unsaved
//! 3. [`ChangeDetector`] drops changes within tolerance
//! 4. the binding is updated and the local [`SyncState`] refreshed
//!
//! Ticks are driven by a [`PollScheduler`] and never overlap.

mod config;
mod detector;
mod error;
mod gate;
mod resolver;
mod scheduler;
mod synchronizer;

pub use config::SyncConfig;
pub use detector::{ChangeDetector, DEFAULT_TOLERANCE};
pub use error::{RefreshError, SyncError};
pub use gate::{GateDecision, StateGate};
pub use resolver::{Reading, Resolution, SourceResolver};
pub use scheduler::PollScheduler;
pub use synchronizer::{LiveValueSynchronizer, SyncState, TickOutcome, WIDGET_NAME};
