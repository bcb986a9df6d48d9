//! Domain types for live weight synchronization
//!
//! The weighing record as seen from the synchronizer: an optional stable id,
//! the workflow state that gates polling, and the two live fields the
//! synchronizer is allowed to write back.

mod identity;
mod record;
mod state;

pub use identity::{Identity, RecordId};
pub use record::{RecordUpdate, WeighingRecord};
pub use state::WorkflowState;

/// Remote field holding the live weight
pub const FIELD_CURRENT_WEIGHT: &str = "current_weight";

/// Remote field flagging whether a scale feed is attributed to the record
pub const FIELD_IS_LISTENING: &str = "is_listening";

/// Remote field holding the workflow state
pub const FIELD_STATE: &str = "state";
