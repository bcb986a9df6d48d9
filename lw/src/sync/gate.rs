//! Workflow state gate

use tracing::debug;

use crate::domain::{WeighingRecord, WorkflowState};

/// Outcome of the per-tick state check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Halt(WorkflowState),
}

/// Stops polling once the bound record reaches a terminal state
///
/// Runs before any fetch and regardless of whether the record has an
/// identifier: an unsaved form can still carry a terminal state.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateGate;

impl StateGate {
    pub fn check(&self, record: &WeighingRecord) -> GateDecision {
        if record.workflow_state.is_terminal() {
            debug!(state = %record.workflow_state, identifier = ?record.identifier, "StateGate::check: terminal");
            GateDecision::Halt(record.workflow_state)
        } else {
            GateDecision::Proceed
        }
    }
}
