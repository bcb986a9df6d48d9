//! Weighing record as bound to the synchronizer

use serde::{Deserialize, Serialize};

use super::{Identity, RecordId, WorkflowState};

/// A weighing record (one vehicle pass over the scale)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeighingRecord {
    /// Absent until the record is saved
    pub identifier: Option<RecordId>,

    #[serde(rename = "state")]
    pub workflow_state: WorkflowState,

    /// Live weight in kg as held by the backend
    pub current_weight: f64,

    pub is_listening: bool,

    /// Vehicle plate, display only
    #[serde(default)]
    pub plate: String,
}

impl WeighingRecord {
    /// A new, unsaved record in draft
    pub fn unsaved() -> Self {
        Self::default()
    }

    pub fn persisted(id: RecordId, state: WorkflowState) -> Self {
        Self {
            identifier: Some(id),
            workflow_state: state,
            ..Default::default()
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.current_weight = weight;
        self
    }

    pub fn with_plate(mut self, plate: impl Into<String>) -> Self {
        self.plate = plate.into();
        self
    }

    pub fn identity(&self) -> Identity {
        Identity::from(self.identifier)
    }

    /// Apply a partial write-back
    pub fn apply(&mut self, update: &RecordUpdate) {
        if let Some(weight) = update.current_weight {
            self.current_weight = weight;
        }
        if let Some(listening) = update.is_listening {
            self.is_listening = listening;
        }
    }
}

/// Partial write-back of the live fields
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_weight: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_listening: Option<bool>,
}

impl RecordUpdate {
    pub fn weight(weight: f64) -> Self {
        Self {
            current_weight: Some(weight),
            is_listening: None,
        }
    }

    pub fn listening(mut self, listening: bool) -> Self {
        self.is_listening = Some(listening);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.current_weight.is_none() && self.is_listening.is_none()
    }
}
