//! Record identifiers

use serde::{Deserialize, Serialize};

/// Stable backend key of a persisted weighing record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(RecordId)
            .map_err(|_| format!("Invalid record id: {}", s))
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Whether the bound record has been persisted yet
///
/// Drives the source selection: an identified record is read directly,
/// an unidentified one (new, unsaved form) falls back to the global reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Identified(RecordId),
    Unidentified,
}

impl Identity {
    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            Self::Identified(id) => Some(*id),
            Self::Unidentified => None,
        }
    }
}

impl From<Option<RecordId>> for Identity {
    fn from(id: Option<RecordId>) -> Self {
        match id {
            Some(id) => Self::Identified(id),
            None => Self::Unidentified,
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identified(id) => write!(f, "#{}", id),
            Self::Unidentified => write!(f, "<unsaved>"),
        }
    }
}
