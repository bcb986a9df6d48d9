//! Source resolution: which backend call yields the live weight

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::SyncError;
use crate::backend::{Backend, BackendError, FieldMap};
use crate::config::BackendConfig;
use crate::domain::{FIELD_CURRENT_WEIGHT, FIELD_IS_LISTENING, Identity, RecordId};

/// A fetched weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub weight: f64,

    /// Only known when read from the record itself
    pub listening: Option<bool>,
}

/// Result of a successful fetch
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    Reading(Reading),

    /// The identified record no longer exists
    Missing(RecordId),
}

#[derive(Debug, Deserialize)]
struct LatestReadingReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    weight: Option<f64>,
    #[serde(default)]
    message: Option<String>,
}

/// Fetches the live weight for the current identity
///
/// A saved record is read directly. An unsaved one has nothing to read
/// yet, so the global latest reading is used instead, letting the user see
/// the scale before saving.
pub struct SourceResolver {
    backend: Arc<dyn Backend>,
    config: BackendConfig,
    fetch_timeout: Option<Duration>,
}

impl SourceResolver {
    pub fn new(backend: Arc<dyn Backend>, config: BackendConfig, fetch_timeout: Option<Duration>) -> Self {
        Self {
            backend,
            config,
            fetch_timeout,
        }
    }

    pub async fn resolve(&self, identity: Identity) -> Result<Resolution, SyncError> {
        debug!(%identity, "SourceResolver::resolve: called");
        match identity {
            Identity::Identified(id) => self.read_record(id).await,
            Identity::Unidentified => self.read_latest().await.map(Resolution::Reading),
        }
    }

    async fn read_record(&self, id: RecordId) -> Result<Resolution, SyncError> {
        let fields = [FIELD_CURRENT_WEIGHT, FIELD_IS_LISTENING];
        let rows = self
            .with_deadline(self.backend.read_fields(&self.config.model, &[id], &fields))
            .await?;

        let Some(row) = rows.into_iter().next() else {
            debug!(%id, "SourceResolver::read_record: empty result");
            return Ok(Resolution::Missing(id));
        };

        Ok(Resolution::Reading(Reading {
            weight: parse_weight(&row)?,
            listening: Some(parse_listening(&row)?),
        }))
    }

    async fn read_latest(&self) -> Result<Reading, SyncError> {
        let reply = self
            .with_deadline(self.backend.call_procedure(
                &self.config.model,
                &self.config.latest_reading_procedure,
                json!({}),
            ))
            .await?;

        let weight = match reply {
            Value::Null | Value::Bool(false) => {
                debug!("SourceResolver::read_latest: no reply, using zero");
                0.0
            }
            reply => {
                let reply: LatestReadingReply = serde_json::from_value(reply)?;
                match (reply.success, reply.weight) {
                    (true, Some(weight)) => weight,
                    _ => {
                        debug!(message = ?reply.message, "SourceResolver::read_latest: no reading, using zero");
                        0.0
                    }
                }
            }
        };

        Ok(Reading {
            weight,
            listening: None,
        })
    }

    async fn with_deadline<T, F>(&self, call: F) -> Result<T, BackendError>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        match self.fetch_timeout {
            Some(deadline) => tokio::time::timeout(deadline, call)
                .await
                .map_err(|_| BackendError::Timeout(deadline))?,
            None => call.await,
        }
    }
}

// Empty numeric fields come back as null or false
fn parse_weight(row: &FieldMap) -> Result<f64, SyncError> {
    match row.get(FIELD_CURRENT_WEIGHT) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(0.0),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| SyncError::InvalidField {
            field: FIELD_CURRENT_WEIGHT,
            value: Value::Number(n.clone()),
        }),
        Some(other) => Err(SyncError::InvalidField {
            field: FIELD_CURRENT_WEIGHT,
            value: other.clone(),
        }),
    }
}

fn parse_listening(row: &FieldMap) -> Result<bool, SyncError> {
    match row.get(FIELD_IS_LISTENING) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(SyncError::InvalidField {
            field: FIELD_IS_LISTENING,
            value: other.clone(),
        }),
    }
}
