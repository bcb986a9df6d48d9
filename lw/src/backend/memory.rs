//! In-process backend holding weighing records and the global scale reading

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::debug;

use super::{Backend, BackendError, FieldMap};
use crate::config::BackendConfig;
use crate::domain::{FIELD_CURRENT_WEIGHT, FIELD_IS_LISTENING, FIELD_STATE, RecordId, WeighingRecord, WorkflowState};

/// Backend kept entirely in memory
///
/// Serves the same calls a remote host would: field reads on the weighing
/// model, the global latest-reading lookup, and the two scale-facing
/// procedures (active-weighing lookup and weight update). When an API key is
/// configured the scale-facing procedures reject calls that do not carry it.
pub struct InMemoryBackend {
    config: BackendConfig,
    records: RwLock<BTreeMap<RecordId, WeighingRecord>>,
    global_reading: RwLock<Option<f64>>,
    latency: Option<Duration>,
    pending_failures: AtomicUsize,
    read_calls: AtomicUsize,
    procedure_calls: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            records: RwLock::new(BTreeMap::new()),
            global_reading: RwLock::new(None),
            latency: None,
            pending_failures: AtomicUsize::new(0),
            read_calls: AtomicUsize::new(0),
            procedure_calls: AtomicUsize::new(0),
        }
    }

    /// Delay every call, to stand in for network round trips
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Insert or replace a record; records without an identifier are rejected
    pub async fn insert(&self, record: WeighingRecord) -> Option<RecordId> {
        let id = record.identifier?;
        debug!(%id, state = %record.workflow_state, "InMemoryBackend::insert: called");
        self.records.write().await.insert(id, record);
        Some(id)
    }

    pub async fn remove(&self, id: RecordId) -> Option<WeighingRecord> {
        debug!(%id, "InMemoryBackend::remove: called");
        self.records.write().await.remove(&id)
    }

    pub async fn get(&self, id: RecordId) -> Option<WeighingRecord> {
        self.records.read().await.get(&id).cloned()
    }

    /// Move a record to another workflow state; returns false when unknown
    pub async fn set_state(&self, id: RecordId, state: WorkflowState) -> bool {
        debug!(%id, %state, "InMemoryBackend::set_state: called");
        match self.records.write().await.get_mut(&id) {
            Some(record) => {
                record.workflow_state = state;
                true
            }
            None => false,
        }
    }

    /// Attribute a scale reading to a record
    pub async fn push_reading(&self, id: RecordId, weight: f64) -> bool {
        match self.records.write().await.get_mut(&id) {
            Some(record) => {
                record.current_weight = weight;
                record.is_listening = true;
                true
            }
            None => {
                debug!(%id, "InMemoryBackend::push_reading: unknown record");
                false
            }
        }
    }

    /// Publish a reading not attributed to any record
    pub async fn push_global_reading(&self, weight: f64) {
        *self.global_reading.write().await = Some(weight);
    }

    pub async fn clear_global_reading(&self) {
        *self.global_reading.write().await = None;
    }

    /// Make the next `count` calls fail with a transport error
    pub fn fail_next(&self, count: usize) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn procedure_calls(&self) -> usize {
        self.procedure_calls.load(Ordering::SeqCst)
    }

    async fn before_call(&self) -> Result<(), BackendError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let injected = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            debug!("InMemoryBackend::before_call: injecting failure");
            return Err(BackendError::Transport("injected failure".to_string()));
        }
        Ok(())
    }

    fn check_model(&self, model: &str) -> Result<(), BackendError> {
        if model != self.config.model {
            return Err(BackendError::UnknownModel(model.to_string()));
        }
        Ok(())
    }

    fn field_value(record: &WeighingRecord, field: &str) -> Result<Value, BackendError> {
        match field {
            "id" => Ok(json!(record.identifier)),
            FIELD_CURRENT_WEIGHT => Ok(json!(record.current_weight)),
            FIELD_IS_LISTENING => Ok(json!(record.is_listening)),
            FIELD_STATE => Ok(json!(record.workflow_state)),
            "plate" => Ok(json!(record.plate)),
            other => Err(BackendError::InvalidResponse(format!("Unknown field: {}", other))),
        }
    }

    async fn latest_reading(&self) -> Value {
        match *self.global_reading.read().await {
            Some(weight) => json!({ "success": true, "weight": weight }),
            None => json!({ "success": false, "message": "No reading available" }),
        }
    }

    fn authorized(&self, args: &Value) -> bool {
        match &self.config.api_key {
            Some(expected) => args.get("api_key").and_then(Value::as_str) == Some(expected.as_str()),
            None => true,
        }
    }

    async fn update_weight(&self, args: &Value) -> Value {
        let id = args.get("record_id").and_then(Value::as_u64).map(RecordId);
        let weight = args.get("weight").and_then(Value::as_f64);
        let (Some(id), Some(weight)) = (id, weight) else {
            return json!({ "success": false, "message": "record_id and weight are required" });
        };

        if self.push_reading(id, weight).await {
            json!({ "success": true, "weight": weight })
        } else {
            json!({ "success": false, "message": "Weighing not found" })
        }
    }

    async fn active_weighing(&self) -> Value {
        let records = self.records.read().await;
        let active = records.values().rev().find(|r| r.workflow_state.is_open());

        match active {
            Some(record) => json!({
                "success": true,
                "record_id": record.identifier,
                "state": record.workflow_state,
                "plate": record.plate,
            }),
            None => json!({ "success": false, "message": "No open weighing" }),
        }
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn read_fields(&self, model: &str, ids: &[RecordId], fields: &[&str]) -> Result<Vec<FieldMap>, BackendError> {
        debug!(%model, ?ids, ?fields, "InMemoryBackend::read_fields: called");
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;
        self.check_model(model)?;

        let records = self.records.read().await;
        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(record) = records.get(id) else {
                debug!(%id, "InMemoryBackend::read_fields: record not found, skipping");
                continue;
            };

            let mut row = FieldMap::new();
            row.insert("id".to_string(), json!(id));
            for field in fields {
                row.insert((*field).to_string(), Self::field_value(record, field)?);
            }
            rows.push(row);
        }
        Ok(rows)
    }

    async fn call_procedure(&self, model: &str, procedure: &str, args: Value) -> Result<Value, BackendError> {
        debug!(%model, %procedure, %args, "InMemoryBackend::call_procedure: called");
        self.procedure_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;
        self.check_model(model)?;

        if procedure == self.config.latest_reading_procedure {
            Ok(self.latest_reading().await)
        } else if procedure == self.config.active_weighing_procedure || procedure == self.config.update_weight_procedure {
            if !self.authorized(&args) {
                debug!(%procedure, "InMemoryBackend::call_procedure: rejected API key");
                return Ok(json!({ "success": false, "message": "Invalid API key" }));
            }
            if procedure == self.config.active_weighing_procedure {
                Ok(self.active_weighing().await)
            } else {
                Ok(self.update_weight(&args).await)
            }
        } else {
            Err(BackendError::UnknownProcedure {
                model: model.to_string(),
                procedure: procedure.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> InMemoryBackend {
        InMemoryBackend::new(BackendConfig::default())
    }

    #[tokio::test]
    async fn test_read_fields_returns_requested_fields() {
        let backend = backend();
        backend
            .insert(WeighingRecord::persisted(RecordId(42), WorkflowState::InTransit).with_weight(10.5))
            .await;

        let rows = backend
            .read_fields(
                "weighing.record",
                &[RecordId(42)],
                &[FIELD_CURRENT_WEIGHT, FIELD_IS_LISTENING],
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][FIELD_CURRENT_WEIGHT], json!(10.5));
        assert_eq!(rows[0][FIELD_IS_LISTENING], json!(false));
        assert_eq!(rows[0]["id"], json!(42));
        assert!(!rows[0].contains_key(FIELD_STATE));
        assert_eq!(backend.read_calls(), 1);
    }

    #[tokio::test]
    async fn test_read_fields_skips_missing_ids() {
        let backend = backend();
        let rows = backend
            .read_fields("weighing.record", &[RecordId(7)], &[FIELD_CURRENT_WEIGHT])
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_read_fields_unknown_model_and_field() {
        let backend = backend();
        backend
            .insert(WeighingRecord::persisted(RecordId(1), WorkflowState::Draft))
            .await;

        let err = backend
            .read_fields("other.model", &[RecordId(1)], &[FIELD_CURRENT_WEIGHT])
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::UnknownModel(_)));

        let err = backend
            .read_fields("weighing.record", &[RecordId(1)], &["gross_weight"])
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_push_reading_sets_listening() {
        let backend = backend();
        backend
            .insert(WeighingRecord::persisted(RecordId(3), WorkflowState::Draft))
            .await;

        assert!(backend.push_reading(RecordId(3), 28_345.5).await);
        assert!(!backend.push_reading(RecordId(4), 1.0).await);

        let record = backend.get(RecordId(3)).await.unwrap();
        assert_eq!(record.current_weight, 28_345.5);
        assert!(record.is_listening);
    }

    #[tokio::test]
    async fn test_latest_reading_procedure() {
        let backend = backend();

        let reply = backend
            .call_procedure("weighing.record", "latest_reading", json!({}))
            .await
            .unwrap();
        assert_eq!(reply["success"], json!(false));

        backend.push_global_reading(12.34).await;
        let reply = backend
            .call_procedure("weighing.record", "latest_reading", json!({}))
            .await
            .unwrap();
        assert_eq!(reply, json!({"success": true, "weight": 12.34}));

        backend.clear_global_reading().await;
        let reply = backend
            .call_procedure("weighing.record", "latest_reading", json!({}))
            .await
            .unwrap();
        assert_eq!(reply["success"], json!(false));
        assert_eq!(backend.procedure_calls(), 3);
    }

    #[tokio::test]
    async fn test_active_weighing_picks_newest_open_record() {
        let backend = backend();
        backend
            .insert(WeighingRecord::persisted(RecordId(1), WorkflowState::InTransit).with_plate("AAA111"))
            .await;
        backend
            .insert(WeighingRecord::persisted(RecordId(2), WorkflowState::Draft).with_plate("BBB222"))
            .await;
        backend
            .insert(WeighingRecord::persisted(RecordId(3), WorkflowState::Completed))
            .await;

        let reply = backend
            .call_procedure("weighing.record", "active_weighing", json!({}))
            .await
            .unwrap();
        assert_eq!(reply["success"], json!(true));
        assert_eq!(reply["record_id"], json!(2));
        assert_eq!(reply["state"], json!("draft"));
        assert_eq!(reply["plate"], json!("BBB222"));

        backend.set_state(RecordId(2), WorkflowState::Cancelled).await;
        backend.set_state(RecordId(1), WorkflowState::Completed).await;
        let reply = backend
            .call_procedure("weighing.record", "active_weighing", json!({}))
            .await
            .unwrap();
        assert_eq!(reply["success"], json!(false));
    }

    #[tokio::test]
    async fn test_update_weight_procedure() {
        let backend = backend();
        backend
            .insert(WeighingRecord::persisted(RecordId(8), WorkflowState::InTransit))
            .await;

        let reply = backend
            .call_procedure(
                "weighing.record",
                "update_weight",
                json!({"record_id": 8, "weight": 17_250.25}),
            )
            .await
            .unwrap();
        assert_eq!(reply, json!({"success": true, "weight": 17_250.25}));
        let record = backend.get(RecordId(8)).await.unwrap();
        assert_eq!(record.current_weight, 17_250.25);
        assert!(record.is_listening);

        let reply = backend
            .call_procedure("weighing.record", "update_weight", json!({"record_id": 9, "weight": 1.0}))
            .await
            .unwrap();
        assert_eq!(reply["success"], json!(false));

        let reply = backend
            .call_procedure("weighing.record", "update_weight", json!({"weight": 1.0}))
            .await
            .unwrap();
        assert_eq!(reply["success"], json!(false));
    }

    #[tokio::test]
    async fn test_api_key_guards_scale_procedures() {
        let backend = InMemoryBackend::new(BackendConfig {
            api_key: Some("s3cret".to_string()),
            ..Default::default()
        });
        backend
            .insert(WeighingRecord::persisted(RecordId(2), WorkflowState::Draft))
            .await;

        for args in [json!({}), json!({"api_key": "wrong"})] {
            let reply = backend
                .call_procedure("weighing.record", "active_weighing", args)
                .await
                .unwrap();
            assert_eq!(reply, json!({"success": false, "message": "Invalid API key"}));
        }

        let reply = backend
            .call_procedure(
                "weighing.record",
                "update_weight",
                json!({"record_id": 2, "weight": 50.0, "api_key": "wrong"}),
            )
            .await
            .unwrap();
        assert_eq!(reply["success"], json!(false));
        assert_eq!(backend.get(RecordId(2)).await.unwrap().current_weight, 0.0);

        let reply = backend
            .call_procedure("weighing.record", "active_weighing", json!({"api_key": "s3cret"}))
            .await
            .unwrap();
        assert_eq!(reply["record_id"], json!(2));

        // The widget-facing lookup stays open
        backend.push_global_reading(4.5).await;
        let reply = backend
            .call_procedure("weighing.record", "latest_reading", json!({}))
            .await
            .unwrap();
        assert_eq!(reply["success"], json!(true));
    }

    #[tokio::test]
    async fn test_unknown_procedure() {
        let backend = backend();
        let err = backend
            .call_procedure("weighing.record", "tare", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::UnknownProcedure { .. }));
    }

    #[tokio::test]
    async fn test_fail_next_injects_transport_errors() {
        let backend = backend();
        backend.fail_next(2);

        for _ in 0..2 {
            let err = backend
                .call_procedure("weighing.record", "latest_reading", json!({}))
                .await
                .unwrap_err();
            assert!(err.is_transient());
        }

        assert!(
            backend
                .call_procedure("weighing.record", "latest_reading", json!({}))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_insert_requires_identifier() {
        let backend = backend();
        assert_eq!(backend.insert(WeighingRecord::unsaved()).await, None);
        assert_eq!(
            backend
                .insert(WeighingRecord::persisted(RecordId(5), WorkflowState::Draft))
                .await,
            Some(RecordId(5))
        );
        assert!(backend.remove(RecordId(5)).await.is_some());
        assert!(backend.get(RecordId(5)).await.is_none());
    }
}
