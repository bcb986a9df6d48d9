//! Bound record abstraction

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::BackendError;
use crate::domain::{RecordUpdate, WeighingRecord};

/// The record a synchronizer is attached to
///
/// The binding is shared with the host: the host may replace the whole
/// record at any time (save, reload), so callers take a fresh snapshot on
/// every use.
#[async_trait]
pub trait RecordBinding: Send + Sync {
    /// Current field values
    async fn snapshot(&self) -> WeighingRecord;

    /// Write back the live fields
    async fn update(&self, update: RecordUpdate) -> Result<(), BackendError>;
}

/// In-process record binding
#[derive(Debug, Clone, Default)]
pub struct SharedRecord {
    record: Arc<RwLock<WeighingRecord>>,
    writes: Arc<AtomicUsize>,
}

impl SharedRecord {
    pub fn new(record: WeighingRecord) -> Self {
        Self {
            record: Arc::new(RwLock::new(record)),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the whole record, as a host save or reload does
    pub async fn replace(&self, record: WeighingRecord) {
        debug!(identifier = ?record.identifier, state = %record.workflow_state, "SharedRecord::replace: called");
        *self.record.write().await = record;
    }

    /// Mutate the record in place on behalf of the host
    pub async fn modify<F>(&self, f: F)
    where
        F: FnOnce(&mut WeighingRecord) + Send,
    {
        let mut record = self.record.write().await;
        f(&mut record);
    }

    pub async fn get(&self) -> WeighingRecord {
        self.record.read().await.clone()
    }

    /// Number of write-backs received
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordBinding for SharedRecord {
    async fn snapshot(&self) -> WeighingRecord {
        self.get().await
    }

    async fn update(&self, update: RecordUpdate) -> Result<(), BackendError> {
        debug!(?update, "SharedRecord::update: called");
        self.record.write().await.apply(&update);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
