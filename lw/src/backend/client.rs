//! Backend trait definition

use async_trait::async_trait;
use serde_json::Value;

use super::BackendError;
use crate::domain::RecordId;

/// One row of a remote field read, keyed by field name
pub type FieldMap = serde_json::Map<String, Value>;

/// Remote data access offered by the host
///
/// Every call is independent; the synchronizer re-reads what it needs on
/// each poll instead of caching backend state.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Read `fields` of the records `ids` of `model`
    ///
    /// Ids that no longer exist are skipped, so a deleted record yields an
    /// empty list rather than an error.
    async fn read_fields(&self, model: &str, ids: &[RecordId], fields: &[&str]) -> Result<Vec<FieldMap>, BackendError>;

    /// Invoke a named server-side procedure on `model`
    async fn call_procedure(&self, model: &str, procedure: &str, args: Value) -> Result<Value, BackendError>;
}
