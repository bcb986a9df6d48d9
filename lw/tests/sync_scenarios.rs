//! End-to-end synchronizer scenarios against the in-memory backend
//!
//! Time is paused: tokio advances the clock whenever every task is idle,
//! so interval ticks land deterministically.

use std::sync::Arc;
use std::time::Duration;

use liveweight::{
    BackendConfig, InMemoryBackend, LiveValueSynchronizer, RecordId, SharedRecord, SyncConfig, TickOutcome,
    WeighingRecord, WorkflowState,
};

struct Harness {
    backend: Arc<InMemoryBackend>,
    binding: SharedRecord,
    sync: LiveValueSynchronizer,
}

async fn harness(record: WeighingRecord, backend: InMemoryBackend) -> Harness {
    let backend = Arc::new(backend);
    if record.identifier.is_some() {
        backend.insert(record.clone()).await;
    }
    let binding = SharedRecord::new(record);
    let sync = LiveValueSynchronizer::new(
        Arc::new(binding.clone()),
        backend.clone(),
        &SyncConfig::default(),
        &BackendConfig::default(),
    )
    .await;
    Harness { backend, binding, sync }
}

fn memory() -> InMemoryBackend {
    InMemoryBackend::new(BackendConfig::default())
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_unsaved_draft_shows_global_reading() {
    let mut h = harness(WeighingRecord::unsaved(), memory()).await;
    h.backend.push_global_reading(12.34).await;

    h.sync.attach();
    advance(10).await;

    assert_eq!(h.sync.state().last_known_weight, 12.34);
    assert_eq!(h.binding.get().await.current_weight, 12.34);
    assert_eq!(h.backend.read_calls(), 0);
    assert!(h.sync.is_polling());
}

#[tokio::test(start_paused = true)]
async fn test_noise_within_tolerance_is_ignored() {
    let record = WeighingRecord::persisted(RecordId(42), WorkflowState::InTransit).with_weight(10.0);
    let mut h = harness(record, memory()).await;
    h.backend.push_reading(RecordId(42), 10.004).await;

    h.sync.attach();
    advance(6_010).await;

    let state = h.sync.state();
    assert_eq!(state.last_known_weight, 10.0);
    assert_eq!(state.last_update_timestamp, None);
    assert_eq!(h.binding.write_count(), 0);
    assert_eq!(h.backend.read_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_completed_record_stops_before_fetch() {
    let record = WeighingRecord::persisted(RecordId(42), WorkflowState::Completed);
    let mut h = harness(record, memory()).await;

    h.sync.attach();
    advance(10).await;

    assert!(!h.sync.is_polling());
    assert_eq!(h.backend.read_calls(), 0);
    assert_eq!(h.backend.procedure_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_global_reading_drops_to_zero() {
    let mut h = harness(WeighingRecord::unsaved().with_weight(640.0), memory()).await;

    h.sync.attach();
    advance(10).await;

    assert_eq!(h.sync.state().last_known_weight, 0.0);
    assert!(h.sync.state().last_update_timestamp.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_missing_record_keeps_polling() {
    let record = WeighingRecord::persisted(RecordId(7), WorkflowState::Draft).with_weight(3.5);
    let mut h = harness(record, memory()).await;
    h.backend.remove(RecordId(7)).await;

    h.sync.attach();
    advance(4_010).await;

    assert_eq!(h.sync.state().last_known_weight, 3.5);
    assert!(h.sync.is_polling());
    assert_eq!(h.backend.read_calls(), 3);
    assert_eq!(h.binding.write_count(), 0);
}

// =============================================================================
// Properties
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_terminal_stop_regardless_of_identifier() {
    for state in [WorkflowState::Completed, WorkflowState::Cancelled] {
        for identifier in [None, Some(RecordId(9))] {
            let record = WeighingRecord {
                identifier,
                workflow_state: state,
                ..Default::default()
            };
            let mut h = harness(record, memory()).await;
            h.sync.attach();
            advance(10).await;

            assert!(!h.sync.is_polling(), "still polling for {:?} / {:?}", state, identifier);
            assert!(h.sync.is_halted());
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetch_never_overlaps() {
    // Each call takes 5s against a 2s interval
    let backend = memory().with_latency(Duration::from_millis(5_000));
    let mut h = harness(WeighingRecord::unsaved(), backend).await;

    h.sync.attach();
    advance(10).await;
    assert_eq!(h.backend.procedure_calls(), 1);

    // Two intervals elapse while the first fetch is outstanding
    advance(4_000).await;
    assert_eq!(h.backend.procedure_calls(), 1);

    advance(1_000).await;
    assert_eq!(h.backend.procedure_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_keep_polling() {
    let mut h = harness(WeighingRecord::unsaved(), memory()).await;
    h.backend.push_global_reading(75.25).await;
    h.backend.fail_next(2);

    h.sync.attach();
    advance(10).await;
    assert_eq!(h.sync.state().last_known_weight, 0.0);

    advance(2_000).await;
    assert_eq!(h.sync.state().last_known_weight, 0.0);

    advance(2_000).await;
    assert_eq!(h.sync.state().last_known_weight, 75.25);
    assert!(h.sync.is_polling());
}

#[tokio::test(start_paused = true)]
async fn test_write_back_only_on_change() {
    let record = WeighingRecord::persisted(RecordId(1), WorkflowState::Draft);
    let mut h = harness(record, memory()).await;
    h.backend.push_reading(RecordId(1), 500.0).await;

    h.sync.attach();
    advance(10).await;
    assert_eq!(h.binding.write_count(), 1);

    // Same value for several ticks
    advance(6_000).await;
    assert_eq!(h.binding.write_count(), 1);

    h.backend.push_reading(RecordId(1), 520.0).await;
    advance(2_000).await;
    assert_eq!(h.binding.write_count(), 2);
    assert_eq!(h.binding.get().await.current_weight, 520.0);
}

#[tokio::test(start_paused = true)]
async fn test_save_mid_session_switches_to_record_read() {
    let mut h = harness(WeighingRecord::unsaved(), memory()).await;
    h.backend.push_global_reading(100.0).await;

    h.sync.attach();
    advance(10).await;
    assert_eq!(h.backend.procedure_calls(), 1);
    assert_eq!(h.backend.read_calls(), 0);

    let saved = WeighingRecord::persisted(RecordId(11), WorkflowState::Draft);
    h.backend.insert(saved.clone()).await;
    h.backend.push_reading(RecordId(11), 180.0).await;
    h.binding.replace(saved).await;

    advance(2_000).await;
    assert_eq!(h.backend.procedure_calls(), 1);
    assert_eq!(h.backend.read_calls(), 1);
    assert_eq!(h.sync.state().last_known_weight, 180.0);
    assert!(h.binding.get().await.is_listening);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_session_stops_polling() {
    let record = WeighingRecord::persisted(RecordId(2), WorkflowState::InTransit);
    let mut h = harness(record, memory()).await;

    h.sync.attach();
    advance(10).await;
    assert!(h.sync.is_polling());

    h.binding.modify(|r| r.workflow_state = WorkflowState::Cancelled).await;
    advance(2_000).await;
    assert!(!h.sync.is_polling());

    let reads = h.backend.read_calls();
    advance(20_000).await;
    assert_eq!(h.backend.read_calls(), reads);
}

#[tokio::test(start_paused = true)]
async fn test_drop_stops_polling() {
    let h = harness(WeighingRecord::unsaved(), memory()).await;
    let Harness {
        backend, mut sync, ..
    } = h;

    sync.attach();
    advance(10).await;
    drop(sync);

    advance(10_000).await;
    assert_eq!(backend.procedure_calls(), 1);
}

#[tokio::test]
async fn test_manual_refresh_without_polling() {
    let h = harness(WeighingRecord::unsaved(), memory()).await;
    h.backend.push_global_reading(3.3).await;

    let outcome = h.sync.refresh_now().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Updated {
            weight: 3.3,
            listening: None
        }
    );
    assert!(!h.sync.is_polling());
}
