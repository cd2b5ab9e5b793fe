//! End-to-end cycle lifecycle scenarios against a real (temp-file) store:
//! happy-path start/select/stop, the at-most-one-active-cycle invariant,
//! and the emergency-stop bypass of the graceful `stopping` phase.

use catalyst_orchestrator::cycle::CycleEngine;
use catalyst_orchestrator::models::{CycleMode, CycleStatus};
use catalyst_orchestrator::store::{StoreGateway, StorePool};
use std::sync::Arc;

fn fresh_engine() -> (Arc<CycleEngine>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalyst.db");
    let pool = StorePool::open(db_path.to_str().unwrap(), 4).unwrap();
    let store = Arc::new(StoreGateway::new(pool));
    (Arc::new(CycleEngine::new(store)), dir)
}

#[tokio::test]
async fn happy_path_start_pause_resume_stop() {
    let (engine, _dir) = fresh_engine();

    let cycle = engine.start(CycleMode::Normal, 900, 5, 1.0).await.unwrap();
    assert_eq!(cycle.status, CycleStatus::Active);

    engine.pause(&cycle.id).await.unwrap();
    let paused = engine.get(&cycle.id).await.unwrap();
    assert_eq!(paused.status, CycleStatus::Paused);

    engine.resume(&cycle.id).await.unwrap();
    let resumed = engine.get(&cycle.id).await.unwrap();
    assert_eq!(resumed.status, CycleStatus::Active);

    engine.request_stop(&cycle.id, "end of day").await.unwrap();
    let stopping = engine.get(&cycle.id).await.unwrap();
    assert_eq!(stopping.status, CycleStatus::Stopping);

    engine.finalize_stop(&cycle.id).await.unwrap();
    let stopped = engine.get(&cycle.id).await.unwrap();
    assert_eq!(stopped.status, CycleStatus::Stopped);
    assert!(stopped.stopped_at.is_some());

    engine.complete(&cycle.id).await.unwrap();
    let completed = engine.get(&cycle.id).await.unwrap();
    assert_eq!(completed.status, CycleStatus::Completed);
}

#[tokio::test]
async fn cannot_start_second_cycle_while_one_is_active() {
    let (engine, _dir) = fresh_engine();

    let _first = engine.start(CycleMode::Normal, 900, 5, 1.0).await.unwrap();
    let second = engine.start(CycleMode::Aggressive, 300, 3, 1.2).await;

    assert!(second.is_err());
}

#[tokio::test]
async fn emergency_stop_bypasses_graceful_stopping_phase() {
    let (engine, _dir) = fresh_engine();

    let cycle = engine.start(CycleMode::Normal, 900, 5, 1.0).await.unwrap();
    engine.emergency_stop(&cycle.id, "broker outage").await.unwrap();

    let after = engine.get(&cycle.id).await.unwrap();
    assert_eq!(after.status, CycleStatus::EmergencyStopped);
    assert_eq!(after.stop_reason.as_deref(), Some("broker outage"));
}

#[tokio::test]
async fn illegal_transition_is_rejected() {
    let (engine, _dir) = fresh_engine();

    let cycle = engine.start(CycleMode::Normal, 900, 5, 1.0).await.unwrap();
    engine.request_stop(&cycle.id, "done").await.unwrap();
    engine.finalize_stop(&cycle.id).await.unwrap();

    // Can't pause a cycle that's already stopped.
    let result = engine.pause(&cycle.id).await;
    assert!(result.is_err());
}
