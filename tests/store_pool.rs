//! Connection pool exhaustion: every slot held, a further acquire must
//! fail fast (once the pool's acquisition timeout elapses) with
//! `StoreUnavailable` rather than hang forever.

use catalyst_orchestrator::error::AppError;
use catalyst_orchestrator::store::StorePool;

#[tokio::test]
async fn acquire_times_out_when_pool_is_exhausted() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalyst.db");
    let pool = StorePool::open(db_path.to_str().unwrap(), 1).unwrap();

    let held = pool.acquire().await.unwrap();

    let result = pool.acquire().await;
    assert!(matches!(result, Err(AppError::StoreUnavailable(_))));

    drop(held);
    // Once released, acquisition succeeds again.
    assert!(pool.acquire().await.is_ok());
}
