//! Dedup store and retention sweeper against an on-disk database

use chrono::{DateTime, TimeDelta, Utc};
use mnbot_worker::dedup::{DedupError, DedupStore, DedupSweeper, Durability, SqliteDedupStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

const WEEK: Duration = Duration::from_secs(7 * 24 * 3600);

async fn file_store(dir: &TempDir) -> SqliteDedupStore {
    let url = format!("sqlite://{}", dir.path().join("dedup.db").display());
    let store = SqliteDedupStore::connect(&url, "dedup").await.unwrap();
    store.ensure_date_index().await.unwrap();
    store
}

#[tokio::test]
async fn test_sweep_removes_entries_outside_retention() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(file_store(&dir).await);
    let now = Utc::now();
    store.insert("a", "https://a/", now - TimeDelta::days(30)).await.unwrap();
    store.insert("b", "https://b/", now - TimeDelta::days(8)).await.unwrap();
    store.insert("c", "https://c/", now - TimeDelta::days(1)).await.unwrap();
    store.insert("d", "https://d/", now).await.unwrap();

    let sweeper = DedupSweeper::new(Arc::clone(&store), WEEK);

    assert_eq!(sweeper.sweep().await, Some(2));
    assert_eq!(store.count().await.unwrap(), 2);
    // A second run covers the same range and finds nothing
    assert_eq!(sweeper.sweep().await, Some(0));
}

#[tokio::test]
async fn test_index_creation_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir).await;

    store.ensure_date_index().await.unwrap();
    store.ensure_date_index().await.unwrap();

    let (indexes,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'dedup_date'",
    )
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(indexes, 1);
}

#[tokio::test]
async fn test_hard_delete_matches_soft_delete() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir).await;
    let now = Utc::now();
    store.insert("old", "https://a/", now - TimeDelta::days(10)).await.unwrap();
    store.insert("new", "https://b/", now).await.unwrap();

    let deleted = store
        .delete_older_than(now - TimeDelta::days(7), Durability::Hard)
        .await
        .unwrap();

    assert_eq!(deleted, 1);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[derive(Debug, Default)]
struct FailingStore {
    calls: AtomicUsize,
}

impl DedupStore for FailingStore {
    async fn ensure_date_index(&self) -> Result<(), DedupError> {
        Ok(())
    }

    async fn delete_older_than(
        &self,
        _cutoff: DateTime<Utc>,
        _durability: Durability,
    ) -> Result<u64, DedupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DedupError::Database(sqlx::Error::PoolTimedOut))
    }
}

#[tokio::test]
async fn test_failed_sweep_is_swallowed() {
    let store = Arc::new(FailingStore::default());
    let sweeper = DedupSweeper::new(Arc::clone(&store), WEEK);

    assert_eq!(sweeper.sweep().await, None);
    assert_eq!(sweeper.sweep().await, None);
    assert_eq!(store.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_periodic_sweeps_keep_running_after_failures() {
    let store = Arc::new(FailingStore::default());
    let sweeper = Arc::new(DedupSweeper::new(Arc::clone(&store), WEEK));

    let handle = sweeper.start_periodic(Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.abort();

    assert!(store.calls.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn test_out_of_range_retention_is_swallowed() {
    let store = Arc::new(FailingStore::default());
    let sweeper = DedupSweeper::new(Arc::clone(&store), Duration::MAX);

    assert_eq!(sweeper.sweep().await, None);
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}
