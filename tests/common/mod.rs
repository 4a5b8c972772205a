//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dscache::storage::{
    DocumentStore, MemoryDocumentStore, Record, StorageError, StorageResult, Transaction,
};

// == Fault Switches ==
/// Toggles read by [`FaultyStore`] on every call.
#[derive(Debug, Default)]
pub struct Faults {
    pub reads: AtomicBool,
    pub writes: AtomicBool,
    pub deletes: AtomicBool,
    /// Number of upcoming commits that report a conflict
    pub conflicts: AtomicU32,
    /// Milliseconds each batched delete stalls before running
    pub delete_delay_ms: AtomicU64,
}

impl Faults {
    fn check(flag: &AtomicBool, what: &str) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable(format!("injected {} failure", what)))
        } else {
            Ok(())
        }
    }

    fn take_conflict(&self) -> bool {
        self.conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

// == Faulty Store ==
/// Wraps a [`MemoryDocumentStore`] and fails selected calls on demand.
#[derive(Clone)]
pub struct FaultyStore {
    pub inner: MemoryDocumentStore,
    pub faults: Arc<Faults>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryDocumentStore::new(),
            faults: Arc::new(Faults::default()),
        }
    }

    pub fn fail_reads(&self, on: bool) {
        self.faults.reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.faults.writes.store(on, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, on: bool) {
        self.faults.deletes.store(on, Ordering::SeqCst);
    }

    pub fn conflict_next_commits(&self, count: u32) {
        self.faults.conflicts.store(count, Ordering::SeqCst);
    }

    pub fn slow_deletes(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.faults.delete_delay_ms.store(millis, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Record>> {
        Faults::check(&self.faults.reads, "read")?;
        self.inner.get(key).await
    }

    async fn get_multi(&self, keys: &[String]) -> StorageResult<Vec<(String, Option<Record>)>> {
        Faults::check(&self.faults.reads, "read")?;
        self.inner.get_multi(keys).await
    }

    async fn put(&self, record: Record) -> StorageResult<()> {
        Faults::check(&self.faults.writes, "write")?;
        self.inner.put(record).await
    }

    async fn put_multi(&self, records: Vec<Record>) -> StorageResult<()> {
        Faults::check(&self.faults.writes, "write")?;
        self.inner.put_multi(records).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        Faults::check(&self.faults.deletes, "delete")?;
        self.inner.delete(key).await
    }

    async fn delete_multi(&self, keys: &[String]) -> StorageResult<()> {
        Faults::check(&self.faults.deletes, "delete")?;
        let delay = self.faults.delete_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.inner.delete_multi(keys).await
    }

    async fn query_expired(&self, before: DateTime<Utc>, limit: usize) -> StorageResult<Vec<String>> {
        Faults::check(&self.faults.reads, "read")?;
        self.inner.query_expired(before, limit).await
    }

    async fn begin(&self) -> StorageResult<Box<dyn Transaction>> {
        Ok(Box::new(FaultyTransaction {
            inner: self.inner.begin().await?,
            faults: Arc::clone(&self.faults),
        }))
    }
}

struct FaultyTransaction {
    inner: Box<dyn Transaction>,
    faults: Arc<Faults>,
}

#[async_trait]
impl Transaction for FaultyTransaction {
    async fn get(&mut self, key: &str) -> StorageResult<Option<Record>> {
        Faults::check(&self.faults.reads, "read")?;
        self.inner.get(key).await
    }

    fn put(&mut self, record: Record) {
        self.inner.put(record);
    }

    async fn commit(&mut self) -> StorageResult<()> {
        Faults::check(&self.faults.writes, "write")?;
        if self.faults.take_conflict() {
            return Err(StorageError::Conflict("injected".to_string()));
        }
        self.inner.commit().await
    }
}
