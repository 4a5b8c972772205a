//! In-Memory Document Store
//!
//! A process-local implementation of [`DocumentStore`]. Every row carries a
//! write version so transactions can detect concurrent writers at commit.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{DocumentStore, Record, StorageError, StorageResult, Transaction, MAX_BATCH_WRITE};

/// A stored row plus the version of the write that produced it.
#[derive(Debug, Clone)]
struct VersionedRecord {
    record: Record,
    version: u64,
}

#[derive(Debug, Default)]
struct Rows {
    data: BTreeMap<String, VersionedRecord>,
    /// Monotonic write counter; versions are never reused
    clock: u64,
}

impl Rows {
    fn version_of(&self, key: &str) -> u64 {
        self.data.get(key).map(|row| row.version).unwrap_or(0)
    }

    fn insert(&mut self, record: Record) {
        self.clock += 1;
        let version = self.clock;
        self.data
            .insert(record.storage_key.clone(), VersionedRecord { record, version });
    }
}

// == Memory Document Store ==
/// Thread-safe in-memory document store.
#[derive(Debug, Clone)]
pub struct MemoryDocumentStore {
    rows: Arc<RwLock<Rows>>,
    batch_limit: usize,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    /// Creates an empty store enforcing [`MAX_BATCH_WRITE`] on batched writes.
    pub fn new() -> Self {
        Self::with_batch_limit(MAX_BATCH_WRITE)
    }

    /// Creates an empty store with a custom per-call write limit.
    pub fn with_batch_limit(batch_limit: usize) -> Self {
        Self {
            rows: Arc::new(RwLock::new(Rows::default())),
            batch_limit,
        }
    }

    /// Returns the number of stored records, expired ones included.
    pub async fn len(&self) -> usize {
        self.rows.read().await.data.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.data.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Record>> {
        let rows = self.rows.read().await;
        Ok(rows.data.get(key).map(|row| row.record.clone()))
    }

    async fn get_multi(&self, keys: &[String]) -> StorageResult<Vec<(String, Option<Record>)>> {
        let rows = self.rows.read().await;
        Ok(keys
            .iter()
            .map(|key| (key.clone(), rows.data.get(key).map(|row| row.record.clone())))
            .collect())
    }

    async fn put(&self, record: Record) -> StorageResult<()> {
        self.rows.write().await.insert(record);
        Ok(())
    }

    async fn put_multi(&self, records: Vec<Record>) -> StorageResult<()> {
        if records.len() > self.batch_limit {
            return Err(StorageError::BatchTooLarge {
                len: records.len(),
                limit: self.batch_limit,
            });
        }

        let mut rows = self.rows.write().await;
        for record in records {
            rows.insert(record);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.rows.write().await.data.remove(key);
        Ok(())
    }

    async fn delete_multi(&self, keys: &[String]) -> StorageResult<()> {
        let mut rows = self.rows.write().await;
        for key in keys {
            rows.data.remove(key);
        }
        Ok(())
    }

    async fn query_expired(&self, before: DateTime<Utc>, limit: usize) -> StorageResult<Vec<String>> {
        let rows = self.rows.read().await;
        Ok(rows
            .data
            .iter()
            .filter(|(_, row)| matches!(row.record.timeout, Some(timeout) if timeout < before))
            .map(|(key, _)| key.clone())
            .take(limit)
            .collect())
    }

    async fn begin(&self) -> StorageResult<Box<dyn Transaction>> {
        Ok(Box::new(MemoryTransaction {
            rows: Arc::clone(&self.rows),
            observed: HashMap::new(),
            pending: Vec::new(),
        }))
    }
}

// == Memory Transaction ==
/// Optimistic transaction: remembers the version of every row it read and
/// refuses to commit if any of them moved.
struct MemoryTransaction {
    rows: Arc<RwLock<Rows>>,
    observed: HashMap<String, u64>,
    pending: Vec<Record>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn get(&mut self, key: &str) -> StorageResult<Option<Record>> {
        let rows = self.rows.read().await;
        let version = rows.version_of(key);
        self.observed.entry(key.to_string()).or_insert(version);
        Ok(rows.data.get(key).map(|row| row.record.clone()))
    }

    fn put(&mut self, record: Record) {
        self.pending.push(record);
    }

    async fn commit(&mut self) -> StorageResult<()> {
        let mut rows = self.rows.write().await;

        if let Some((key, _)) = self
            .observed
            .iter()
            .find(|(key, version)| rows.version_of(key) != **version)
        {
            return Err(StorageError::Conflict(key.clone()));
        }

        for record in self.pending.drain(..) {
            rows.insert(record);
        }
        self.observed.clear();
        Ok(())
    }
}
