//! Storage Module
//!
//! The document-store contract the cache is built on, the persisted record
//! layout, and an in-process implementation of the contract.

mod memory;
mod record;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use memory::MemoryDocumentStore;
pub use record::Record;

// == Public Constants ==
/// Maximum number of records a single batched write may carry.
pub const MAX_BATCH_WRITE: usize = 500;

// == Storage Error Enum ==
/// Failures reported by a document store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    /// The store could not serve the request (network, quota, shutdown)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A transaction lost a race against a concurrent writer
    #[error("Transaction conflict on: {0}")]
    Conflict(String),

    /// A batched call exceeded the per-call limit
    #[error("Batch of {len} records exceeds limit of {limit}")]
    BatchTooLarge { len: usize, limit: usize },
}

/// Convenience Result type for storage calls.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// == Document Store ==
/// Point and batch CRUD, an expiry range query, and optimistic transactions.
///
/// Implementations have no notion of TTL, counters or compare-and-swap; the
/// cache layer builds those on top.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads one record.
    async fn get(&self, key: &str) -> StorageResult<Option<Record>>;

    /// Reads several records, preserving the order of `keys`.
    async fn get_multi(&self, keys: &[String]) -> StorageResult<Vec<(String, Option<Record>)>>;

    /// Writes one record, replacing any previous record with the same key.
    async fn put(&self, record: Record) -> StorageResult<()>;

    /// Writes up to [`MAX_BATCH_WRITE`] records in one call.
    async fn put_multi(&self, records: Vec<Record>) -> StorageResult<()>;

    /// Removes one record. Removing a missing record succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Removes several records. Missing records are ignored.
    async fn delete_multi(&self, keys: &[String]) -> StorageResult<()>;

    /// Returns at most `limit` keys whose `timeout` is strictly before `before`.
    async fn query_expired(&self, before: DateTime<Utc>, limit: usize) -> StorageResult<Vec<String>>;

    /// Opens an optimistic transaction.
    async fn begin(&self) -> StorageResult<Box<dyn Transaction>>;
}

// == Transaction ==
/// A unit of reads followed by buffered writes.
///
/// `commit` fails with [`StorageError::Conflict`] when any record read through
/// the transaction was written by someone else after it was read.
#[async_trait]
pub trait Transaction: Send {
    /// Reads a record and registers it for conflict detection.
    async fn get(&mut self, key: &str) -> StorageResult<Option<Record>>;

    /// Buffers a write, applied on commit.
    fn put(&mut self, record: Record);

    /// Applies buffered writes atomically.
    async fn commit(&mut self) -> StorageResult<()>;
}
