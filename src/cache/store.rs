//! Cache Store Module
//!
//! Memcache-style operations over a [`DocumentStore`]. Expiry is checked
//! lazily on read; `add` is guarded by a transaction.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, error, warn};

use crate::cache::{decode, derive_storage_key, encode, CacheEntry, CacheValue};
use crate::error::{CacheError, Result};
use crate::storage::{DocumentStore, Record, StorageError, StorageResult, MAX_BATCH_WRITE};

/// Longest key listing written to the log for a failed batch.
const LOGGED_KEYS_LEN: usize = 50;

// == Cache Settings ==
/// Tunables for a [`CacheStore`].
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Records per batched write; larger batches are split into chunks
    pub batch_write_limit: usize,
    /// Extra attempts for a transaction that lost a write race
    pub transaction_retries: u32,
    /// Leave falsy values (0, "", false, empty collections) out of `get_multi`
    pub omit_falsy_in_get_multi: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            batch_write_limit: MAX_BATCH_WRITE,
            transaction_retries: 3,
            omit_falsy_in_get_multi: false,
        }
    }
}

// == Cache Store ==
/// Main cache surface: set/get/delete/add and their batch variants.
///
/// Cloning is cheap; clones share the underlying document store.
#[derive(Clone)]
pub struct CacheStore {
    /// Backing document store
    store: Arc<dyn DocumentStore>,
    settings: CacheSettings,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a CacheStore with default settings.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_settings(store, CacheSettings::default())
    }

    /// Creates a CacheStore with explicit settings.
    pub fn with_settings(store: Arc<dyn DocumentStore>, settings: CacheSettings) -> Self {
        Self { store, settings }
    }

    /// Returns the active settings.
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    // == Set ==
    /// Stores a value, regardless of previous contents.
    ///
    /// # Arguments
    /// * `key` - Logical key
    /// * `value` - Value to store
    /// * `ttl_seconds` - Relative expiry, 0 = never expire
    /// * `namespace` - Optional namespace partition
    ///
    /// Returns `Ok(false)` if the write failed.
    pub async fn set(
        &self,
        key: &str,
        value: impl Into<CacheValue>,
        ttl_seconds: i64,
        namespace: Option<&str>,
    ) -> Result<bool> {
        let entry = build_entry(key, value.into(), ttl_seconds, "", namespace)?;

        match self.store.put(entry.into_record()).await {
            Ok(()) => Ok(true),
            Err(err) => {
                error!("dscache: error on set() for key {}: {}", key, err);
                Ok(false)
            }
        }
    }

    // == Set Multi ==
    /// Stores several values at once.
    ///
    /// Writes are split into chunks of at most `batch_write_limit` records and
    /// issued concurrently. A failed chunk does not stop the others.
    ///
    /// Returns the logical keys that were NOT stored; empty on full success.
    pub async fn set_multi<I, K, V>(
        &self,
        mapping: I,
        ttl_seconds: i64,
        prefix: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<CacheValue>,
    {
        let mut pending = Vec::new();
        for (key, value) in mapping {
            let key = key.into();
            let entry = build_entry(&key, value.into(), ttl_seconds, prefix, namespace)?;
            pending.push((key, entry.into_record()));
        }

        let limit = self.settings.batch_write_limit.max(1);
        let mut chunks: Vec<Vec<(String, Record)>> = Vec::new();
        let mut pending = pending.into_iter().peekable();
        while pending.peek().is_some() {
            chunks.push(pending.by_ref().take(limit).collect());
        }

        let writes = chunks.into_iter().map(|chunk| {
            let (keys, records): (Vec<String>, Vec<Record>) = chunk.into_iter().unzip();
            self.write_chunk(keys, records)
        });

        Ok(join_all(writes).await.into_iter().flatten().collect())
    }

    /// Writes one chunk; returns its keys if the write failed.
    async fn write_chunk(&self, keys: Vec<String>, records: Vec<Record>) -> Vec<String> {
        match self.store.put_multi(records).await {
            Ok(()) => Vec::new(),
            Err(err) => {
                error!(
                    "dscache: error on set_multi() for keys {}: {}",
                    summarize_keys(&keys),
                    err
                );
                keys
            }
        }
    }

    // == Get ==
    /// Looks up a single key.
    ///
    /// Misses, expired entries and storage failures all yield `Ok(None)`.
    pub async fn get(&self, key: &str, namespace: Option<&str>) -> Result<Option<CacheValue>> {
        Ok(self
            .get_with_token(key, namespace)
            .await?
            .map(|(value, _)| value))
    }

    /// Looks up a single key along with its concurrency token.
    pub(crate) async fn get_with_token(
        &self,
        key: &str,
        namespace: Option<&str>,
    ) -> Result<Option<(CacheValue, Option<u64>)>> {
        let storage_key = derive_storage_key(key, "", namespace)?;

        match self.store.get(&storage_key).await {
            Ok(Some(record)) => Ok(self.resolve(record).await),
            Ok(None) => {
                debug!("dscache: miss for key {}", key);
                Ok(None)
            }
            Err(err) => {
                error!("dscache: error on get() for key {}: {}", key, err);
                Ok(None)
            }
        }
    }

    // == Get Multi ==
    /// Looks up several keys in one round trip.
    ///
    /// The result maps each logical key (without prefix) to its value. Keys
    /// that are missing or expired are left out.
    pub async fn get_multi<K: AsRef<str>>(
        &self,
        keys: &[K],
        prefix: &str,
        namespace: Option<&str>,
    ) -> Result<HashMap<String, CacheValue>> {
        let storage_keys = keys
            .iter()
            .map(|key| derive_storage_key(key.as_ref(), prefix, namespace))
            .collect::<Result<Vec<_>>>()?;

        let found = match self.store.get_multi(&storage_keys).await {
            Ok(found) => found,
            Err(err) => {
                let logical: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
                error!(
                    "dscache: error on get_multi() for keys {}: {}",
                    summarize_keys(&logical),
                    err
                );
                return Ok(HashMap::new());
            }
        };

        let mut records: HashMap<String, Record> = found
            .into_iter()
            .filter_map(|(storage_key, record)| record.map(|record| (storage_key, record)))
            .collect();

        let mut result = HashMap::new();
        for (key, storage_key) in keys.iter().zip(&storage_keys) {
            let Some(record) = records.remove(storage_key) else {
                continue;
            };
            let Some((value, _)) = self.resolve(record).await else {
                continue;
            };
            if self.settings.omit_falsy_in_get_multi && !value.is_truthy() {
                continue;
            }
            result.insert(key.as_ref().to_string(), value);
        }

        Ok(result)
    }

    // == Delete ==
    /// Deletes a key. Deleting a missing key succeeds.
    pub async fn delete(&self, key: &str, namespace: Option<&str>) -> Result<bool> {
        let storage_key = derive_storage_key(key, "", namespace)?;

        match self.store.delete(&storage_key).await {
            Ok(()) => Ok(true),
            Err(err) => {
                error!("dscache: error on delete() for key {}: {}", key, err);
                Ok(false)
            }
        }
    }

    // == Delete Multi ==
    /// Deletes several keys in one call.
    ///
    /// Returns `Ok(true)` unless the batched delete itself failed; keys that
    /// never existed count as deleted.
    pub async fn delete_multi<K: AsRef<str>>(
        &self,
        keys: &[K],
        prefix: &str,
        namespace: Option<&str>,
    ) -> Result<bool> {
        let storage_keys = keys
            .iter()
            .map(|key| derive_storage_key(key.as_ref(), prefix, namespace))
            .collect::<Result<Vec<_>>>()?;

        match self.store.delete_multi(&storage_keys).await {
            Ok(()) => Ok(true),
            Err(err) => {
                let logical: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
                error!(
                    "dscache: error on delete_multi() for keys {}: {}",
                    summarize_keys(&logical),
                    err
                );
                Ok(false)
            }
        }
    }

    // == Add ==
    /// Stores a value only if the key holds no live entry.
    ///
    /// Returns `Ok(false)` if the key was present or on any storage failure.
    pub async fn add(
        &self,
        key: &str,
        value: impl Into<CacheValue>,
        ttl_seconds: i64,
        namespace: Option<&str>,
    ) -> Result<bool> {
        let entry = build_entry(key, value.into(), ttl_seconds, "", namespace)?;
        let storage_key = entry.storage_key.clone();

        // Skip the transaction when a live entry is plainly there.
        match self.store.get(&storage_key).await {
            Ok(Some(existing)) if !existing.is_expired_at(Utc::now()) => {
                debug!("dscache: add() found live entry for key {}", key);
                return Ok(false);
            }
            Ok(_) => {}
            Err(err) => {
                error!("dscache: error on add() for key {}: {}", key, err);
                return Ok(false);
            }
        }

        let is_vacant = |current: Option<&Record>| match current {
            Some(record) => record.is_expired_at(Utc::now()),
            None => true,
        };

        match self.put_if(&storage_key, entry.into_record(), is_vacant).await {
            Ok(added) => Ok(added),
            Err(err) => {
                error!("dscache: error on add() for key {}: {}", key, err);
                Ok(false)
            }
        }
    }

    // == Conditional Put ==
    /// Re-reads `storage_key` inside a transaction and writes `record` only if
    /// `admit` accepts the current row. Conflicting commits are retried.
    pub(crate) async fn put_if<F>(
        &self,
        storage_key: &str,
        record: Record,
        admit: F,
    ) -> StorageResult<bool>
    where
        F: Fn(Option<&Record>) -> bool + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            let mut txn = self.store.begin().await?;
            let current = txn.get(storage_key).await?;
            if !admit(current.as_ref()) {
                return Ok(false);
            }

            txn.put(record.clone());
            match txn.commit().await {
                Ok(()) => return Ok(true),
                Err(StorageError::Conflict(key)) if attempt < self.settings.transaction_retries => {
                    attempt += 1;
                    debug!("dscache: transaction conflict on {}, retry {}", key, attempt);
                }
                Err(err) => return Err(err),
            }
        }
    }

    // == Decode Record ==
    /// Turns a fetched row into a live value and its token.
    ///
    /// Expired rows read as absent. Rows with no readable value are logged,
    /// deleted best-effort, and read as absent; a failing delete is only
    /// logged.
    async fn resolve(&self, record: Record) -> Option<(CacheValue, Option<u64>)> {
        if record.is_expired_at(Utc::now()) {
            return None;
        }

        let storage_key = record.storage_key.clone();
        let decoded = CacheEntry::try_from(record)
            .map_err(|err| CacheError::Codec(err.to_string()))
            .and_then(|entry| {
                let cas_id = entry.cas_id;
                decode(entry.value).map(|value| (value, cas_id))
            });

        match decoded {
            Ok(found) => Some(found),
            Err(err) => {
                warn!("dscache: discarding unreadable entry {}: {}", storage_key, err);
                if let Err(err) = self.store.delete(&storage_key).await {
                    error!("dscache: error deleting bad cache entry {}: {}", storage_key, err);
                }
                None
            }
        }
    }

    // == Reserved Operations ==
    /// Not supported.
    pub async fn add_multi(
        &self,
        _mapping: HashMap<String, CacheValue>,
        _ttl_seconds: i64,
        _prefix: &str,
        _namespace: Option<&str>,
    ) -> Result<Vec<String>> {
        Err(CacheError::Unsupported("add_multi"))
    }

    /// Not supported.
    pub async fn replace(
        &self,
        _key: &str,
        _value: CacheValue,
        _ttl_seconds: i64,
        _namespace: Option<&str>,
    ) -> Result<bool> {
        Err(CacheError::Unsupported("replace"))
    }

    /// Not supported.
    pub async fn replace_multi(
        &self,
        _mapping: HashMap<String, CacheValue>,
        _ttl_seconds: i64,
        _prefix: &str,
        _namespace: Option<&str>,
    ) -> Result<Vec<String>> {
        Err(CacheError::Unsupported("replace_multi"))
    }

    /// Not supported: the store has no atomic increment.
    pub async fn incr(
        &self,
        _key: &str,
        _delta: u64,
        _namespace: Option<&str>,
        _initial_value: Option<u64>,
    ) -> Result<Option<u64>> {
        Err(CacheError::Unsupported("incr"))
    }

    /// Not supported: the store has no atomic decrement.
    pub async fn decr(
        &self,
        _key: &str,
        _delta: u64,
        _namespace: Option<&str>,
        _initial_value: Option<u64>,
    ) -> Result<Option<u64>> {
        Err(CacheError::Unsupported("decr"))
    }

    /// Not supported.
    pub async fn offset_multi(
        &self,
        _offsets: HashMap<String, i64>,
        _prefix: &str,
        _namespace: Option<&str>,
        _initial_value: Option<u64>,
    ) -> Result<HashMap<String, Option<u64>>> {
        Err(CacheError::Unsupported("offset_multi"))
    }

    /// Not supported.
    pub async fn flush_all(&self) -> Result<bool> {
        Err(CacheError::Unsupported("flush_all"))
    }

    /// Not supported.
    pub async fn get_stats(&self) -> Result<HashMap<String, u64>> {
        Err(CacheError::Unsupported("get_stats"))
    }
}

// == Helpers ==
/// Derives the key and encodes the value for a full overwrite.
pub(crate) fn build_entry(
    key: &str,
    value: CacheValue,
    ttl_seconds: i64,
    prefix: &str,
    namespace: Option<&str>,
) -> Result<CacheEntry> {
    let storage_key = derive_storage_key(key, prefix, namespace)?;
    Ok(CacheEntry::new(storage_key, encode(value)?, ttl_seconds))
}

/// Renders a key list for logging, cut to a readable length.
fn summarize_keys<S: AsRef<str>>(keys: &[S]) -> String {
    let listed: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
    let rendered = format!("{:?}", listed);
    if rendered.chars().count() > LOGGED_KEYS_LEN {
        let cut: String = rendered.chars().take(LOGGED_KEYS_LEN).collect();
        format!("{}...", cut)
    } else {
        rendered
    }
}
