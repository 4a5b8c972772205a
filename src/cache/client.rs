//! Compare-And-Swap Client
//!
//! A session over a [`CacheStore`] that remembers the concurrency token seen
//! by `gets` and uses it to guard a later `cas`.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, error, warn};

use crate::cache::store::build_entry;
use crate::cache::{CacheStore, CacheValue};
use crate::error::{CacheError, Result};
use crate::storage::Record;

/// Session map key: logical key plus namespace.
type TokenKey = (String, Option<String>);

// == CAS Client ==
/// Per-session compare-and-swap state.
///
/// Tokens live only in this value: they are never shared between clients
/// and are lost when the client is dropped.
pub struct CasClient {
    cache: CacheStore,
    tokens: HashMap<TokenKey, u64>,
}

impl CasClient {
    // == Constructor ==
    /// Creates a client with no tracked keys.
    pub fn new(cache: CacheStore) -> Self {
        Self {
            cache,
            tokens: HashMap::new(),
        }
    }

    /// Returns the underlying cache for plain operations.
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Returns true if a token is remembered for the key.
    pub fn is_tracked(&self, key: &str, namespace: Option<&str>) -> bool {
        self.tokens.contains_key(&token_key(key, namespace))
    }

    // == Gets ==
    /// Looks up a key and remembers its concurrency token for `cas`.
    ///
    /// Entries written without a token are returned but not tracked, so a
    /// following `cas` on them fails.
    pub async fn gets(&mut self, key: &str, namespace: Option<&str>) -> Result<Option<CacheValue>> {
        let Some((value, cas_id)) = self.cache.get_with_token(key, namespace).await? else {
            return Ok(None);
        };

        match cas_id {
            Some(token) => {
                self.tokens.insert(token_key(key, namespace), token);
            }
            None => warn!("dscache: entry for key {} has no cas id; cas() will fail", key),
        }

        Ok(Some(value))
    }

    // == Cas ==
    /// Stores a value only if the entry still carries the token seen by the
    /// last `gets` for this key.
    ///
    /// The remembered token is not refreshed on success; call `gets` again
    /// before the next `cas`.
    pub async fn cas(
        &self,
        key: &str,
        value: impl Into<CacheValue>,
        ttl_seconds: i64,
        namespace: Option<&str>,
    ) -> Result<bool> {
        let entry = build_entry(key, value.into(), ttl_seconds, "", namespace)?;

        let Some(&token) = self.tokens.get(&token_key(key, namespace)) else {
            warn!("dscache: gets() must be called before cas(); key {}", key);
            return Ok(false);
        };

        // Reject cheaply before opening a transaction.
        match self.cache.get_with_token(key, namespace).await? {
            Some((_, Some(current))) if current == token => {}
            _ => {
                debug!("dscache: cas() token mismatch for key {}", key);
                return Ok(false);
            }
        }

        let unchanged = move |current: Option<&Record>| match current {
            Some(record) => !record.is_expired_at(Utc::now()) && record.cas_id == Some(token),
            None => false,
        };

        let storage_key = entry.storage_key.clone();
        match self.cache.put_if(&storage_key, entry.into_record(), unchanged).await {
            Ok(swapped) => Ok(swapped),
            Err(err) => {
                error!("dscache: error on cas() for key {}: {}", key, err);
                Ok(false)
            }
        }
    }

    // == Cas Reset ==
    /// Forgets every remembered token.
    pub fn cas_reset(&mut self) {
        self.tokens.clear();
    }

    /// Not supported.
    pub async fn cas_multi(
        &self,
        _mapping: HashMap<String, CacheValue>,
        _ttl_seconds: i64,
        _prefix: &str,
        _namespace: Option<&str>,
    ) -> Result<Vec<String>> {
        Err(CacheError::Unsupported("cas_multi"))
    }
}

fn token_key(key: &str, namespace: Option<&str>) -> TokenKey {
    (
        key.to_string(),
        namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
    )
}
