//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::CacheValue;

/// Request body for PUT /set and POST /add
///
/// # Fields
/// - `key`: The logical cache key
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in seconds; absent or 0 means never expire
/// - `namespace`: Optional namespace partition
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: Value,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<i64>,
    /// Optional namespace
    #[serde(default)]
    pub namespace: Option<String>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.value.is_null() {
            return Some("Value cannot be null".to_string());
        }
        None
    }

    /// TTL in seconds, defaulting to no expiry.
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.unwrap_or(0)
    }

    /// Converts the JSON body value into a cache value.
    pub fn cache_value(&self) -> CacheValue {
        CacheValue::from_json(self.value.clone())
    }
}

/// Query string accepted by GET /get/:key and DELETE /del/:key
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamespaceQuery {
    #[serde(default)]
    pub namespace: Option<String>,
}
