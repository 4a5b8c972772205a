//! Storage Key Derivation
//!
//! Maps a logical key, prefix and namespace to the identifier used in the
//! document store.

use sha2::{Digest, Sha256};

use crate::cache::MAX_KEY_SIZE;
use crate::error::{CacheError, Result};

// == Derive Storage Key ==
/// Builds the storage key for `prefix + key`, qualified by `namespace`.
///
/// Keys longer than [`MAX_KEY_SIZE`] bytes are replaced by the hex SHA-256 of
/// the full qualified key, so the result always fits the store's limit and is
/// still a pure function of the inputs. An empty namespace is the same as no
/// namespace.
pub fn derive_storage_key(key: &str, prefix: &str, namespace: Option<&str>) -> Result<String> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key must be a non-empty string".to_string()));
    }

    let qualified = match namespace {
        Some(ns) if !ns.is_empty() => format!("{}:{}{}", ns, prefix, key),
        _ => format!("{}{}", prefix, key),
    };

    if qualified.len() > MAX_KEY_SIZE {
        return Ok(hex::encode(Sha256::digest(qualified.as_bytes())));
    }

    Ok(qualified)
}
