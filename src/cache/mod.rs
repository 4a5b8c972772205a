//! Cache Module
//!
//! Memcache-style caching on top of a document store: key derivation, the
//! value codec, expiring entries, and compare-and-swap sessions.

mod client;
mod entry;
mod key;
mod store;
mod value;


// Re-export public types
pub use client::CasClient;
pub use entry::{next_cas_id, CacheEntry, CorruptRecord, StoredValue};
pub use key::derive_storage_key;
pub use store::{CacheSettings, CacheStore};
pub use value::{decode, encode, CacheValue};

// == Public Constants ==
/// Maximum storage key length in bytes before the key is replaced by its hash
pub const MAX_KEY_SIZE: usize = 500;

/// Strings with at least this many characters are stored as long text
pub const MAX_STR_LENGTH: usize = 500;
