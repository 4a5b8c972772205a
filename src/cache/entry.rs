//! Cache Entry Module
//!
//! Defines the stored form of one cache key: a single typed value slot, an
//! optional absolute expiry and an optional concurrency token.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use thiserror::Error;

use crate::storage::Record;

// == Stored Value ==
/// The value slot of an entry. Exactly one representation is ever stored.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Bool(bool),
    /// String shorter than the long-text threshold
    Str(String),
    /// String at or above the long-text threshold
    Text(String),
    /// Serialized JSON document
    Json(String),
    /// Opaque binary serialization
    Blob(Vec<u8>),
}

// == Corrupt Record ==
/// Raised when a persisted record has no populated value column.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("record {0} does not contain any value")]
pub struct CorruptRecord(pub String);

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Derived storage key
    pub storage_key: String,
    /// The stored value
    pub value: StoredValue,
    /// Expiration instant, None = no expiration
    pub expires_at: Option<DateTime<Utc>>,
    /// Concurrency token, None for rows written before tokens existed
    pub cas_id: Option<u64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry with a fresh concurrency token.
    ///
    /// # Arguments
    /// * `storage_key` - Derived key the entry is stored under
    /// * `value` - Encoded value slot
    /// * `ttl_seconds` - Relative expiry; 0 means never expire, negative values
    ///   produce an entry that is already expired
    pub fn new(storage_key: String, value: StoredValue, ttl_seconds: i64) -> Self {
        Self {
            storage_key,
            value,
            expires_at: expiry_after(ttl_seconds),
            cas_id: Some(next_cas_id()),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches its expiry instant.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Checks expiry against a caller-supplied clock reading.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires) if expires <= now)
    }

    // == Into Record ==
    /// Flattens the entry into the persisted column layout.
    pub fn into_record(self) -> Record {
        let mut record = Record::empty(self.storage_key);
        record.cas_id = self.cas_id;
        record.timeout = self.expires_at;

        match self.value {
            StoredValue::Int(v) => record.int_val = Some(v),
            StoredValue::Float(v) => record.float_val = Some(v),
            StoredValue::Date(v) => record.date_val = Some(v),
            StoredValue::Time(v) => record.time_val = Some(v),
            StoredValue::DateTime(v) => record.datetime_val = Some(v),
            StoredValue::Bool(v) => record.bool_val = Some(v),
            StoredValue::Str(v) => record.str_val = Some(v),
            StoredValue::Text(v) => record.text_val = Some(v),
            StoredValue::Json(v) => record.json_val = Some(v),
            StoredValue::Blob(v) => record.blob_val = Some(v),
        }

        record
    }
}

impl TryFrom<Record> for CacheEntry {
    type Error = CorruptRecord;

    /// Picks the first populated column in fixed priority order.
    fn try_from(record: Record) -> Result<Self, Self::Error> {
        let value = if let Some(v) = record.int_val {
            StoredValue::Int(v)
        } else if let Some(v) = record.float_val {
            StoredValue::Float(v)
        } else if let Some(v) = record.date_val {
            StoredValue::Date(v)
        } else if let Some(v) = record.time_val {
            StoredValue::Time(v)
        } else if let Some(v) = record.datetime_val {
            StoredValue::DateTime(v)
        } else if let Some(v) = record.bool_val {
            StoredValue::Bool(v)
        } else if let Some(v) = record.str_val {
            StoredValue::Str(v)
        } else if let Some(v) = record.text_val {
            StoredValue::Text(v)
        } else if let Some(v) = record.json_val {
            StoredValue::Json(v)
        } else if let Some(v) = record.blob_val {
            StoredValue::Blob(v)
        } else {
            return Err(CorruptRecord(record.storage_key));
        };

        Ok(Self {
            storage_key: record.storage_key,
            value,
            expires_at: record.timeout,
            cas_id: record.cas_id,
        })
    }
}

// == Utility Functions ==
/// Computes the absolute expiry for a relative TTL, saturating at the
/// representable range.
pub fn expiry_after(ttl_seconds: i64) -> Option<DateTime<Utc>> {
    if ttl_seconds == 0 {
        return None;
    }

    let saturated = if ttl_seconds > 0 {
        DateTime::<Utc>::MAX_UTC
    } else {
        DateTime::<Utc>::MIN_UTC
    };

    Some(
        Duration::try_seconds(ttl_seconds)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(saturated),
    )
}

static LAST_CAS_ID: AtomicU64 = AtomicU64::new(0);

/// Returns a new concurrency token.
///
/// Tokens are the current Unix time in microseconds, bumped past the previous
/// token when the clock has not advanced, so no two writes in this process
/// share a token.
pub fn next_cas_id() -> u64 {
    let now = Utc::now().timestamp_micros().max(0) as u64;
    let mut last = LAST_CAS_ID.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_CAS_ID.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation_no_ttl() {
        let entry = CacheEntry::new("k".to_string(), StoredValue::Int(1), 0);

        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired());
        assert!(entry.cas_id.is_some());
    }

    #[test]
    fn test_entry_creation_with_ttl() {
        let entry = CacheEntry::new("k".to_string(), StoredValue::Int(1), 60);

        assert!(entry.expires_at.is_some());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_negative_ttl_is_already_expired() {
        let entry = CacheEntry::new("k".to_string(), StoredValue::Int(1), -1);
        assert!(entry.is_expired());
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Utc::now();
        let entry = CacheEntry {
            storage_key: "k".to_string(),
            value: StoredValue::Bool(true),
            expires_at: Some(now),
            cas_id: None,
        };

        assert!(entry.is_expired_at(now), "Entry should be expired at boundary");
        assert!(!entry.is_expired_at(now - Duration::milliseconds(1)));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        assert_eq!(expiry_after(i64::MAX), Some(DateTime::<Utc>::MAX_UTC));
        assert_eq!(expiry_after(i64::MIN), Some(DateTime::<Utc>::MIN_UTC));
        assert_eq!(expiry_after(0), None);
    }

    #[test]
    fn test_cas_ids_strictly_increase() {
        let first = next_cas_id();
        let second = next_cas_id();
        let third = next_cas_id();
        assert!(first < second && second < third);
    }

    #[test]
    fn test_record_conversion_keeps_metadata() {
        let entry = CacheEntry::new("ns:k".to_string(), StoredValue::Str("v".into()), 30);
        let record = entry.clone().into_record();

        assert_eq!(record.str_val.as_deref(), Some("v"));
        assert!(record.int_val.is_none());
        assert_eq!(record.cas_id, entry.cas_id);
        assert_eq!(record.timeout, entry.expires_at);

        assert_eq!(CacheEntry::try_from(record).unwrap(), entry);
    }

    #[test]
    fn test_record_priority_order() {
        let record = Record {
            bool_val: Some(true),
            int_val: Some(5),
            str_val: Some("s".into()),
            ..Record::empty("k")
        };
        let entry = CacheEntry::try_from(record).unwrap();
        assert_eq!(entry.value, StoredValue::Int(5));
    }

    #[test]
    fn test_empty_record_is_corrupt() {
        let result = CacheEntry::try_from(Record::empty("k"));
        assert_eq!(result, Err(CorruptRecord("k".to_string())));
    }
}
