//! Persisted Record Layout
//!
//! The flat shape written to the document store: one optional column per
//! value type, of which exactly one should be populated.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

// == Record ==
/// One stored cache row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub storage_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub int_val: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub float_val: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_val: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_val: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime_val: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bool_val: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub str_val: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_val: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_val: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_val: Option<Vec<u8>>,
    /// Concurrency token, absent on rows written before tokens existed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cas_id: Option<u64>,
    /// Absolute expiry, None = never expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<DateTime<Utc>>,
}

impl Record {
    /// Creates a record with no value columns populated.
    pub fn empty(storage_key: impl Into<String>) -> Self {
        Self {
            storage_key: storage_key.into(),
            ..Self::default()
        }
    }

    /// Returns true if the record carries a timeout at or before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.timeout, Some(timeout) if timeout <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_empty_record_serializes_only_key() {
        let record = Record::empty("ns:key");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({ "storage_key": "ns:key" }));
    }

    #[test]
    fn test_populated_columns_serialize() {
        let record = Record {
            int_val: Some(7),
            cas_id: Some(42),
            ..Record::empty("k")
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["int_val"], 7);
        assert_eq!(json["cas_id"], 42);
        assert!(json.get("str_val").is_none());

        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let mut record = Record::empty("k");
        assert!(!record.is_expired_at(now));

        record.timeout = Some(now);
        assert!(record.is_expired_at(now));

        record.timeout = Some(now + Duration::seconds(1));
        assert!(!record.is_expired_at(now));
    }
}
