//! Cache Values and Codec
//!
//! `CacheValue` is what callers store and read back. The codec turns it into
//! the single [`StoredValue`] slot persisted with an entry, and back.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::cache::entry::StoredValue;
use crate::cache::MAX_STR_LENGTH;
use crate::error::{CacheError, Result};

// == Cache Value ==
/// A typed value held by the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    /// Structured value kept as a JSON document
    Json(Value),
    /// Opaque bytes, either caller-supplied or a binary serde encoding
    Blob(Vec<u8>),
}

impl CacheValue {
    /// Encodes any serializable value.
    ///
    /// JSON is tried first. Values JSON cannot represent (maps with
    /// non-string keys, for instance) fall back to a compact binary encoding
    /// readable through [`CacheValue::decode_as`].
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        match serde_json::to_value(value) {
            Ok(json) => Ok(CacheValue::Json(json)),
            Err(_) => postcard::to_stdvec(value)
                .map(CacheValue::Blob)
                .map_err(|err| CacheError::Codec(err.to_string())),
        }
    }

    /// Recovers a typed value from any variant.
    pub fn decode_as<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            CacheValue::Blob(bytes) => {
                postcard::from_bytes(bytes).map_err(|err| CacheError::Codec(err.to_string()))
            }
            other => serde_json::from_value(other.to_json())
                .map_err(|err| CacheError::Codec(err.to_string())),
        }
    }

    /// Maps a JSON document onto the most specific variant.
    ///
    /// Integers outside the `i64` range stay as JSON numbers so they keep
    /// every digit.
    pub fn from_json(json: Value) -> Self {
        match json {
            Value::String(s) => CacheValue::Str(s),
            Value::Bool(b) => CacheValue::Bool(b),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => CacheValue::Int(i),
                (None, Some(f)) if n.is_f64() => CacheValue::Float(f),
                _ => CacheValue::Json(Value::Number(n)),
            },
            other => CacheValue::Json(other),
        }
    }

    /// Renders the value as JSON. Temporal values become ISO-8601 strings and
    /// blobs become hex strings.
    pub fn to_json(&self) -> Value {
        match self {
            CacheValue::Int(i) => Value::from(*i),
            CacheValue::Float(f) => Value::from(*f),
            CacheValue::Bool(b) => Value::Bool(*b),
            CacheValue::Str(s) => Value::String(s.clone()),
            CacheValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            CacheValue::Time(t) => Value::String(t.format("%H:%M:%S%.f").to_string()),
            CacheValue::DateTime(dt) => Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            CacheValue::Json(json) => json.clone(),
            CacheValue::Blob(bytes) => Value::String(hex::encode(bytes)),
        }
    }

    /// Memcache-client truthiness: zero, empty and null values are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            CacheValue::Int(i) => *i != 0,
            CacheValue::Float(f) => *f != 0.0,
            CacheValue::Bool(b) => *b,
            CacheValue::Str(s) => !s.is_empty(),
            CacheValue::Date(_) | CacheValue::Time(_) | CacheValue::DateTime(_) => true,
            CacheValue::Json(json) => match json {
                Value::Null => false,
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
                Value::String(s) => !s.is_empty(),
                Value::Array(items) => !items.is_empty(),
                Value::Object(fields) => !fields.is_empty(),
            },
            CacheValue::Blob(bytes) => !bytes.is_empty(),
        }
    }
}

// == Conversions ==
macro_rules! impl_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for CacheValue {
                fn from(value: $source) -> Self {
                    CacheValue::$variant(value.into())
                }
            }
        )*
    };
}

impl_from! {
    i64 => Int,
    i32 => Int,
    u32 => Int,
    f64 => Float,
    f32 => Float,
    bool => Bool,
    String => Str,
    &str => Str,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    Value => Json,
    Vec<u8> => Blob,
}

// == Encode ==
/// Encodes a value into its stored slot.
///
/// Strings shorter than [`MAX_STR_LENGTH`] characters use the short string
/// slot; longer ones use the long text slot.
pub fn encode(value: CacheValue) -> Result<StoredValue> {
    Ok(match value {
        CacheValue::Str(s) if s.chars().count() < MAX_STR_LENGTH => StoredValue::Str(s),
        CacheValue::Str(s) => StoredValue::Text(s),
        CacheValue::Bool(b) => StoredValue::Bool(b),
        CacheValue::Int(i) => StoredValue::Int(i),
        CacheValue::Float(f) => StoredValue::Float(f),
        CacheValue::Date(d) => StoredValue::Date(d),
        CacheValue::Time(t) => StoredValue::Time(t),
        CacheValue::DateTime(dt) => StoredValue::DateTime(dt),
        CacheValue::Json(json) => StoredValue::Json(
            serde_json::to_string(&json).map_err(|err| CacheError::Codec(err.to_string()))?,
        ),
        CacheValue::Blob(bytes) => StoredValue::Blob(bytes),
    })
}

// == Decode ==
/// Decodes a stored slot. Fails only when a JSON slot does not parse.
pub fn decode(slot: StoredValue) -> Result<CacheValue> {
    Ok(match slot {
        StoredValue::Int(i) => CacheValue::Int(i),
        StoredValue::Float(f) => CacheValue::Float(f),
        StoredValue::Date(d) => CacheValue::Date(d),
        StoredValue::Time(t) => CacheValue::Time(t),
        StoredValue::DateTime(dt) => CacheValue::DateTime(dt),
        StoredValue::Bool(b) => CacheValue::Bool(b),
        StoredValue::Str(s) | StoredValue::Text(s) => CacheValue::Str(s),
        StoredValue::Json(text) => CacheValue::Json(
            serde_json::from_str(&text).map_err(|err| CacheError::Codec(err.to_string()))?,
        ),
        StoredValue::Blob(bytes) => CacheValue::Blob(bytes),
    })
}
