//! Property value type: the closed set of things a property cell can hold.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Value stored in a property cell.
///
/// Every consumer matches this exhaustively, so adding a variant forces the
/// document mapper, the filter translator and the comparator to handle it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),

    // Temporal
    /// Calendar date without a time component.
    Date(NaiveDate),
    DateTime(DateTime<Utc>),

    // Spatial
    GeoPoint { lat: f64, lon: f64 },

    /// Large value whose content lives outside the property store.
    Streaming(StreamingValue),
}

/// Declared type of a value, used by the index registry and the ignore-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Null,
    Boolean,
    Integer,
    Float,
    String,
    Bytes,
    Date,
    DateTime,
    GeoPoint,
    Streaming,
}

impl DataType {
    pub fn name(self) -> &'static str {
        match self {
            DataType::Null => "NULL",
            DataType::Boolean => "BOOLEAN",
            DataType::Integer => "INTEGER",
            DataType::Float => "FLOAT",
            DataType::String => "STRING",
            DataType::Bytes => "BYTES",
            DataType::Date => "DATE",
            DataType::DateTime => "DATETIME",
            DataType::GeoPoint => "GEO_POINT",
            DataType::Streaming => "STREAMING",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Streaming values
// ============================================================================

/// A property value whose bytes are handed over as a stream.
///
/// `store = false` means the value is a side-effect-only write (e.g. to a
/// blob store) and never lands in the element's property set.
/// `search_index` controls whether the content is inlined into the search
/// document; only `DataType::String` content can be inlined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingValue {
    pub data: Vec<u8>,
    pub value_type: DataType,
    pub search_index: bool,
    pub store: bool,
}

impl StreamingValue {
    pub fn new(data: impl Into<Vec<u8>>, value_type: DataType) -> Self {
        Self {
            data: data.into(),
            value_type,
            search_index: false,
            store: true,
        }
    }

    pub fn search_index(mut self, search_index: bool) -> Self {
        self.search_index = search_index;
        self
    }

    pub fn store(mut self, store: bool) -> Self {
        self.store = store;
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ============================================================================
// Type checking
// ============================================================================

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Bool(_) => DataType::Boolean,
            Value::Int(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::String(_) => DataType::String,
            Value::Bytes(_) => DataType::Bytes,
            Value::Date(_) => DataType::Date,
            Value::DateTime(_) => DataType::DateTime,
            Value::GeoPoint { .. } => DataType::GeoPoint,
            Value::Streaming(_) => DataType::Streaming,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.data_type().name()
    }

    /// False only for streamed values flagged "do not store".
    pub fn is_stored(&self) -> bool {
        match self {
            Value::Streaming(s) => s.store,
            _ => true,
        }
    }

    /// Date-only values as an instant (midnight UTC).
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            Value::Date(d) => Some(date_at_midnight(*d)),
            _ => None,
        }
    }
}

pub(crate) fn date_at_midnight(d: NaiveDate) -> DateTime<Utc> {
    d.and_time(chrono::NaiveTime::MIN).and_utc()
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<bool> for Value { fn from(v: bool) -> Self { Value::Bool(v) } }
impl From<i32> for Value { fn from(v: i32) -> Self { Value::Int(v as i64) } }
impl From<i64> for Value { fn from(v: i64) -> Self { Value::Int(v) } }
impl From<f64> for Value { fn from(v: f64) -> Self { Value::Float(v) } }
impl From<String> for Value { fn from(v: String) -> Self { Value::String(v) } }
impl From<&str> for Value { fn from(v: &str) -> Self { Value::String(v.to_owned()) } }
impl From<Vec<u8>> for Value { fn from(v: Vec<u8>) -> Self { Value::Bytes(v) } }
impl From<NaiveDate> for Value { fn from(v: NaiveDate) -> Self { Value::Date(v) } }
impl From<DateTime<Utc>> for Value { fn from(v: DateTime<Utc>) -> Self { Value::DateTime(v) } }
impl From<StreamingValue> for Value { fn from(v: StreamingValue) -> Self { Value::Streaming(v) } }
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self { v.map(Into::into).unwrap_or(Value::Null) }
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            Value::Bytes(b) => write!(f, "<bytes[{}]>", b.len()),
            Value::Date(d) => write!(f, "{d}"),
            Value::DateTime(dt) => write!(f, "{dt}"),
            Value::GeoPoint { lat, lon } => write!(f, "geo({lat}, {lon})"),
            Value::Streaming(s) => write!(f, "<stream[{}; {}]>", s.value_type, s.len()),
        }
    }
}

// ============================================================================
// Comparison
// ============================================================================

impl Value {
    /// Ordering used by `Compare` predicates. `None` for incompatible types
    /// and for NULL on either side.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (Value::Date(a), Value::Date(b)) => a.partial_cmp(b),
            (Value::Date(_) | Value::DateTime(_), Value::Date(_) | Value::DateTime(_)) => {
                self.as_datetime()?.partial_cmp(&other.as_datetime()?)
            }
            _ => None,
        }
    }
}
