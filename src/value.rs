//! Key values and value ordering.
//!
//! Relation loading groups rows by join key, so keys must be hashable. SeaQuery's
//! `Value` is not, which is why identity and join keys are carried as [`KeyValue`].
//! A `KeyValue` widens every integer to `i64` and is never bound as a parameter:
//! queries bind the column value as read, so an `INT4` key stays an `INT4`.

use sea_query::Value;
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// A hashable, non-null key value (primary key, foreign key, junction key)
///
/// # Example
///
/// ```
/// use lifeguard_bulk::KeyValue;
/// use sea_query::Value;
///
/// let key = KeyValue::from_value(&Value::Int(Some(7))).unwrap();
/// assert_eq!(key, KeyValue::Int(7));
/// assert_eq!(KeyValue::from_value(&Value::Int(None)), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    /// Boolean key
    Bool(bool),
    /// Any integer width, widened to `i64`
    Int(i64),
    /// Text key
    Text(String),
    /// UUID key
    Uuid(Uuid),
}

impl KeyValue {
    /// Convert a SeaQuery value into a key
    ///
    /// Returns `None` for SQL `NULL` and for value types that cannot act as a key
    /// (floats, JSON, binary data, ...).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(Some(b)) => Some(Self::Bool(*b)),
            Value::TinyInt(Some(i)) => Some(Self::Int(i64::from(*i))),
            Value::SmallInt(Some(i)) => Some(Self::Int(i64::from(*i))),
            Value::Int(Some(i)) => Some(Self::Int(i64::from(*i))),
            Value::BigInt(Some(i)) => Some(Self::Int(*i)),
            Value::TinyUnsigned(Some(u)) => Some(Self::Int(i64::from(*u))),
            Value::SmallUnsigned(Some(u)) => Some(Self::Int(i64::from(*u))),
            Value::Unsigned(Some(u)) => Some(Self::Int(i64::from(*u))),
            Value::BigUnsigned(Some(u)) => i64::try_from(*u).ok().map(Self::Int),
            Value::String(Some(s)) => Some(Self::Text(s.to_string())),
            Value::Char(Some(c)) => Some(Self::Text(c.to_string())),
            Value::Uuid(Some(u)) => Some(Self::Uuid(Uuid::from_bytes(*u.as_bytes()))),
            _ => None,
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Bool(b) => write!(f, "{b}"),
            KeyValue::Int(i) => write!(f, "{i}"),
            KeyValue::Text(s) => write!(f, "'{s}'"),
            KeyValue::Uuid(u) => write!(f, "{u}"),
        }
    }
}

impl From<i32> for KeyValue {
    fn from(value: i32) -> Self {
        KeyValue::Int(i64::from(value))
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        KeyValue::Int(value)
    }
}

impl From<bool> for KeyValue {
    fn from(value: bool) -> Self {
        KeyValue::Bool(value)
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::Text(value.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        KeyValue::Text(value)
    }
}

impl From<Uuid> for KeyValue {
    fn from(value: Uuid) -> Self {
        KeyValue::Uuid(value)
    }
}

/// Comparable projection of a `Value`, used for in-memory ordering
#[derive(Debug, PartialEq, PartialOrd)]
enum SortKey {
    Bool(bool),
    Number(f64),
    Text(String),
    Null,
}

fn sort_key(value: &Value) -> SortKey {
    use rust_decimal::prelude::ToPrimitive;

    match value {
        Value::Bool(Some(b)) => SortKey::Bool(*b),
        Value::TinyInt(Some(i)) => SortKey::Number(f64::from(*i)),
        Value::SmallInt(Some(i)) => SortKey::Number(f64::from(*i)),
        Value::Int(Some(i)) => SortKey::Number(f64::from(*i)),
        Value::BigInt(Some(i)) => SortKey::Number(*i as f64),
        Value::TinyUnsigned(Some(u)) => SortKey::Number(f64::from(*u)),
        Value::SmallUnsigned(Some(u)) => SortKey::Number(f64::from(*u)),
        Value::Unsigned(Some(u)) => SortKey::Number(f64::from(*u)),
        Value::BigUnsigned(Some(u)) => SortKey::Number(*u as f64),
        Value::Float(Some(f)) => SortKey::Number(f64::from(*f)),
        Value::Double(Some(d)) => SortKey::Number(*d),
        Value::Decimal(Some(d)) => SortKey::Number(d.to_f64().unwrap_or(f64::NAN)),
        Value::String(Some(s)) => SortKey::Text(s.to_string()),
        Value::Char(Some(c)) => SortKey::Text(c.to_string()),
        Value::Uuid(Some(u)) => SortKey::Text(u.to_string()),
        // ISO-8601 renderings sort chronologically
        Value::ChronoDate(Some(d)) => SortKey::Text(d.to_string()),
        Value::ChronoTime(Some(t)) => SortKey::Text(t.to_string()),
        Value::ChronoDateTime(Some(dt)) => SortKey::Text(dt.to_string()),
        Value::ChronoDateTimeUtc(Some(dt)) => SortKey::Text(dt.to_rfc3339()),
        Value::Bool(None)
        | Value::TinyInt(None)
        | Value::SmallInt(None)
        | Value::Int(None)
        | Value::BigInt(None)
        | Value::TinyUnsigned(None)
        | Value::SmallUnsigned(None)
        | Value::Unsigned(None)
        | Value::BigUnsigned(None)
        | Value::Float(None)
        | Value::Double(None)
        | Value::Decimal(None)
        | Value::String(None)
        | Value::Char(None)
        | Value::Uuid(None)
        | Value::ChronoDate(None)
        | Value::ChronoTime(None)
        | Value::ChronoDateTime(None)
        | Value::ChronoDateTimeUtc(None)
        | Value::Bytes(None)
        | Value::Json(None) => SortKey::Null,
        other => SortKey::Text(format!("{other:?}")),
    }
}

/// Compare two values the way PostgreSQL orders them ascending
///
/// `NULL` sorts after every non-null value (`NULLS LAST`), so reversing the
/// result for a descending sort puts nulls first, matching PostgreSQL defaults.
/// Values of unrelated types compare as equal so a stable sort keeps row order.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (sort_key(a), sort_key(b)) {
        (SortKey::Null, SortKey::Null) => Ordering::Equal,
        (SortKey::Null, _) => Ordering::Greater,
        (_, SortKey::Null) => Ordering::Less,
        (left, right) => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
    }
}
