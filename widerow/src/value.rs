use std::{cmp::Ordering, fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, WideRowError};

/// A single column value.
///
/// Scalars map onto the native column types of the real store; `List` and `Map`
/// only ever appear in regular (non-key) columns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Text(String),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
    Uuid(Uuid),
    /// Arbitrary precision decimal in its textual form, e.g. `"12.50"`.
    Decimal(String),
    Duration(Duration),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

/// Numeric view shared by every integer width, floats and decimal strings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Number {
    Int(i128),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(f) => f,
        }
    }

    fn partial_cmp(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(l), Number::Int(r)) => Some(l.cmp(&r)),
            (l, r) => l.as_f64().partial_cmp(&r.as_f64()),
        }
    }

    fn parse_decimal(s: &str) -> Option<Number> {
        let s = s.trim();
        if let Ok(n) = s.parse::<i128>() {
            return Some(Number::Int(n));
        }
        s.parse::<f64>().ok().filter(|f| f.is_finite()).map(Number::Float)
    }
}

impl Value {
    /// Name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Text(_) => "text",
            Value::I8(_) => "tinyint",
            Value::I16(_) => "smallint",
            Value::I32(_) => "int",
            Value::I64(_) => "bigint",
            Value::U8(_) => "unsigned tinyint",
            Value::U16(_) => "unsigned smallint",
            Value::U32(_) => "unsigned int",
            Value::U64(_) => "unsigned bigint",
            Value::F32(_) => "float",
            Value::F64(_) => "double",
            Value::Bool(_) => "boolean",
            Value::Timestamp(_) => "timestamp",
            Value::Bytes(_) => "blob",
            Value::Uuid(_) => "uuid",
            Value::Decimal(_) => "decimal",
            Value::Duration(_) => "duration",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub(crate) fn as_number(&self) -> Option<Number> {
        let n = match self {
            Value::I8(n) => Number::Int(*n as i128),
            Value::I16(n) => Number::Int(*n as i128),
            Value::I32(n) => Number::Int(*n as i128),
            Value::I64(n) => Number::Int(*n as i128),
            Value::U8(n) => Number::Int(*n as i128),
            Value::U16(n) => Number::Int(*n as i128),
            Value::U32(n) => Number::Int(*n as i128),
            Value::U64(n) => Number::Int(*n as i128),
            Value::F32(f) => Number::Float(*f as f64),
            Value::F64(f) => Number::Float(*f),
            Value::Decimal(s) => return Number::parse_decimal(s),
            _ => return None,
        };
        Some(n)
    }

    /// Orders two values by their canonical scalar form. Integers of any width,
    /// floats and decimal strings compare numerically; durations compare by
    /// length. Returns `None` when the two values are structurally incomparable.
    pub fn canonical_cmp(&self, other: &Value) -> Option<Ordering> {
        if let (Some(l), Some(r)) = (self.as_number(), other.as_number()) {
            return l.partial_cmp(r);
        }
        match (self, other) {
            (Value::Text(l), Value::Text(r)) => Some(l.as_bytes().cmp(r.as_bytes())),
            (Value::Bytes(l), Value::Bytes(r)) => Some(l.cmp(r)),
            (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
            (Value::Timestamp(l), Value::Timestamp(r)) => Some(l.cmp(r)),
            (Value::Uuid(l), Value::Uuid(r)) => Some(l.as_bytes().cmp(r.as_bytes())),
            (Value::Duration(l), Value::Duration(r)) => Some(l.as_nanos().cmp(&r.as_nanos())),
            _ => None,
        }
    }

    /// Equality over canonical scalar form; collections compare element-wise.
    pub fn canonical_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::List(l), Value::List(r)) => {
                l.len() == r.len() && l.iter().zip(r).all(|(a, b)| a.canonical_eq(b))
            }
            (Value::Map(l), Value::Map(r)) => {
                l.len() == r.len()
                    && l.iter().all(|(k, v)| {
                        r.iter()
                            .any(|(rk, rv)| rk.canonical_eq(k) && rv.canonical_eq(v))
                    })
            }
            _ => self.canonical_cmp(other) == Some(Ordering::Equal),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Text(s) => write!(f, "'{s}'"),
            Value::I8(n) => write!(f, "{n}"),
            Value::I16(n) => write!(f, "{n}"),
            Value::I32(n) => write!(f, "{n}"),
            Value::I64(n) => write!(f, "{n}"),
            Value::U8(n) => write!(f, "{n}"),
            Value::U16(n) => write!(f, "{n}"),
            Value::U32(n) => write!(f, "{n}"),
            Value::U64(n) => write!(f, "{n}"),
            Value::F32(n) => write!(f, "{n}"),
            Value::F64(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            Value::Bytes(b) => {
                write!(f, "0x")?;
                b.iter().try_for_each(|byte| write!(f, "{byte:02x}"))
            }
            Value::Uuid(u) => write!(f, "{u}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Duration(d) => write!(f, "{d:?}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

value_from! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    bool => Bool,
    String => Text,
    DateTime<Utc> => Timestamp,
    Uuid => Uuid,
    Vec<u8> => Bytes,
    Duration => Duration,
    Vec<Value> => List,
}

impl From<isize> for Value {
    fn from(value: isize) -> Self {
        Self::I64(value as i64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Self::U64(value as u64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl TryFrom<Value> for i64 {
    type Error = WideRowError;

    fn try_from(value: Value) -> Result<Self> {
        match value.as_number() {
            Some(Number::Int(n)) if !matches!(value, Value::Decimal(_)) => {
                i64::try_from(n).map_err(|_| WideRowError::conversion(&value, "i64"))
            }
            _ => Err(WideRowError::conversion(value, "i64")),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = WideRowError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::F64(n) => Ok(n),
            Value::F32(n) => Ok(n as f64),
            _ => Err(WideRowError::conversion(value, "f64")),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = WideRowError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Text(s) | Value::Decimal(s) => Ok(s),
            _ => Err(WideRowError::conversion(value, "String")),
        }
    }
}

impl TryFrom<Value> for DateTime<Utc> {
    type Error = WideRowError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Timestamp(t) => Ok(t),
            _ => Err(WideRowError::conversion(value, "DateTime<Utc>")),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = WideRowError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            _ => Err(WideRowError::conversion(value, "bool")),
        }
    }
}

impl TryFrom<Value> for Uuid {
    type Error = WideRowError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Uuid(u) => Ok(u),
            _ => Err(WideRowError::conversion(value, "Uuid")),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn value_from_int() {
        assert_eq!(Value::from(42), Value::I32(42));
        assert_eq!(Value::from(42_u32), Value::U32(42));
        assert_eq!(Value::from(42_u64), Value::U64(42));
        assert_eq!(Value::from(42_isize), Value::I64(42));
        assert_eq!(Value::from(42_usize), Value::U64(42));
        assert_eq!(Value::from(42_i64), Value::I64(42));
    }

    #[test]
    fn value_from_string() {
        let s = String::from("Hi Mom!");
        assert_eq!(Value::from(s.clone()), Value::Text(s));
        assert_eq!(Value::from("Hi Mom!"), Value::Text("Hi Mom!".into()));
        assert_eq!(Value::from(None::<i32>), Value::Null);
    }

    #[test]
    fn integers_compare_across_widths() {
        assert!(Value::I8(5).canonical_eq(&Value::U64(5)));
        assert_eq!(
            Value::I16(-3).canonical_cmp(&Value::U32(2)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::U64(u64::MAX).canonical_cmp(&Value::I64(i64::MAX)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn decimals_reconcile_with_numbers() {
        assert!(Value::Decimal("1.50".into()).canonical_eq(&Value::F64(1.5)));
        assert!(Value::Decimal("7".into()).canonical_eq(&Value::I32(7)));
        assert_eq!(
            Value::Decimal("2.25".into()).canonical_cmp(&Value::I64(3)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Decimal("abc".into()).canonical_cmp(&Value::I64(3)), None);
    }

    #[test]
    fn durations_compare_by_length() {
        let a = Value::Duration(Duration::from_millis(1500));
        let b = Value::Duration(Duration::from_secs(1) + Duration::from_nanos(500_000_000));
        assert!(a.canonical_eq(&b));
        assert_eq!(
            a.canonical_cmp(&Value::Duration(Duration::from_secs(2))),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn incomparable_types_fail_closed() {
        assert_eq!(Value::Text("1".into()).canonical_cmp(&Value::I32(1)), None);
        assert!(!Value::Text("1".into()).canonical_eq(&Value::I32(1)));
        assert!(!Value::Bool(true).canonical_eq(&Value::I8(1)));
    }

    #[test]
    fn try_from_value() -> Result<()> {
        assert_eq!(i64::try_from(Value::U16(9))?, 9);
        assert!(i64::try_from(Value::U64(u64::MAX)).is_err());
        assert!(i64::try_from(Value::Decimal("3".into())).is_err());
        assert_eq!(f64::try_from(Value::F32(0.5))?, 0.5);
        assert_eq!(String::try_from(Value::from("x"))?, "x");
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(DateTime::<Utc>::try_from(Value::Timestamp(t))?, t);
        Ok(())
    }

    #[test]
    fn display_lists_and_maps() {
        let v = Value::List(vec![1.into(), "a".into()]);
        assert_eq!(v.to_string(), "[1, 'a']");
        let m = Value::Map(vec![("k".into(), true.into())]);
        assert_eq!(m.to_string(), "{'k': true}");
        assert_eq!(Value::Bytes(vec![0xde, 0xad]).to_string(), "0xdead");
    }
}
