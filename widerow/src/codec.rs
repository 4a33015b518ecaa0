//! Order-preserving key encoding.
//!
//! Every key-capable [`Value`] is turned into a [`ComparableKey`]: a class tag byte
//! followed by a big-endian payload whose bytewise order matches the natural order
//! of the value. Keys of several columns are composed element-wise into a
//! [`CompositeKey`] (partition keys) or a [`ClusteringKey`] (clustering keys, where
//! each element also carries its column's clustering order).
use std::cmp::Ordering;

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, WideRowError},
    Value,
};

const TAG_BOOL: u8 = 0x01;
const TAG_INTEGER: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_TIMESTAMP: u8 = 0x04;
const TAG_UUID: u8 = 0x05;
const TAG_TEXT: u8 = 0x06;
const TAG_BYTES: u8 = 0x07;

const SIGN_128: u128 = 1 << 127;
const SIGN_64: u64 = 1 << 63;

/// Byte-comparable encoding of a single scalar.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComparableKey(Vec<u8>);

impl ComparableKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

fn integer(n: i128) -> ComparableKey {
    let mut buf = [0u8; 17];
    buf[0] = TAG_INTEGER;
    BigEndian::write_u128(&mut buf[1..], (n as u128) ^ SIGN_128);
    ComparableKey(buf.to_vec())
}

fn float(f: f64) -> ComparableKey {
    // -0.0 and 0.0 are the same key
    let f = if f == 0.0 { 0.0 } else { f };
    let bits = f.to_bits();
    let ordered = if bits & SIGN_64 != 0 { !bits } else { bits | SIGN_64 };
    let mut buf = [0u8; 9];
    buf[0] = TAG_FLOAT;
    BigEndian::write_u64(&mut buf[1..], ordered);
    ComparableKey(buf.to_vec())
}

fn tagged(tag: u8, payload: &[u8]) -> ComparableKey {
    let mut buf = Vec::with_capacity(payload.len() + 1);
    buf.push(tag);
    buf.extend_from_slice(payload);
    ComparableKey(buf)
}

/// Encodes one value. Values without a key encoding (null, decimal, duration and
/// collections) are rejected with [`WideRowError::UnsupportedType`].
///
/// Integers of every width share one class so they compare numerically; `f32`
/// is widened to `f64`. Timestamps encode as (seconds, nanoseconds) so they
/// order by absolute instant.
pub fn encode(value: &Value) -> Result<ComparableKey> {
    let key = match value {
        Value::Bool(b) => tagged(TAG_BOOL, &[*b as u8]),
        Value::I8(n) => integer(*n as i128),
        Value::I16(n) => integer(*n as i128),
        Value::I32(n) => integer(*n as i128),
        Value::I64(n) => integer(*n as i128),
        Value::U8(n) => integer(*n as i128),
        Value::U16(n) => integer(*n as i128),
        Value::U32(n) => integer(*n as i128),
        Value::U64(n) => integer(*n as i128),
        Value::F32(f) => float(*f as f64),
        Value::F64(f) => float(*f),
        Value::Timestamp(t) => {
            let mut buf = [0u8; 12];
            BigEndian::write_u64(&mut buf[..8], (t.timestamp() as u64) ^ SIGN_64);
            BigEndian::write_u32(&mut buf[8..], t.timestamp_subsec_nanos());
            tagged(TAG_TIMESTAMP, &buf)
        }
        Value::Uuid(u) => tagged(TAG_UUID, u.as_bytes()),
        Value::Text(s) => tagged(TAG_TEXT, s.as_bytes()),
        Value::Bytes(b) => tagged(TAG_BYTES, b),
        Value::Null
        | Value::Decimal(_)
        | Value::Duration(_)
        | Value::List(_)
        | Value::Map(_) => return Err(WideRowError::UnsupportedType(value.kind())),
    };
    Ok(key)
}

/// Element-wise key over an ordered list of columns, used for partition keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompositeKey(Vec<ComparableKey>);

impl CompositeKey {
    pub fn from_values<'a, I: IntoIterator<Item = &'a Value>>(values: I) -> Result<Self> {
        values
            .into_iter()
            .map(encode)
            .collect::<Result<Vec<_>>>()
            .map(CompositeKey)
    }

    pub fn parts(&self) -> &[ComparableKey] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Compares two composite keys column by column; the first unequal element
/// decides, and a strict prefix orders before its extensions.
pub fn compare(a: &CompositeKey, b: &CompositeKey) -> Ordering {
    a.cmp(b)
}

/// Sort direction of a clustering column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusteringOrder {
    #[default]
    Asc,
    Desc,
}

/// Key of a column group inside a partition. Each part carries the clustering
/// order of its column, so a `BTreeMap<ClusteringKey, _>` iterates in the order
/// the real store would return rows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ClusteringKey(Vec<(ComparableKey, ClusteringOrder)>);

impl ClusteringKey {
    pub fn from_values<'a, I>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a Value, ClusteringOrder)>,
    {
        values
            .into_iter()
            .map(|(value, order)| encode(value).map(|key| (key, order)))
            .collect::<Result<Vec<_>>>()
            .map(ClusteringKey)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starts_with(&self, prefix: &ClusteringKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl Ord for ClusteringKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for ((l, order), (r, _)) in self.0.iter().zip(other.0.iter()) {
            let ord = match order {
                ClusteringOrder::Asc => l.cmp(r),
                ClusteringOrder::Desc => r.cmp(l),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl PartialOrd for ClusteringKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
