//! Time-ordered 128-bit identifiers.
//!
//! Layout, most significant first: 64 bits of milliseconds since the Unix epoch,
//! 48 bits of worker id, 16 bits of sequence. The text form is 32 lower-case hex
//! digits, so sorting ids as text, as keys, or as integers gives the same order and
//! that order follows the embedded instant.
use std::{fmt, str::FromStr};

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use crate::{
    error::{Result, WideRowError},
    Value,
};

const WORKER_BITS: u32 = 48;
const SEQUENCE_BITS: u32 = 16;
const WORKER_MASK: u64 = (1 << WORKER_BITS) - 1;
const TEXT_LEN: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlakeId(u128);

impl FlakeId {
    pub fn from_parts(millis: u64, worker: u64, sequence: u16) -> Self {
        let id = ((millis as u128) << (WORKER_BITS + SEQUENCE_BITS))
            | (((worker & WORKER_MASK) as u128) << SEQUENCE_BITS)
            | sequence as u128;
        FlakeId(id)
    }

    /// The smallest id minted at `instant`. Instants before the epoch clamp to it.
    pub fn min_for(instant: DateTime<Utc>) -> Self {
        Self::from_parts(instant.timestamp_millis().max(0) as u64, 0, 0)
    }

    pub fn parse(text: &str) -> Result<Self> {
        if text.len() != TEXT_LEN || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(WideRowError::InvalidIdentifier(text.to_string()));
        }
        u128::from_str_radix(text, 16)
            .map(FlakeId)
            .map_err(|_| WideRowError::InvalidIdentifier(text.to_string()))
    }

    pub fn millis(&self) -> u64 {
        (self.0 >> (WORKER_BITS + SEQUENCE_BITS)) as u64
    }

    pub fn worker(&self) -> u64 {
        ((self.0 >> SEQUENCE_BITS) as u64) & WORKER_MASK
    }

    pub fn sequence(&self) -> u16 {
        self.0 as u16
    }

    /// The instant embedded in the id.
    pub fn timestamp(&self) -> Result<DateTime<Utc>> {
        i64::try_from(self.millis())
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .ok_or_else(|| WideRowError::InvalidIdentifier(self.to_string()))
    }

    pub fn as_u128(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for FlakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for FlakeId {
    type Err = WideRowError;

    fn from_str(s: &str) -> Result<Self> {
        FlakeId::parse(s)
    }
}

impl From<FlakeId> for Value {
    fn from(id: FlakeId) -> Self {
        Value::Text(id.to_string())
    }
}

impl TryFrom<&Value> for FlakeId {
    type Error = WideRowError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Text(text) => FlakeId::parse(text),
            other => Err(WideRowError::InvalidIdentifier(other.to_string())),
        }
    }
}

/// Mints strictly increasing ids for one worker.
#[derive(Debug)]
pub struct FlakeGenerator {
    worker: u64,
    last: Mutex<(u64, u16)>,
}

impl FlakeGenerator {
    pub fn new(worker: u64) -> Self {
        Self {
            worker: worker & WORKER_MASK,
            last: Mutex::new((0, 0)),
        }
    }

    pub fn worker(&self) -> u64 {
        self.worker
    }

    pub fn next_id(&self) -> FlakeId {
        self.next_id_at(Utc::now())
    }

    /// Mints an id for `instant`. If the clock went backwards, or the sequence for
    /// the current millisecond is exhausted, the id borrows the following
    /// millisecond so the output stays strictly increasing.
    pub fn next_id_at(&self, instant: DateTime<Utc>) -> FlakeId {
        let requested = instant.timestamp_millis().max(0) as u64;
        let mut last = self.last.lock();
        let (last_ms, last_seq) = *last;
        let next = if requested > last_ms {
            (requested, 0)
        } else if last_seq == u16::MAX {
            (last_ms + 1, 0)
        } else {
            (last_ms, last_seq + 1)
        };
        *last = next;
        FlakeId::from_parts(next.0, self.worker, next.1)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, thread};

    use super::*;

    #[test]
    fn text_form_round_trips() -> Result<()> {
        let id = FlakeId::from_parts(1_430_492_639_000, 0xabc, 7);
        let text = id.to_string();
        assert_eq!(text.len(), 32);
        assert_eq!(text, text.to_lowercase());
        assert_eq!(FlakeId::parse(&text)?, id);
        assert_eq!(id.worker(), 0xabc);
        assert_eq!(id.sequence(), 7);
        assert_eq!(id.timestamp()?.timestamp_millis(), 1_430_492_639_000);
        Ok(())
    }

    #[test]
    fn malformed_ids_are_rejected() {
        for text in ["", "xyz", "0123456789abcdef", "g0000000000000000000000000000000"] {
            assert!(matches!(
                FlakeId::parse(text),
                Err(WideRowError::InvalidIdentifier(_))
            ));
        }
        assert!(FlakeId::try_from(&Value::I64(4)).is_err());
    }

    #[test]
    fn text_order_follows_time() {
        let t = Utc.with_ymd_and_hms(2015, 5, 1, 15, 4, 0).unwrap();
        let early = FlakeId::from_parts(t.timestamp_millis() as u64, u32::MAX as u64, u16::MAX);
        let late = FlakeId::min_for(t + chrono::Duration::milliseconds(1));
        assert!(early < late);
        assert!(early.to_string() < late.to_string());
        assert!(FlakeId::min_for(t) <= early);
    }

    #[test]
    fn generator_is_strictly_increasing() {
        let generator = FlakeGenerator::new(3);
        let t = Utc.with_ymd_and_hms(2015, 5, 1, 0, 0, 0).unwrap();
        let mut previous = generator.next_id_at(t);
        for _ in 0..(u16::MAX as usize + 10) {
            let id = generator.next_id_at(t);
            assert!(id > previous);
            previous = id;
        }
        // sequence overflow spilled into the next millisecond
        assert_eq!(previous.millis(), t.timestamp_millis() as u64 + 1);

        let rewound = generator.next_id_at(t - chrono::Duration::seconds(1));
        assert!(rewound > previous);
    }

    #[test]
    fn generator_never_repeats_across_threads() {
        let generator = Arc::new(FlakeGenerator::new(1));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let generator = generator.clone();
                thread::spawn(move || (0..500).map(|_| generator.next_id()).collect::<Vec<_>>())
            })
            .collect();
        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 2000);
    }
}
