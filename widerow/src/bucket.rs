//! Time bucketing for time-series partitions.
//!
//! A bucket is an `i64` derived from an instant and stored as an extra partition key
//! column, so one partition never holds more than one window of rows. The fixed
//! scheme uses millisecond instants aligned to a step; other schemes can plug in
//! through [`Bucketer`] as long as they are monotonic and strictly advancing.
use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::trace;

use crate::error::{Result, WideRowError};

pub trait Bucketer: Debug + Send + Sync {
    /// Bucket containing `t`. Must be monotonic non-decreasing in `t`.
    fn bucket(&self, t: DateTime<Utc>) -> i64;

    /// Bucket following `bucket`. Must be strictly greater.
    fn next(&self, bucket: i64) -> i64;

    /// Bucket preceding `bucket`. Must be strictly smaller.
    fn prev(&self, bucket: i64) -> i64;
}

/// Fixed-width buckets: `floor(t_ms / step_ms) * step_ms`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedBucketer {
    step_ms: i64,
}

impl FixedBucketer {
    pub fn new(step: Duration) -> Result<Self> {
        let step_ms = step.num_milliseconds();
        if step_ms <= 0 {
            return Err(WideRowError::InvalidBucketScheme(step_ms));
        }
        Ok(Self { step_ms })
    }

    pub fn step(&self) -> Duration {
        Duration::milliseconds(self.step_ms)
    }
}

impl Bucketer for FixedBucketer {
    fn bucket(&self, t: DateTime<Utc>) -> i64 {
        t.timestamp_millis().div_euclid(self.step_ms) * self.step_ms
    }

    fn next(&self, bucket: i64) -> i64 {
        bucket.saturating_add(self.step_ms)
    }

    fn prev(&self, bucket: i64) -> i64 {
        bucket.saturating_sub(self.step_ms)
    }
}

/// Which buckets close a covering sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BucketBound {
    /// Up to and including the bucket that contains `end`.
    ContainingEnd,
    /// Only the buckets holding instants strictly before `end`.
    BeforeEnd,
}

/// Ascending buckets covering `[start, end]`, or `[start, end)` with
/// [`BucketBound::BeforeEnd`]. Empty when the range is.
pub fn buckets_covering(
    bucketer: &dyn Bucketer,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    bound: BucketBound,
) -> Result<Vec<i64>> {
    let last = match bound {
        BucketBound::ContainingEnd if end >= start => bucketer.bucket(end),
        BucketBound::BeforeEnd if end > start => {
            match end.checked_sub_signed(Duration::milliseconds(1)) {
                Some(before) => bucketer.bucket(before),
                None => return Ok(Vec::new()),
            }
        }
        _ => return Ok(Vec::new()),
    };
    let within = |b: i64| b <= last;

    let mut buckets = Vec::new();
    let mut bucket = bucketer.bucket(start);
    while within(bucket) {
        buckets.push(bucket);
        let next = bucketer.next(bucket);
        if next <= bucket {
            return Err(WideRowError::InvalidBucketScheme(bucket));
        }
        bucket = next;
    }
    trace!(%start, %end, ?bound, count = buckets.len(), "Enumerated covering buckets");
    Ok(buckets)
}

/// A position in the bucket sequence that can be walked in either direction.
#[derive(Clone, Debug)]
pub struct BucketCursor {
    bucketer: Arc<dyn Bucketer>,
    bucket: i64,
}

impl BucketCursor {
    pub fn new(bucketer: Arc<dyn Bucketer>, start: DateTime<Utc>) -> Self {
        let bucket = bucketer.bucket(start);
        Self { bucketer, bucket }
    }

    pub fn bucket(&self) -> i64 {
        self.bucket
    }

    /// The bucket as an instant, for schemes whose buckets are millisecond
    /// timestamps.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.bucket).single()
    }

    pub fn next(&self) -> Self {
        Self {
            bucketer: self.bucketer.clone(),
            bucket: self.bucketer.next(self.bucket),
        }
    }

    pub fn prev(&self) -> Self {
        Self {
            bucketer: self.bucketer.clone(),
            bucket: self.bucketer.prev(self.bucket),
        }
    }
}
