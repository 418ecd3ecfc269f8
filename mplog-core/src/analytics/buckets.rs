//! Fixed-window bucket reduction.
//!
//! Both bucketing schemes fold samples into a [`BucketReducer`] and flush it
//! when a boundary is reached. They differ only in what decides a boundary:
//!
//! | Scheme | Boundary | Key |
//! |--------|----------|-----|
//! | [`reduce_windows`] | every `window` samples, plus a final partial window | running sample count |
//! | [`reduce_by_ordinal`] | sample ordinal divisible by `bucket_size` | the ordinal |
//!
//! A sample whose F1 is missing or NaN still counts as an event of its
//! bucket but does not enter the F1 sum.

use crate::types::BucketAverage;
use std::collections::BTreeMap;

/// One accuracy snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Weighted F1, `None` if the snapshot carried no readable score
    pub f1: Option<f64>,
    pub vocab_size: u64,
}

impl Sample {
    pub fn new(f1: Option<f64>, vocab_size: u64) -> Self {
        Self { f1, vocab_size }
    }
}

/// Running sums of the current bucket.
#[derive(Debug, Default)]
pub struct BucketReducer {
    f1_sum: f64,
    vocab_sum: u64,
    events: u32,
    contributing: u32,
}

impl BucketReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: Sample) {
        self.events += 1;
        self.vocab_sum += sample.vocab_size;
        if let Some(f1) = sample.f1.filter(|f1| !f1.is_nan()) {
            self.f1_sum += f1;
            self.contributing += 1;
        }
    }

    /// Number of samples since the last flush.
    pub fn events(&self) -> u32 {
        self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events == 0
    }

    /// Average the current bucket over its event count and reset.
    ///
    /// Returns `None` if no sample was pushed since the last flush.
    pub fn flush(&mut self) -> Option<BucketAverage> {
        if self.is_empty() {
            return None;
        }
        let events = self.events;
        let average = BucketAverage {
            average_f1: self.f1_sum / f64::from(events),
            average_vocab_size: self.vocab_sum / u64::from(events),
            events,
            contributing: self.contributing,
        };
        *self = Self::default();
        Some(average)
    }
}

/// Reduce samples in document order into consecutive windows of `window` samples.
///
/// Each full window is keyed by the running sample count at which it closed.
/// A trailing partial window is still emitted, averaged over the samples it
/// holds, and keyed by the next nominal boundary.
pub fn reduce_windows<I>(samples: I, window: u32) -> Vec<(u32, BucketAverage)>
where
    I: IntoIterator<Item = Sample>,
{
    let window = window.max(1);
    let mut reducer = BucketReducer::new();
    let mut buckets = Vec::new();
    let mut count = 0u32;

    for sample in samples {
        reducer.push(sample);
        count += 1;
        if count % window == 0 {
            buckets.extend(reducer.flush().map(|avg| (count, avg)));
        }
    }

    if !reducer.is_empty() {
        let boundary = (count / window + 1) * window;
        buckets.extend(reducer.flush().map(|avg| (boundary, avg)));
    }

    buckets
}

/// Reduce `(ordinal, sample)` pairs into buckets closed by ordinal.
///
/// A bucket is emitted only when a sample's own ordinal is a multiple of
/// `bucket_size`; it holds every sample seen since the previous emission.
/// Boundaries that no sample carries are never emitted, and samples after
/// the last boundary are dropped.
pub fn reduce_by_ordinal<I>(samples: I, bucket_size: u32) -> BTreeMap<u32, BucketAverage>
where
    I: IntoIterator<Item = (u32, Sample)>,
{
    let bucket_size = bucket_size.max(1);
    let mut reducer = BucketReducer::new();
    let mut buckets = BTreeMap::new();

    for (ordinal, sample) in samples {
        reducer.push(sample);
        if ordinal % bucket_size == 0 {
            if let Some(avg) = reducer.flush() {
                buckets.insert(ordinal, avg);
            }
        }
    }

    if !reducer.is_empty() {
        tracing::trace!(
            pending = reducer.events(),
            "Dropping samples after last bucket boundary"
        );
    }

    buckets
}
