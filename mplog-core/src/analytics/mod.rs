//! Analytics module for mplog
//!
//! Reduces sequences of accuracy snapshots into bucket averages:
//! - Coarse time buckets over the chronological snapshot stream
//! - Ordinal-aligned buckets over the named evaluation series
//!
//! See [`buckets`] for the shared reducer.

pub mod buckets;

pub use buckets::{reduce_by_ordinal, reduce_windows, BucketReducer, Sample};
