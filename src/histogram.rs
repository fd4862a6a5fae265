//! Sparse-histogram observation model.

use serde::{Deserialize, Serialize};

/// A run of `length` populated buckets, preceded by `offset` empty slots
/// relative to the end of the previous span (absolute for the first span).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub offset: i32,
    pub length: u32,
}

/// One observation of a sparse-histogram variable.
///
/// `schema` selects the log-base-2 bucket resolution: valid values are
/// `-4..=8`, the bucket with upper bound 1 is always bucket 0, and each
/// boundary is the previous one times 2^(2^-schema).
///
/// The bucket vectors hold, for each populated bucket, the difference of
/// its count to the previous populated bucket's count. The codec never
/// interprets that running-sum convention; it compresses the vectors as
/// opaque signed integers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseHistogram {
    /// Total number of observations, zero bucket included.
    pub count: u64,
    /// Observations that fell into the zero bucket.
    pub zero_count: u64,
    pub sum: f64,
    /// Width of the zero bucket. Carried for callers, but the wire format
    /// reserves no bits for it: appending a non-zero threshold is rejected.
    pub zero_threshold: f64,
    pub schema: i32,
    pub positive_spans: Vec<Span>,
    pub negative_spans: Vec<Span>,
    pub positive_buckets: Vec<i64>,
    pub negative_buckets: Vec<i64>,
}
