//! Layout algebra for sparse-histogram spans.
//!
//! Two span lists over the same schema describe two sets of populated
//! bucket indices. A chunk can only ever widen its layout: when a new
//! histogram populates extra buckets, the comparison below yields the
//! positions at which zero buckets must be spliced into the old vectors.

use crate::histogram::Span;

/// Instruction to splice `num` zero buckets in front of position `pos` of
/// an old bucket vector. Positions count in bucket-vector coordinates;
/// `pos` equal to the vector length appends at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Interjection {
    pub pos: usize,
    pub num: usize,
}

/// Total number of populated buckets the spans describe.
#[inline]
pub(crate) fn count_buckets(spans: &[Span]) -> usize {
    spans.iter().map(|s| s.length as usize).sum()
}

/// Absolute indices of the populated buckets, in ascending order.
fn bucket_indices(spans: &[Span]) -> impl Iterator<Item = i64> + '_ {
    spans
        .iter()
        .scan(0i64, |prev_end, s| {
            let start = *prev_end + i64::from(s.offset);
            *prev_end = start + i64::from(s.length);
            Some(start..*prev_end)
        })
        .flatten()
}

/// Compare an old layout against that of a newly arriving histogram.
///
/// Returns the interjections that widen old bucket vectors to the new
/// layout (empty when the layouts are identical), or `None` when the new
/// layout misses an index the old one populates, in which case the chunk
/// cannot continue and the caller must roll over to a fresh one.
pub(crate) fn compare_spans(old: &[Span], new: &[Span]) -> Option<Vec<Interjection>> {
    let mut interjections = Vec::new();
    // Accumulates a streak of new-only buckets until the next match ends it.
    let mut inter = Interjection { pos: 0, num: 0 };

    let mut old_it = bucket_indices(old);
    let mut new_it = bucket_indices(new);
    let mut ov = old_it.next();
    let mut nv = new_it.next();
    loop {
        match (ov, nv) {
            (Some(o), Some(n)) => {
                if o == n {
                    if inter.num > 0 {
                        interjections.push(inter);
                        inter.num = 0;
                    }
                    ov = old_it.next();
                    nv = new_it.next();
                    inter.pos += 1;
                } else if o < n {
                    // The new layout dropped an old bucket.
                    return None;
                } else {
                    inter.num += 1;
                    nv = new_it.next();
                }
            }
            (Some(_), None) => return None,
            (None, Some(_)) => {
                inter.num += 1;
                nv = new_it.next();
            }
            (None, None) => {
                if inter.num > 0 {
                    interjections.push(inter);
                }
                return Some(interjections);
            }
        }
    }
}

/// Widen `old` into `scratch` by splicing runs of zeros at the
/// interjection positions. `scratch` is cleared first and is meant to be
/// reused across samples.
pub(crate) fn interject(old: &[i64], scratch: &mut Vec<i64>, interjections: &[Interjection]) {
    scratch.clear();
    let mut next = 0;
    for (i, &v) in old.iter().enumerate() {
        if next < interjections.len() && interjections[next].pos == i {
            scratch.extend(std::iter::repeat(0).take(interjections[next].num));
            next += 1;
        }
        scratch.push(v);
    }
    if next < interjections.len() {
        debug_assert_eq!(interjections[next].pos, old.len());
        scratch.extend(std::iter::repeat(0).take(interjections[next].num));
        next += 1;
    }
    debug_assert_eq!(next, interjections.len(), "unprocessed interjections left");
}
