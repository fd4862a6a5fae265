use proptest::prelude::*;

use crate::spans::{compare_spans, count_buckets, interject};
use crate::{HistogramChunk, SparseHistogram, Span};

const BASE_T: i64 = 1_000_000;

/// Per-sample raw material: timestamp step and the scalar/bucket values.
type RawSample = (i64, u64, u64, f64, Vec<i64>, Vec<i64>);

#[derive(Debug, Clone)]
struct ChunkInput {
    schema: i32,
    pos_spans: Vec<Span>,
    neg_spans: Vec<Span>,
    samples: Vec<RawSample>,
}

fn arb_spans(max_spans: usize) -> impl Strategy<Value = Vec<Span>> {
    prop::collection::vec((0i32..5, 1u32..4), 0..max_spans)
        .prop_map(|raw| raw.into_iter().map(|(offset, length)| Span { offset, length }).collect())
}

fn arb_samples(num_pos: usize, num_neg: usize) -> impl Strategy<Value = Vec<RawSample>> {
    prop::collection::vec(
        (
            1i64..3600,
            0u64..1_000_000,
            0u64..100_000,
            -1.0e12f64..1.0e12,
            prop::collection::vec(-100_000i64..100_000, num_pos),
            prop::collection::vec(-100_000i64..100_000, num_neg),
        ),
        1..25,
    )
}

prop_compose! {
    fn arb_chunk_input()(
        schema in -4i32..=8,
        pos_spans in arb_spans(4),
        neg_spans in arb_spans(3),
    )(
        samples in arb_samples(count_buckets(&pos_spans), count_buckets(&neg_spans)),
        schema in Just(schema),
        pos_spans in Just(pos_spans),
        neg_spans in Just(neg_spans),
    ) -> ChunkInput {
        ChunkInput { schema, pos_spans, neg_spans, samples }
    }
}

/// Materialize the raw samples into appendable observations.
fn to_histograms(input: &ChunkInput) -> Vec<(i64, SparseHistogram)> {
    let mut t = BASE_T;
    input
        .samples
        .iter()
        .map(|(step, count, zero_count, sum, pos_buckets, neg_buckets)| {
            t += step;
            let h = SparseHistogram {
                count: *count,
                zero_count: *zero_count,
                sum: *sum,
                zero_threshold: 0.0,
                schema: input.schema,
                positive_spans: input.pos_spans.clone(),
                negative_spans: input.neg_spans.clone(),
                positive_buckets: pos_buckets.clone(),
                negative_buckets: neg_buckets.clone(),
            };
            (t, h)
        })
        .collect()
}

fn build_chunk(samples: &[(i64, SparseHistogram)]) -> HistogramChunk {
    let mut chunk = HistogramChunk::new();
    let mut app = chunk.appender().unwrap();
    for (t, h) in samples {
        app.append_histogram(*t, h).unwrap();
    }
    drop(app);
    chunk
}

fn drain(chunk: &HistogramChunk) -> Vec<(i64, SparseHistogram)> {
    let mut it = chunk.iterator(None);
    let mut out = Vec::new();
    while it.next() {
        out.push(it.at_histogram());
    }
    assert_eq!(it.err(), None);
    out
}

proptest! {
    /// Iterating a chunk yields exactly the appended samples, sums
    /// bit-for-bit.
    #[test]
    fn prop_roundtrip(input in arb_chunk_input()) {
        let samples = to_histograms(&input);
        let chunk = build_chunk(&samples);
        let got = drain(&chunk);

        prop_assert_eq!(got.len(), samples.len());
        for ((t_got, h_got), (t_want, h_want)) in got.iter().zip(samples.iter()) {
            prop_assert_eq!(t_got, t_want);
            prop_assert_eq!(h_got.sum.to_bits(), h_want.sum.to_bits());
            prop_assert_eq!(&h_got.count, &h_want.count);
            prop_assert_eq!(&h_got.zero_count, &h_want.zero_count);
            prop_assert_eq!(&h_got.schema, &h_want.schema);
            prop_assert_eq!(&h_got.positive_spans, &h_want.positive_spans);
            prop_assert_eq!(&h_got.negative_spans, &h_want.negative_spans);
            prop_assert_eq!(&h_got.positive_buckets, &h_want.positive_buckets);
            prop_assert_eq!(&h_got.negative_buckets, &h_want.negative_buckets);
        }
    }

    /// The sample count header tracks the number of appends.
    #[test]
    fn prop_num_samples(input in arb_chunk_input()) {
        let samples = to_histograms(&input);
        let chunk = build_chunk(&samples);
        prop_assert_eq!(chunk.num_samples(), samples.len());
    }

    /// Dropping the appender mid-sequence and rehydrating a new one from
    /// the chunk produces the exact bytes a single appender would have.
    #[test]
    fn prop_rehydration_is_bit_identical(
        input in arb_chunk_input(),
        split in any::<prop::sample::Index>(),
    ) {
        let samples = to_histograms(&input);
        let reference = build_chunk(&samples);

        let split = split.index(samples.len() + 1);
        let mut chunk = HistogramChunk::new();
        let mut app = chunk.appender().unwrap();
        for (t, h) in &samples[..split] {
            app.append_histogram(*t, h).unwrap();
        }
        drop(app);
        let mut app = chunk.appender().unwrap();
        for (t, h) in &samples[split..] {
            app.append_histogram(*t, h).unwrap();
        }
        drop(app);

        prop_assert_eq!(chunk.bytes(), reference.bytes());
    }

    /// Compacting never changes what the chunk stores.
    #[test]
    fn prop_compact_preserves_samples(input in arb_chunk_input()) {
        let samples = to_histograms(&input);
        let mut chunk = build_chunk(&samples);
        let before = drain(&chunk);
        chunk.compact();
        chunk.compact();
        prop_assert_eq!(drain(&chunk), before);
    }

    /// Iteration over truncated bytes never panics and never yields more
    /// samples than the intact chunk holds.
    #[test]
    fn prop_truncation_never_panics(
        input in arb_chunk_input(),
        cut in any::<prop::sample::Index>(),
    ) {
        let samples = to_histograms(&input);
        let chunk = build_chunk(&samples);
        let bytes = chunk.bytes();
        let cut = cut.index(bytes.len());

        let mut it = crate::HistogramIter::new(&bytes[..cut]);
        let mut n = 0usize;
        while it.next() {
            n += 1;
        }
        prop_assert!(n <= samples.len());
        prop_assert!(!it.next());
    }

    /// Seek lands on the first sample at or after the target.
    #[test]
    fn prop_seek_is_lower_bound(
        input in arb_chunk_input(),
        pick in any::<prop::sample::Index>(),
        jitter in -1i64..=1,
    ) {
        let samples = to_histograms(&input);
        let chunk = build_chunk(&samples);
        let target = samples[pick.index(samples.len())].0 + jitter;

        let mut it = chunk.iterator(None);
        let found = it.seek(target);
        let expect = samples.iter().find(|(t, _)| *t >= target);
        match expect {
            Some((t, _)) => {
                prop_assert!(found);
                prop_assert_eq!(it.at_histogram().0, *t);
            }
            None => prop_assert!(!found),
        }
    }
}

/// A populated-bucket index set and a superset of it, as span layouts.
fn arb_layout_growth() -> impl Strategy<Value = (Vec<Span>, Vec<Span>)> {
    prop::collection::btree_set(0i64..40, 1..10)
        .prop_flat_map(|set| {
            let indices: Vec<i64> = set.into_iter().collect();
            let len = indices.len();
            (Just(indices), prop::collection::vec(any::<bool>(), len))
        })
        .prop_map(|(indices, keep)| {
            let old: Vec<i64> = indices
                .iter()
                .zip(&keep)
                .filter(|(_, &k)| k)
                .map(|(&i, _)| i)
                .collect();
            (spans_from_indices(&old), spans_from_indices(&indices))
        })
}

fn spans_from_indices(indices: &[i64]) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut prev_end = 0i64;
    let mut i = 0;
    while i < indices.len() {
        let start = indices[i];
        let mut len = 1usize;
        while i + len < indices.len() && indices[i + len] == start + len as i64 {
            len += 1;
        }
        spans.push(Span {
            offset: (start - prev_end) as i32,
            length: len as u32,
        });
        prev_end = start + len as i64;
        i += len;
    }
    spans
}

prop_compose! {
    fn arb_growth_input()(
        layouts in arb_layout_growth(),
    )(
        narrow_samples in arb_samples(count_buckets(&layouts.0), 0),
        wide_samples in arb_samples(count_buckets(&layouts.1), 0),
        layouts in Just(layouts),
    ) -> (Vec<Span>, Vec<Span>, Vec<RawSample>, Vec<RawSample>) {
        (layouts.0, layouts.1, narrow_samples, wide_samples)
    }
}

proptest! {
    /// Appending narrow-layout samples and then wide-layout ones leaves
    /// the same chunk as appending the pre-widened narrow samples and the
    /// wide ones into a fresh chunk.
    #[test]
    fn prop_recode_equals_fresh_encode(
        (old_spans, new_spans, narrow, wide) in arb_growth_input(),
    ) {
        let narrow_input = ChunkInput {
            schema: 0,
            pos_spans: old_spans.clone(),
            neg_spans: Vec::new(),
            samples: narrow,
        };
        let narrow_samples = to_histograms(&narrow_input);
        let last_t = narrow_samples.last().map_or(BASE_T, |(t, _)| *t);
        let wide_input = ChunkInput {
            schema: 0,
            pos_spans: new_spans.clone(),
            neg_spans: Vec::new(),
            samples: wide,
        };
        let wide_samples: Vec<_> = to_histograms(&wide_input)
            .into_iter()
            .map(|(t, h)| (t - BASE_T + last_t, h))
            .collect();

        let mut recoded = HistogramChunk::new();
        let mut app = recoded.appender().unwrap();
        for (t, h) in narrow_samples.iter().chain(wide_samples.iter()) {
            app.append_histogram(*t, h).unwrap();
        }
        drop(app);

        let interjections = compare_spans(&old_spans, &new_spans).unwrap();
        let mut scratch = Vec::new();
        let widened: Vec<_> = narrow_samples
            .iter()
            .map(|(t, h)| {
                let mut h = h.clone();
                h.positive_spans = new_spans.clone();
                interject(&h.positive_buckets, &mut scratch, &interjections);
                h.positive_buckets = scratch.clone();
                (*t, h)
            })
            .collect();

        let mut fresh = HistogramChunk::new();
        let mut app = fresh.appender().unwrap();
        for (t, h) in widened.iter().chain(wide_samples.iter()) {
            app.append_histogram(*t, h).unwrap();
        }
        drop(app);

        prop_assert_eq!(recoded.bytes(), fresh.bytes());
    }
}
