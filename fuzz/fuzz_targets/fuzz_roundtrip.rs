#![no_main]

use histopack::{HistogramChunk, SparseHistogram, Span};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First two bytes pick the bucket layout, the rest is interpreted as a
    // stream of samples. Everything appended must come back bit-for-bit.
    if data.len() < 2 {
        return;
    }
    let num_pos = (data[0] % 8) as usize;
    let num_neg = (data[1] % 4) as usize;
    let sample_len = 2 + 1 + 1 + 8 + num_pos + num_neg;

    let positive_spans = if num_pos > 0 {
        vec![Span { offset: 0, length: num_pos as u32 }]
    } else {
        Vec::new()
    };
    let negative_spans = if num_neg > 0 {
        vec![Span { offset: 1, length: num_neg as u32 }]
    } else {
        Vec::new()
    };

    let mut samples = Vec::new();
    let mut t = 0i64;
    for raw in data[2..].chunks_exact(sample_len) {
        t += i64::from(u16::from_le_bytes([raw[0], raw[1]])) + 1;
        let mut sum_bits = [0u8; 8];
        sum_bits.copy_from_slice(&raw[4..12]);
        let h = SparseHistogram {
            count: u64::from(raw[2]),
            zero_count: u64::from(raw[3]),
            sum: f64::from_bits(u64::from_le_bytes(sum_bits)),
            schema: 3,
            positive_spans: positive_spans.clone(),
            negative_spans: negative_spans.clone(),
            positive_buckets: raw[12..12 + num_pos].iter().map(|&b| i64::from(b as i8)).collect(),
            negative_buckets: raw[12 + num_pos..].iter().map(|&b| i64::from(b as i8)).collect(),
            ..Default::default()
        };
        samples.push((t, h));
    }
    if samples.len() > 300 {
        samples.truncate(300);
    }

    let mut chunk = HistogramChunk::new();
    let mut app = chunk.appender().unwrap();
    for (t, h) in &samples {
        app.append_histogram(*t, h).unwrap();
    }
    drop(app);
    assert_eq!(chunk.num_samples(), samples.len());

    let mut it = chunk.iterator(None);
    for (want_t, want_h) in &samples {
        assert!(it.next());
        let (got_t, got_h) = it.at_histogram();
        assert_eq!(got_t, *want_t);
        assert_eq!(got_h.count, want_h.count);
        assert_eq!(got_h.zero_count, want_h.zero_count);
        assert_eq!(got_h.sum.to_bits(), want_h.sum.to_bits());
        assert_eq!(got_h.positive_buckets, want_h.positive_buckets);
        assert_eq!(got_h.negative_buckets, want_h.negative_buckets);
    }
    assert!(!it.next());
    assert_eq!(it.err(), None);
});
