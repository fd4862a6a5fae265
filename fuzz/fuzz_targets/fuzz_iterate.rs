#![no_main]

use histopack::HistogramIter;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes as a chunk buffer: iteration must never panic, must
    // never yield more samples than the header claims, and must stick on
    // the first error.
    let claimed = match data {
        [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]) as usize,
        _ => 0,
    };

    let mut it = HistogramIter::new(data);
    let mut n = 0usize;
    while it.next() {
        let (_t, h) = it.at_histogram();
        assert_eq!(h.positive_buckets.len(), h.positive_spans.iter().map(|s| s.length as usize).sum::<usize>());
        assert_eq!(h.negative_buckets.len(), h.negative_spans.iter().map(|s| s.length as usize).sum::<usize>());
        n += 1;
    }
    assert!(n <= claimed, "decoded more samples than the header claims");

    if it.err().is_some() {
        // Sticky: further calls keep failing without advancing.
        let e = it.err();
        assert!(!it.next());
        assert_eq!(it.err(), e);
    }
});
