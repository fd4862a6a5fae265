//! `histopack` - Sparse-histogram chunk codec
//!
//! A chunk is a self-contained, append-only byte buffer holding a bounded
//! sequence of sparse-histogram observations that share one schema. Each
//! observation is compressed against its predecessors: timestamps, counts
//! and bucket values go through delta and delta-of-delta coding with
//! variable-width integers, the sum through Gorilla XOR coding with a
//! reusable leading/trailing-zero window.
//!
//! # Features
//! - **Compact**: steady-state samples cost a handful of bits per field
//! - **Appendable**: new observations extend the buffer in place
//! - **Self-widening**: when a histogram populates buckets no prior sample
//!   used, the chunk recodes itself and preserves every prior sample
//! - **Read-only friendly**: iteration never writes to the source bytes,
//!   so chunks can be scanned straight out of read-only mappings
//!
//! # Example
//! ```
//! use histopack::{HistogramChunk, SparseHistogram, Span};
//!
//! let mut chunk = HistogramChunk::new();
//! let mut app = chunk.appender().unwrap();
//!
//! let mut h = SparseHistogram {
//!     count: 5,
//!     zero_count: 1,
//!     sum: 1.5,
//!     schema: 0,
//!     positive_spans: vec![Span { offset: 0, length: 1 }],
//!     positive_buckets: vec![5],
//!     ..Default::default()
//! };
//! app.append_histogram(100, &h).unwrap();
//!
//! h.count = 9;
//! h.positive_buckets[0] = 9;
//! app.append_histogram(200, &h).unwrap();
//!
//! let mut it = chunk.iterator(None);
//! while it.next() {
//!     let (t, h) = it.at_histogram();
//!     println!("t={t} count={} sum={}", h.count, h.sum);
//! }
//! assert!(it.err().is_none());
//! assert_eq!(chunk.num_samples(), 2);
//! ```
//!
//! # Wire format
//!
//! ## Header (2 bytes)
//! Big-endian `u16` sample count, stamped as the final act of every
//! append.
//!
//! ## Meta preamble (present once a sample exists)
//! Schema as a signed varint, then the positive and negative span lists:
//! span count, then per span `(offset varint-signed, length
//! varint-unsigned)`.
//!
//! ## Samples
//! | field        | ts     | count  | zero count | sum | pos buckets | neg buckets |
//! |--------------|--------|--------|------------|-----|-------------|-------------|
//! | sample 1     | varint | varint | varint     | raw 64 bits | varint each | varint each |
//! | sample 2     | delta  | delta  | delta      | xor | delta each  | delta each  |
//! | sample 3+    | dod    | dod    | dod        | xor | dod each    | dod each    |
//!
//! Deltas in sample 2 are varints; delta-of-deltas from sample 3 on use
//! the variable-bit-width classes of the engine's scalar chunks. Varints
//! stay byte-wise but not byte-aligned: XOR and DoD fields leave the
//! stream mid-byte and decoding continues from the bit cursor.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

mod appender;
mod bstream;
mod chunk;
mod error;
mod histogram;
mod iterator;
mod meta;
mod spans;
mod varbit;
mod varint;

pub use appender::Appender;
pub use chunk::{Encoding, HistogramChunk};
pub use error::Error;
pub use histogram::{SparseHistogram, Span};
pub use iterator::HistogramIter;

#[cfg(test)]
mod tests;
