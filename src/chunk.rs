//! Sparse-histogram chunk container.

use crate::appender::Appender;
use crate::bstream::{BitReader, BitWriter};
use crate::error::Error;
use crate::histogram::Span;
use crate::iterator::HistogramIter;
use crate::meta::read_chunk_meta;

/// Slack beyond which `compact` reallocates the backing buffer.
const CHUNK_COMPACT_CAPACITY_THRESHOLD: usize = 32;

/// Identifies a chunk's payload format to the enclosing block layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Encoding {
    /// Sparse-histogram samples.
    SparseHistogram = 2,
}

/// Sample count stored big-endian in the first two bytes of a chunk.
#[inline]
pub(crate) fn sample_count(chunk: &[u8]) -> u16 {
    match chunk {
        [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]),
        _ => 0,
    }
}

/// A self-contained, append-only buffer of sparse-histogram samples.
///
/// The first two bytes hold the big-endian sample count; the meta preamble
/// and the packed sample records follow. A chunk is mutated only through
/// the single appender it hands out; any number of iterators may read it
/// in between (the borrow rules enforce both).
#[derive(Debug, Clone)]
pub struct HistogramChunk {
    pub(crate) b: BitWriter,
}

impl HistogramChunk {
    /// A fresh, empty chunk: two zero count bytes and room to grow.
    #[must_use]
    pub fn new() -> Self {
        let mut stream = Vec::with_capacity(128);
        stream.extend_from_slice(&[0, 0]);
        HistogramChunk {
            b: BitWriter::with_buffer(stream),
        }
    }

    #[inline]
    #[must_use]
    pub fn encoding(&self) -> Encoding {
        Encoding::SparseHistogram
    }

    /// The chunk's persistent form.
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.b.bytes()
    }

    /// Number of samples appended so far.
    #[inline]
    #[must_use]
    pub fn num_samples(&self) -> usize {
        usize::from(sample_count(self.bytes()))
    }

    /// The schema and (positive, negative) span layout the chunk currently
    /// encodes.
    ///
    /// # Panics
    /// Panics when the chunk is empty; only chunks holding at least one
    /// sample carry a preamble.
    pub fn meta(&self) -> Result<(i32, Vec<Span>, Vec<Span>), Error> {
        assert!(self.num_samples() > 0, "meta() called on an empty chunk");
        let mut r = BitReader::new(&self.bytes()[2..]);
        read_chunk_meta(&mut r)
    }

    /// Drop buffer slack once it exceeds a small threshold. Idempotent;
    /// never shrinks below the current length.
    pub fn compact(&mut self) {
        if self.b.capacity() > self.b.len() + CHUNK_COMPACT_CAPACITY_THRESHOLD {
            self.b.shrink_to_fit();
        }
    }

    /// The single live appender for this chunk.
    ///
    /// Appender state is rebuilt by replaying the existing bytes through an
    /// iterator, so subsequent appends are bit-identical to what one
    /// appender writing every sample from scratch would have produced.
    /// Full replay is acceptable: chunks cap out at hundreds of samples.
    ///
    /// # Errors
    /// Fails when the existing chunk bytes do not decode.
    pub fn appender(&mut self) -> Result<Appender<'_>, Error> {
        Appender::for_chunk(self)
    }

    /// An iterator over the chunk's samples, recycling the allocations of
    /// `reuse` when one is handed back in.
    #[must_use]
    pub fn iterator<'a>(&'a self, reuse: Option<HistogramIter<'a>>) -> HistogramIter<'a> {
        match reuse {
            Some(mut it) => {
                it.reset(self.bytes());
                it
            }
            None => HistogramIter::new(self.bytes()),
        }
    }
}

impl Default for HistogramChunk {
    fn default() -> Self {
        Self::new()
    }
}
