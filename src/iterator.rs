//! Forward-only decoder for sparse-histogram chunks.

use crate::appender::LEADING_UNINIT;
use crate::bstream::BitReader;
use crate::chunk::{sample_count, Encoding};
use crate::error::Error;
use crate::histogram::{SparseHistogram, Span};
use crate::meta::read_chunk_meta;
use crate::spans::count_buckets;
use crate::varbit::read_varbit_int;
use crate::varint::{read_uvarint, read_varint};

/// Stateful decoder that reconstructs each observation in append order.
///
/// Scans are forward-only; to re-read a chunk, start over with a fresh
/// iterator or `reset`. Errors are sticky: after the first failure `next`
/// keeps returning `false` and `err` reports what went wrong.
#[derive(Debug)]
pub struct HistogramIter<'a> {
    br: BitReader<'a>,
    num_total: u16,
    num_read: u16,

    pub(crate) schema: i32,
    pub(crate) pos_spans: Vec<Span>,
    pub(crate) neg_spans: Vec<Span>,

    pub(crate) t: i64,
    pub(crate) cnt: u64,
    pub(crate) zcnt: u64,
    pub(crate) t_delta: i64,
    pub(crate) cnt_delta: i64,
    pub(crate) zcnt_delta: i64,

    pub(crate) pos_buckets: Vec<i64>,
    pub(crate) neg_buckets: Vec<i64>,
    pub(crate) pos_buckets_delta: Vec<i64>,
    pub(crate) neg_buckets_delta: Vec<i64>,

    pub(crate) sum: f64,
    pub(crate) leading: u8,
    pub(crate) trailing: u8,

    err: Option<Error>,
}

impl<'a> HistogramIter<'a> {
    /// Decode `chunk`, a complete chunk buffer including the count header.
    #[must_use]
    pub fn new(chunk: &'a [u8]) -> Self {
        HistogramIter {
            br: BitReader::new(chunk.get(2..).unwrap_or_default()),
            num_total: sample_count(chunk),
            num_read: 0,
            schema: 0,
            pos_spans: Vec::new(),
            neg_spans: Vec::new(),
            t: 0,
            cnt: 0,
            zcnt: 0,
            t_delta: 0,
            cnt_delta: 0,
            zcnt_delta: 0,
            pos_buckets: Vec::new(),
            neg_buckets: Vec::new(),
            pos_buckets_delta: Vec::new(),
            neg_buckets_delta: Vec::new(),
            sum: 0.0,
            leading: LEADING_UNINIT,
            trailing: 0,
            err: None,
        }
    }

    /// Re-point the iterator at another chunk, zeroing all accumulator
    /// state. Bucket-vector capacity is kept, so iterating many chunks of
    /// the same shape does not reallocate.
    pub fn reset(&mut self, chunk: &'a [u8]) {
        self.br = BitReader::new(chunk.get(2..).unwrap_or_default());
        self.num_total = sample_count(chunk);
        self.num_read = 0;
        self.schema = 0;
        self.pos_spans.clear();
        self.neg_spans.clear();
        self.t = 0;
        self.cnt = 0;
        self.zcnt = 0;
        self.t_delta = 0;
        self.cnt_delta = 0;
        self.zcnt_delta = 0;
        self.pos_buckets.clear();
        self.neg_buckets.clear();
        self.pos_buckets_delta.clear();
        self.neg_buckets_delta.clear();
        self.sum = 0.0;
        self.leading = LEADING_UNINIT;
        self.trailing = 0;
        self.err = None;
    }

    /// Advance to the next sample. Returns `false` at the end of the chunk
    /// or on the first error.
    pub fn next(&mut self) -> bool {
        if self.err.is_some() || self.num_read == self.num_total {
            return false;
        }
        let res = match self.num_read {
            0 => self.read_first(),
            1 => self.read_second(),
            _ => self.read_dod(),
        };
        match res {
            Ok(()) => {
                self.num_read += 1;
                true
            }
            Err(e) => {
                self.err = Some(e);
                false
            }
        }
    }

    /// Advance until the current timestamp is at least `t`. Returns `false`
    /// when the chunk is exhausted first.
    pub fn seek(&mut self, t: i64) -> bool {
        if self.err.is_some() {
            return false;
        }
        while t > self.t || self.num_read == 0 {
            if !self.next() {
                return false;
            }
        }
        true
    }

    /// The current sample. Valid after `next` returned `true`; the vectors
    /// are copied out of the iterator state.
    #[must_use]
    pub fn at_histogram(&self) -> (i64, SparseHistogram) {
        (
            self.t,
            SparseHistogram {
                count: self.cnt,
                zero_count: self.zcnt,
                sum: self.sum,
                zero_threshold: 0.0,
                schema: self.schema,
                positive_spans: self.pos_spans.clone(),
                negative_spans: self.neg_spans.clone(),
                positive_buckets: self.pos_buckets.clone(),
                negative_buckets: self.neg_buckets.clone(),
            },
        )
    }

    /// Scalar accessor, present for API parity with float chunks.
    ///
    /// # Panics
    /// Always: histogram chunks carry no scalar samples.
    pub fn at(&self) -> (i64, f64) {
        panic!("scalar at() called on a histogram iterator");
    }

    /// The error that stopped iteration, if any.
    #[inline]
    #[must_use]
    pub fn err(&self) -> Option<Error> {
        self.err
    }

    #[inline]
    #[must_use]
    pub fn chunk_encoding(&self) -> Encoding {
        Encoding::SparseHistogram
    }

    /// First record: meta preamble, then raw scalars and varint buckets.
    fn read_first(&mut self) -> Result<(), Error> {
        let (schema, pos_spans, neg_spans) = read_chunk_meta(&mut self.br)?;
        let num_pos = count_buckets(&pos_spans);
        let num_neg = count_buckets(&neg_spans);
        self.schema = schema;
        self.pos_spans = pos_spans;
        self.neg_spans = neg_spans;
        self.pos_buckets.clear();
        self.pos_buckets.resize(num_pos, 0);
        self.neg_buckets.clear();
        self.neg_buckets.resize(num_neg, 0);
        self.pos_buckets_delta.clear();
        self.pos_buckets_delta.resize(num_pos, 0);
        self.neg_buckets_delta.clear();
        self.neg_buckets_delta.resize(num_neg, 0);

        self.t = read_varint(&mut self.br)?;
        self.cnt = read_uvarint(&mut self.br)?;
        self.zcnt = read_uvarint(&mut self.br)?;
        self.sum = f64::from_bits(self.br.read_bits(64)?);
        for i in 0..num_pos {
            self.pos_buckets[i] = read_varint(&mut self.br)?;
        }
        for i in 0..num_neg {
            self.neg_buckets[i] = read_varint(&mut self.br)?;
        }
        Ok(())
    }

    /// Second record: varint deltas everywhere, XOR-coded sum.
    fn read_second(&mut self) -> Result<(), Error> {
        self.t_delta = read_varint(&mut self.br)?;
        self.t = self.t.wrapping_add(self.t_delta);

        self.cnt_delta = read_varint(&mut self.br)?;
        self.cnt = (self.cnt as i64).wrapping_add(self.cnt_delta) as u64;

        self.zcnt_delta = read_varint(&mut self.br)?;
        self.zcnt = (self.zcnt as i64).wrapping_add(self.zcnt_delta) as u64;

        self.read_sum()?;

        for i in 0..self.pos_buckets.len() {
            let delta = read_varint(&mut self.br)?;
            self.pos_buckets_delta[i] = delta;
            self.pos_buckets[i] = self.pos_buckets[i].wrapping_add(delta);
        }
        for i in 0..self.neg_buckets.len() {
            let delta = read_varint(&mut self.br)?;
            self.neg_buckets_delta[i] = delta;
            self.neg_buckets[i] = self.neg_buckets[i].wrapping_add(delta);
        }
        Ok(())
    }

    /// Third record onwards: varbit DoDs, accumulated DoD -> delta -> value.
    fn read_dod(&mut self) -> Result<(), Error> {
        let t_dod = read_varbit_int(&mut self.br)?;
        self.t_delta = self.t_delta.wrapping_add(t_dod);
        self.t = self.t.wrapping_add(self.t_delta);

        let cnt_dod = read_varbit_int(&mut self.br)?;
        self.cnt_delta = self.cnt_delta.wrapping_add(cnt_dod);
        self.cnt = (self.cnt as i64).wrapping_add(self.cnt_delta) as u64;

        let zcnt_dod = read_varbit_int(&mut self.br)?;
        self.zcnt_delta = self.zcnt_delta.wrapping_add(zcnt_dod);
        self.zcnt = (self.zcnt as i64).wrapping_add(self.zcnt_delta) as u64;

        self.read_sum()?;

        for i in 0..self.pos_buckets.len() {
            let dod = read_varbit_int(&mut self.br)?;
            self.pos_buckets_delta[i] = self.pos_buckets_delta[i].wrapping_add(dod);
            self.pos_buckets[i] = self.pos_buckets[i].wrapping_add(self.pos_buckets_delta[i]);
        }
        for i in 0..self.neg_buckets.len() {
            let dod = read_varbit_int(&mut self.br)?;
            self.neg_buckets_delta[i] = self.neg_buckets_delta[i].wrapping_add(dod);
            self.neg_buckets[i] = self.neg_buckets[i].wrapping_add(self.neg_buckets_delta[i]);
        }
        Ok(())
    }

    fn read_sum(&mut self) -> Result<(), Error> {
        if !self.br.read_bit()? {
            // XOR delta of zero: the sum repeats.
            return Ok(());
        }
        if self.br.read_bit()? {
            // New leading/trailing window.
            let leading = self.br.read_bits(5)? as u8;
            let mut sigbits = self.br.read_bits(6)? as u8;
            // A stored 0 means 64: zero significant bits would have taken
            // the zero-delta branch instead.
            if sigbits == 0 {
                sigbits = 64;
            }
            if leading + sigbits > 64 {
                return Err(Error::Corrupt("xor window wider than 64 bits"));
            }
            self.leading = leading;
            self.trailing = 64 - leading - sigbits;
        }
        // A reuse header before any window was established only occurs in
        // corrupt streams; decode it as a full-width window.
        let (leading, trailing) = if self.leading == LEADING_UNINIT {
            (0, 0)
        } else {
            (self.leading, self.trailing)
        };
        let mbits = 64 - leading - trailing;
        let bits = self.br.read_bits(mbits)?;
        self.sum = f64::from_bits(self.sum.to_bits() ^ (bits << trailing));
        Ok(())
    }
}
