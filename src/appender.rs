//! Stateful encoder for sparse-histogram chunks.

use crate::chunk::{sample_count, HistogramChunk};
use crate::error::Error;
use crate::histogram::{SparseHistogram, Span};
use crate::iterator::HistogramIter;
use crate::meta::write_chunk_meta;
use crate::spans::{compare_spans, count_buckets, interject, Interjection};
use crate::varbit::write_varbit_int;
use crate::varint::{write_uvarint, write_varint};

/// Sentinel for an XOR window no sample has established yet.
pub(crate) const LEADING_UNINIT: u8 = 0xff;

/// The single live encoder for one chunk.
///
/// Holds the derived state needed to delta/DoD-code the next sample
/// against its predecessors: last scalars, last deltas, the last bucket
/// vectors with their per-index deltas, and the XOR window of the sum.
/// Bucket vectors passed in are copied, so callers may mutate their
/// histogram freely between appends.
#[derive(Debug)]
pub struct Appender<'a> {
    chunk: &'a mut HistogramChunk,

    schema: i32,
    pos_spans: Vec<Span>,
    neg_spans: Vec<Span>,

    t: i64,
    cnt: u64,
    zcnt: u64,
    t_delta: i64,
    cnt_delta: i64,
    zcnt_delta: i64,

    pos_buckets: Vec<i64>,
    neg_buckets: Vec<i64>,
    pos_buckets_delta: Vec<i64>,
    neg_buckets_delta: Vec<i64>,

    sum: f64,
    leading: u8,
    trailing: u8,
}

impl<'a> Appender<'a> {
    /// Rebuild appender state by replaying the chunk's existing bytes, so
    /// that the next append continues bit-exactly where the stream left
    /// off.
    pub(crate) fn for_chunk(chunk: &'a mut HistogramChunk) -> Result<Self, Error> {
        let mut it = HistogramIter::new(chunk.bytes());
        while it.next() {}
        if let Some(e) = it.err() {
            return Err(e);
        }
        let pos_spans = std::mem::take(&mut it.pos_spans);
        let neg_spans = std::mem::take(&mut it.neg_spans);
        let pos_buckets = std::mem::take(&mut it.pos_buckets);
        let neg_buckets = std::mem::take(&mut it.neg_buckets);
        let pos_buckets_delta = std::mem::take(&mut it.pos_buckets_delta);
        let neg_buckets_delta = std::mem::take(&mut it.neg_buckets_delta);
        let (schema, t, cnt, zcnt) = (it.schema, it.t, it.cnt, it.zcnt);
        let (t_delta, cnt_delta, zcnt_delta) = (it.t_delta, it.cnt_delta, it.zcnt_delta);
        let (sum, leading, trailing) = (it.sum, it.leading, it.trailing);
        drop(it);

        Ok(Appender {
            chunk,
            schema,
            pos_spans,
            neg_spans,
            t,
            cnt,
            zcnt,
            t_delta,
            cnt_delta,
            zcnt_delta,
            pos_buckets,
            neg_buckets,
            pos_buckets_delta,
            neg_buckets_delta,
            sum,
            // `leading` is still the sentinel when no sample established an
            // XOR window yet, so continuation stays bit-exact.
            leading,
            trailing,
        })
    }

    /// Scalar append, present for API parity with float chunks.
    ///
    /// # Errors
    /// Always `WrongAppendKind`: histogram chunks take no scalar samples.
    pub fn append(&mut self, _t: i64, _v: f64) -> Result<(), Error> {
        Err(Error::WrongAppendKind)
    }

    /// Append one observation.
    ///
    /// The histogram must be properly structured: bucket vector lengths
    /// matching its spans, schema and zero threshold identical to every
    /// earlier sample in the chunk. The populated bucket layout may only
    /// grow; when new buckets appear, all prior samples are transparently
    /// recoded to the widened layout first.
    ///
    /// # Errors
    /// `UnsupportedZeroThreshold` for a non-zero threshold,
    /// `CountOverflow` when the chunk is full, `LayoutShrunk` when the
    /// histogram drops previously populated buckets, and any decode error
    /// a recode runs into.
    pub fn append_histogram(&mut self, t: i64, h: &SparseHistogram) -> Result<(), Error> {
        if h.zero_threshold != 0.0 {
            return Err(Error::UnsupportedZeroThreshold {
                threshold: h.zero_threshold,
            });
        }
        let num = sample_count(self.chunk.bytes());
        if num == u16::MAX {
            return Err(Error::CountOverflow);
        }

        let mut t_delta = 0i64;
        let mut cnt_delta = 0i64;
        let mut zcnt_delta = 0i64;

        if num == 0 {
            // The first append dictates the chunk metadata and encodes it.
            write_chunk_meta(&mut self.chunk.b, h.schema, &h.positive_spans, &h.negative_spans);
            self.schema = h.schema;
            self.pos_spans.clone_from(&h.positive_spans);
            self.neg_spans.clone_from(&h.negative_spans);
            let num_pos = count_buckets(&h.positive_spans);
            let num_neg = count_buckets(&h.negative_spans);
            self.pos_buckets_delta.clear();
            self.pos_buckets_delta.resize(num_pos, 0);
            self.neg_buckets_delta.clear();
            self.neg_buckets_delta.resize(num_neg, 0);

            write_varint(&mut self.chunk.b, t);
            write_uvarint(&mut self.chunk.b, h.count);
            write_uvarint(&mut self.chunk.b, h.zero_count);
            self.chunk.b.write_bits(h.sum.to_bits(), 64);
            for &buck in &h.positive_buckets {
                write_varint(&mut self.chunk.b, buck);
            }
            for &buck in &h.negative_buckets {
                write_varint(&mut self.chunk.b, buck);
            }
        } else {
            debug_assert_eq!(h.schema, self.schema, "schema changed mid-chunk");
            self.widen_layout_if_needed(h)?;

            t_delta = t.wrapping_sub(self.t);
            cnt_delta = (h.count as i64).wrapping_sub(self.cnt as i64);
            zcnt_delta = (h.zero_count as i64).wrapping_sub(self.zcnt as i64);

            if num == 1 {
                // Second sample: plain deltas.
                write_varint(&mut self.chunk.b, t_delta);
                write_varint(&mut self.chunk.b, cnt_delta);
                write_varint(&mut self.chunk.b, zcnt_delta);
                self.write_sum_delta(h.sum);

                for (i, &buck) in h.positive_buckets.iter().enumerate() {
                    let delta = buck.wrapping_sub(self.pos_buckets[i]);
                    write_varint(&mut self.chunk.b, delta);
                    self.pos_buckets_delta[i] = delta;
                }
                for (i, &buck) in h.negative_buckets.iter().enumerate() {
                    let delta = buck.wrapping_sub(self.neg_buckets[i]);
                    write_varint(&mut self.chunk.b, delta);
                    self.neg_buckets_delta[i] = delta;
                }
            } else {
                // Delta-of-delta for everything but the sum.
                write_varbit_int(&mut self.chunk.b, t_delta.wrapping_sub(self.t_delta));
                write_varbit_int(&mut self.chunk.b, cnt_delta.wrapping_sub(self.cnt_delta));
                write_varbit_int(&mut self.chunk.b, zcnt_delta.wrapping_sub(self.zcnt_delta));
                self.write_sum_delta(h.sum);

                for (i, &buck) in h.positive_buckets.iter().enumerate() {
                    let delta = buck.wrapping_sub(self.pos_buckets[i]);
                    write_varbit_int(&mut self.chunk.b, delta.wrapping_sub(self.pos_buckets_delta[i]));
                    self.pos_buckets_delta[i] = delta;
                }
                for (i, &buck) in h.negative_buckets.iter().enumerate() {
                    let delta = buck.wrapping_sub(self.neg_buckets[i]);
                    write_varbit_int(&mut self.chunk.b, delta.wrapping_sub(self.neg_buckets_delta[i]));
                    self.neg_buckets_delta[i] = delta;
                }
            }
        }

        // The count is stamped after all sample bytes: a reader racing under
        // relaxed external synchronization must never see it early.
        self.chunk.b.bytes_mut()[..2].copy_from_slice(&(num + 1).to_be_bytes());

        self.t = t;
        self.cnt = h.count;
        self.zcnt = h.zero_count;
        self.t_delta = t_delta;
        self.cnt_delta = cnt_delta;
        self.zcnt_delta = zcnt_delta;
        self.pos_buckets.clone_from(&h.positive_buckets);
        self.neg_buckets.clone_from(&h.negative_buckets);
        // The bucket delta vectors were already updated in place above.
        self.sum = h.sum;

        Ok(())
    }

    /// Compare the incoming layout against the chunk's; recode when new
    /// buckets appeared, error when buckets disappeared.
    fn widen_layout_if_needed(&mut self, h: &SparseHistogram) -> Result<(), Error> {
        let pos_inter = compare_spans(&self.pos_spans, &h.positive_spans).ok_or(Error::LayoutShrunk)?;
        let neg_inter = compare_spans(&self.neg_spans, &h.negative_spans).ok_or(Error::LayoutShrunk)?;
        if pos_inter.is_empty() && neg_inter.is_empty() {
            return Ok(());
        }
        self.recode(&pos_inter, &neg_inter, &h.positive_spans, &h.negative_spans)
    }

    /// Rewrite the chunk so its layout matches the provided wider spans,
    /// preserving every prior sample bit-for-bit in the new coordinates.
    ///
    /// Builds a replacement chunk through a fresh appender and adopts its
    /// buffer at the end; nothing is edited in place. The replay cannot
    /// recurse: every re-appended histogram already carries the widened
    /// spans.
    fn recode(
        &mut self,
        pos_inter: &[Interjection],
        neg_inter: &[Interjection],
        pos_spans: &[Span],
        neg_spans: &[Span],
    ) -> Result<(), Error> {
        let mut fresh = HistogramChunk::new();
        let mut app = Appender::for_chunk(&mut fresh)?;
        let mut pos_scratch: Vec<i64> = Vec::with_capacity(count_buckets(pos_spans));
        let mut neg_scratch: Vec<i64> = Vec::with_capacity(count_buckets(neg_spans));

        let mut it = HistogramIter::new(self.chunk.bytes());
        while it.next() {
            let (t_old, mut h_old) = it.at_histogram();
            // Re-describe the old sample in the widened layout.
            h_old.positive_spans.clear();
            h_old.positive_spans.extend_from_slice(pos_spans);
            h_old.negative_spans.clear();
            h_old.negative_spans.extend_from_slice(neg_spans);
            if !pos_inter.is_empty() {
                interject(&h_old.positive_buckets, &mut pos_scratch, pos_inter);
                std::mem::swap(&mut h_old.positive_buckets, &mut pos_scratch);
            }
            if !neg_inter.is_empty() {
                interject(&h_old.negative_buckets, &mut neg_scratch, neg_inter);
                std::mem::swap(&mut h_old.negative_buckets, &mut neg_scratch);
            }
            app.append_histogram(t_old, &h_old)?;
        }
        if let Some(e) = it.err() {
            return Err(e);
        }
        drop(it);

        // Adopt the replacement buffer, spans, and bucket/delta vectors.
        // Scalar state (timestamps, counts, sum, XOR window) was unaffected
        // by the rewrite and is retained.
        self.pos_spans.clear();
        self.pos_spans.extend_from_slice(pos_spans);
        self.neg_spans.clear();
        self.neg_spans.extend_from_slice(neg_spans);
        self.pos_buckets = std::mem::take(&mut app.pos_buckets);
        self.neg_buckets = std::mem::take(&mut app.neg_buckets);
        self.pos_buckets_delta = std::mem::take(&mut app.pos_buckets_delta);
        self.neg_buckets_delta = std::mem::take(&mut app.neg_buckets_delta);
        drop(app);
        self.chunk.b = fresh.b;
        Ok(())
    }

    /// Gorilla XOR encoding of the sum against the previous one, reusing
    /// the leading/trailing window while it still covers the delta.
    fn write_sum_delta(&mut self, sum: f64) {
        let delta = sum.to_bits() ^ self.sum.to_bits();
        if delta == 0 {
            self.chunk.b.write_bit(false);
            return;
        }
        self.chunk.b.write_bit(true);

        let mut leading = delta.leading_zeros() as u8;
        let trailing = delta.trailing_zeros() as u8;
        // Clamp so the count fits the 5-bit header field.
        if leading >= 32 {
            leading = 31;
        }

        if self.leading != LEADING_UNINIT && leading >= self.leading && trailing >= self.trailing {
            self.chunk.b.write_bit(false);
            self.chunk.b.write_bits(
                delta >> self.trailing,
                u32::from(64 - self.leading - self.trailing),
            );
        } else {
            self.leading = leading;
            self.trailing = trailing;

            self.chunk.b.write_bit(true);
            self.chunk.b.write_bits(u64::from(leading), 5);
            // sigbits == 64 does not fit the 6-bit field and is stored as
            // its truncation 0, which is unambiguous: zero significant bits
            // would have taken the delta == 0 branch.
            let sigbits = 64 - leading - trailing;
            self.chunk.b.write_bits(u64::from(sigbits), 6);
            self.chunk.b.write_bits(delta >> trailing, u32::from(sigbits));
        }
    }
}
