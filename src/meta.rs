//! Chunk meta preamble: schema and span layout, emitted once per chunk.
//!
//! The preamble follows the two count bytes and is present as soon as the
//! chunk holds a sample: schema as a signed varint, then the positive and
//! negative span lists, each a length-prefixed sequence of
//! (offset varint-signed, length varint-unsigned) pairs.

use crate::bstream::{BitReader, BitWriter};
use crate::error::Error;
use crate::histogram::Span;
use crate::varint::{read_uvarint, read_varint, write_uvarint, write_varint};

/// Upper bound on the bucket count one side of a chunk may describe. Far
/// above anything a well-formed chunk holds (the sample count itself fits
/// a u16); a parsed sum beyond it means the preamble is garbage.
pub(crate) const SPAN_BUCKET_SANITY_CAP: usize = 1 << 16;

pub(crate) fn write_chunk_meta(w: &mut BitWriter, schema: i32, pos_spans: &[Span], neg_spans: &[Span]) {
    write_varint(w, i64::from(schema));
    write_spans(w, pos_spans);
    write_spans(w, neg_spans);
}

fn write_spans(w: &mut BitWriter, spans: &[Span]) {
    write_uvarint(w, spans.len() as u64);
    for s in spans {
        write_varint(w, i64::from(s.offset));
        write_uvarint(w, u64::from(s.length));
    }
}

pub(crate) fn read_chunk_meta(r: &mut BitReader<'_>) -> Result<(i32, Vec<Span>, Vec<Span>), Error> {
    let schema = read_varint(r)?;
    let schema = i32::try_from(schema).map_err(|_| Error::Corrupt("schema out of range"))?;
    let pos_spans = read_spans(r)?;
    let neg_spans = read_spans(r)?;
    Ok((schema, pos_spans, neg_spans))
}

fn read_spans(r: &mut BitReader<'_>) -> Result<Vec<Span>, Error> {
    let num = read_uvarint(r)?;
    let mut spans = Vec::new();
    let mut total_buckets = 0usize;
    for _ in 0..num {
        let offset = read_varint(r)?;
        let offset = i32::try_from(offset).map_err(|_| Error::Corrupt("span offset out of range"))?;
        let length = read_uvarint(r)?;
        let length = u32::try_from(length).map_err(|_| Error::Corrupt("span length out of range"))?;
        total_buckets = total_buckets.saturating_add(length as usize);
        if total_buckets > SPAN_BUCKET_SANITY_CAP {
            return Err(Error::Corrupt("span lengths exceed sanity cap"));
        }
        spans.push(Span { offset, length });
    }
    Ok(spans)
}
