//! Error types for chunk encoding and decoding.

use std::fmt;

/// Error raised by the chunk codec.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// The bitstream ended in the middle of a field.
    UnexpectedEof,
    /// The stream holds a value no conformant encoder produces.
    Corrupt(&'static str),
    /// The incoming histogram drops buckets that earlier samples populate;
    /// the chunk cannot be widened and the caller must start a new one.
    LayoutShrunk,
    /// The scalar `append` was called on a histogram appender.
    WrongAppendKind,
    /// The histogram carries a zero-bucket threshold the wire format
    /// reserves no bits for yet.
    UnsupportedZeroThreshold { threshold: f64 },
    /// The chunk already holds the maximum number of samples (65535).
    CountOverflow,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => write!(f, "unexpected end of chunk data"),
            Self::Corrupt(what) => write!(f, "corrupt chunk: {what}"),
            Self::LayoutShrunk => {
                write!(f, "histogram drops previously populated buckets, a new chunk is required")
            }
            Self::WrongAppendKind => write!(f, "scalar append on a histogram chunk"),
            Self::UnsupportedZeroThreshold { threshold } => {
                write!(f, "zero-bucket threshold {threshold} cannot be encoded (must be 0)")
            }
            Self::CountOverflow => write!(f, "too many samples in chunk, max is 65535"),
        }
    }
}

impl std::error::Error for Error {}
