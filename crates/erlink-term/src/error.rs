//! Error types for term construction and the wire codec.

use std::fmt;
use thiserror::Error;

/// Errors produced by term construction, matching and the codec.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TermError {
    /// The byte stream could not be decoded.
    #[error("decode failed at byte {offset}: {reason}")]
    Decode {
        /// Offset into the input where decoding failed.
        offset: usize,
        /// What went wrong.
        reason: DecodeReason,
    },

    /// The term could not be encoded.
    #[error("encode failed: {0}")]
    Encode(String),

    /// A length or range violation on term construction.
    #[error("{0}")]
    BadArgument(String),

    /// Attempt to add elements to an already sealed term.
    #[error("term is already sealed")]
    AlreadyInitialized,

    /// Attempt to seal or use a term that is not fully built.
    #[error("term is not fully initialized")]
    InvalidTerm,

    /// Substitution hit a variable with no binding.
    #[error("variable '{0}' is unbound")]
    VariableUnbound(String),
}

/// Detail for a [`TermError::Decode`] failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeReason {
    /// A type tag the decoder does not understand.
    UnknownTag(u8),
    /// The input ended before the term was complete.
    ShortBuffer,
    /// An arity, length or id count outside its permitted range.
    CountOutOfRange(u32),
    /// A big-integer magnitude that does not fit in 64 bits.
    IntegerOverflow(u32),
    /// The text form of a float did not parse.
    BadFloatText,
    /// An atom name that is not valid UTF-8.
    InvalidUtf8,
    /// A node-name field where an atom tag was expected.
    NodeNotAtom(u8),
}

impl fmt::Display for DecodeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeReason::UnknownTag(tag) => write!(f, "unknown type tag {}", tag),
            DecodeReason::ShortBuffer => write!(f, "input exhausted"),
            DecodeReason::CountOutOfRange(n) => write!(f, "count {} out of range", n),
            DecodeReason::IntegerOverflow(n) => {
                write!(f, "integer of {} bytes exceeds 64 bits", n)
            }
            DecodeReason::BadFloatText => write!(f, "malformed float text"),
            DecodeReason::InvalidUtf8 => write!(f, "atom name is not valid UTF-8"),
            DecodeReason::NodeNotAtom(tag) => {
                write!(f, "expected atom for node name, found tag {}", tag)
            }
        }
    }
}
