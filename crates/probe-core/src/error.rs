//! Error types shared across the crate.

use std::fmt;
use std::io;

use num_bigint::BigInt;
use thiserror::Error;

/// A pickle byte sequence the opcode decoder refused.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("pickle exhausted before seeing STOP")]
    Exhausted,

    #[error("at position {pos}, opcode {code:#04x} unknown")]
    UnknownOpcode { pos: u64, code: u8 },

    #[error("at position {pos}, bad {opcode} argument: {reason}")]
    BadArgument {
        pos: u64,
        opcode: &'static str,
        reason: String,
    },

    #[error("I/O error while decoding: {0}")]
    Io(#[from] io::Error),
}

/// An extracted magic number that did not match the expected one.
///
/// Never produced by the extractor itself; callers build it after comparing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidMagicError {
    pub provided: Option<BigInt>,
    pub expected: BigInt,
    pub file: String,
}

impl fmt::Display for InvalidMagicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.provided {
            Some(provided) => write!(f, "{}: {} != {}", self.file, provided, self.expected),
            None => write!(f, "{}: None != {}", self.file, self.expected),
        }
    }
}

impl std::error::Error for InvalidMagicError {}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed pickle stream: {0}")]
    Decode(#[from] DecodeError),

    #[error("invalid magic number: {0}")]
    InvalidMagic(#[from] InvalidMagicError),
}

/// A gzip payload inflated past its configured limit.
///
/// Raised from inside `Read`/`Seek`, so it travels wrapped in an
/// [`io::Error`] of kind `InvalidData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("decompressed stream exceeds {limit} bytes")]
pub struct InflateLimitExceeded {
    pub limit: u64,
}

impl InflateLimitExceeded {
    /// The limit error carried by `err`, if that is what it wraps.
    pub fn find(err: &io::Error) -> Option<&Self> {
        err.get_ref()?.downcast_ref()
    }
}

impl From<InflateLimitExceeded> for io::Error {
    fn from(err: InflateLimitExceeded) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_magic_renders_both_values() {
        let err = InvalidMagicError {
            provided: Some(BigInt::from(7)),
            expected: BigInt::from(42),
            file: "model.pt".into(),
        };
        assert_eq!(err.to_string(), "model.pt: 7 != 42");
    }

    #[test]
    fn invalid_magic_renders_missing_value() {
        let err = InvalidMagicError {
            provided: None,
            expected: BigInt::from(42),
            file: "weights.bin".into(),
        };
        assert_eq!(err.to_string(), "weights.bin: None != 42");
    }

    #[test]
    fn decode_error_mentions_position() {
        let err = DecodeError::UnknownOpcode { pos: 3, code: 0xff };
        assert_eq!(err.to_string(), "at position 3, opcode 0xff unknown");
    }

    #[test]
    fn probe_error_wraps_invalid_magic() {
        let err: ProbeError = InvalidMagicError {
            provided: None,
            expected: BigInt::from(1),
            file: "f".into(),
        }
        .into();
        assert!(matches!(err, ProbeError::InvalidMagic(_)));
        assert_eq!(err.to_string(), "invalid magic number: f: None != 1");
    }

    #[test]
    fn inflate_limit_survives_io_wrapping() {
        let err: io::Error = InflateLimitExceeded { limit: 16 }.into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(InflateLimitExceeded::find(&err), Some(&InflateLimitExceeded { limit: 16 }));
        assert_eq!(err.to_string(), "decompressed stream exceeds 16 bytes");

        let other = io::Error::new(io::ErrorKind::InvalidData, "corrupt deflate stream");
        assert_eq!(InflateLimitExceeded::find(&other), None);
    }
}
