//! Magic-number extraction for the legacy pickle layout.
//!
//! A legacy model file starts with a pickled integer that identifies the
//! format. It is stored as an ordinary opcode-encoded literal rather than
//! at a fixed offset, so it is found by walking opcodes, not by peeking.

use std::io::{Read, Seek, SeekFrom};

use num_bigint::BigInt;
use tracing::debug;

use crate::error::{DecodeError, InvalidMagicError};
use crate::pickle::{OpcodeDecoder, PickleDecoder};
use crate::position::PositionGuard;

/// Magic number written at the head of legacy (non-zip) torch files.
pub const LEGACY_MAGIC_NUMBER: u128 = 0x1950A86A20F9469CFC6C;

pub fn legacy_magic_number() -> BigInt {
    BigInt::from(LEGACY_MAGIC_NUMBER)
}

/// First integer argument in the pickle stream, decoded with [`PickleDecoder`].
///
/// See [`get_magic_number_with`].
pub fn get_magic_number<R: Read + Seek + ?Sized>(
    reader: &mut R,
) -> Result<Option<BigInt>, DecodeError> {
    get_magic_number_with(&PickleDecoder, reader)
}

/// Walk `reader` with `decoder` and return the argument of the first
/// integer-like opcode (see [`crate::pickle::Opcode::is_integer_like`]).
///
/// * found: the stream is rewound to offset 0 and `Some(value)` returned;
/// * `STOP` reached without one: `None`, position restored to entry;
/// * decoder error: returned as-is, position restored to entry.
pub fn get_magic_number_with<D, R>(
    decoder: &D,
    reader: &mut R,
) -> Result<Option<BigInt>, DecodeError>
where
    D: OpcodeDecoder,
    R: Read + Seek + ?Sized,
{
    let mut guard = PositionGuard::new(reader)?;

    let mut found = None;
    for instruction in decoder.decode(&mut *guard) {
        let instruction = instruction?;
        if instruction.opcode.is_integer_like() {
            found = instruction.arg.into_int();
            if found.is_some() {
                debug!(opcode = %instruction.opcode, pos = instruction.pos, "magic number found");
                break;
            }
        }
    }

    match found {
        Some(value) => {
            guard.disarm();
            guard.seek(SeekFrom::Start(0))?;
            Ok(Some(value))
        }
        None => {
            debug!("no integer argument before STOP");
            guard.restore()?;
            Ok(None)
        }
    }
}

/// Caller-side comparison of an extracted magic number against the
/// expected one. `file` labels the stream in the resulting error.
pub fn check_magic(
    provided: Option<BigInt>,
    expected: &BigInt,
    file: impl Into<String>,
) -> Result<BigInt, InvalidMagicError> {
    match provided {
        Some(value) if &value == expected => Ok(value),
        provided => Err(InvalidMagicError {
            provided,
            expected: expected.clone(),
            file: file.into(),
        }),
    }
}

/// Parse a magic number written in hex, with or without a `0x` prefix.
pub fn parse_magic(text: &str) -> Option<BigInt> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.is_empty() || digits.starts_with(&['+', '-'][..]) {
        return None;
    }
    BigInt::parse_bytes(digits.as_bytes(), 16)
}

/// Lower-case hex rendering with a `0x` prefix.
pub fn format_magic(value: &BigInt) -> String {
    if value.sign() == num_bigint::Sign::Minus {
        format!("-0x{:x}", -value)
    } else {
        format!("0x{value:x}")
    }
}
