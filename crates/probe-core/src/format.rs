//! Container format classification.
//!
//! Serialized models come either as a zip archive (the current layout) or
//! as a bare sequence of pickles (the legacy layout). Only the first four
//! bytes decide.

use std::fmt;
use std::io::{self, ErrorKind, Read, Seek};

use serde::Serialize;
use tracing::debug;

use crate::position::PositionGuard;

/// Zip local-file-header signature.
pub const ZIP_LOCAL_HEADER_MAGIC: [u8; 4] = *b"PK\x03\x04";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerFormat {
    LegacyPickle,
    ZipArchive,
}

impl ContainerFormat {
    /// Classify the stream from its leading bytes, keeping its position.
    pub fn detect<R: Read + Seek + ?Sized>(reader: &mut R) -> io::Result<Self> {
        if is_zipfile(reader)? {
            Ok(Self::ZipArchive)
        } else {
            Ok(Self::LegacyPickle)
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::LegacyPickle => "legacy pickle",
            Self::ZipArchive => "zip archive",
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// True if the four bytes at the current position are the zip
/// local-file-header signature.
///
/// Stricter than a general zip test: the signature must sit at the very
/// start, not anywhere in the payload, so signature bytes buried inside
/// pickled tensor data never cause a false positive. Streams shorter than
/// four bytes simply do not match. The position is restored on every path.
pub fn is_zipfile<R: Read + Seek + ?Sized>(reader: &mut R) -> io::Result<bool> {
    let mut guard = PositionGuard::new(reader)?;

    let mut read_bytes = Vec::with_capacity(ZIP_LOCAL_HEADER_MAGIC.len());
    let mut byte = [0u8; 1];
    while read_bytes.len() < ZIP_LOCAL_HEADER_MAGIC.len() {
        match guard.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => read_bytes.push(byte[0]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    let start = guard.start();
    guard.restore()?;

    let matched = read_bytes == ZIP_LOCAL_HEADER_MAGIC;
    debug!(start, matched, "zip signature check");
    Ok(matched)
}
