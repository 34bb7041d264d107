//! Seekable view over a gzip-compressed model file.

use std::io::{self, Read, Seek, SeekFrom};

use flate2::read::MultiGzDecoder;
use tracing::debug;

use crate::error::InflateLimitExceeded;
use crate::position::PositionGuard;
use crate::stream::{HasFileDescriptor, HasModuleIdentity, ProbeStream};

/// Module identity reported by [`GzipStream`].
pub const GZIP_MODULE: &str = "gzip";

const GZ_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Upper bound on the decompressed size accepted by [`GzipStream::new`].
pub const DEFAULT_DECOMPRESSED_LIMIT: u64 = 1 << 30; // 1 GiB

/// Check for the gzip member header at the current position without moving it.
pub fn is_gzip<R: Read + Seek + ?Sized>(reader: &mut R) -> io::Result<bool> {
    let mut guard = PositionGuard::new(reader)?;
    let mut magic = [0u8; 2];
    let matched = match guard.read_exact(&mut magic) {
        Ok(()) => magic == GZ_MAGIC,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
        Err(e) => return Err(e),
    };
    guard.restore()?;
    Ok(matched)
}

/// Transparently decompressed, seekable gzip stream.
///
/// Inflation is lazy: bytes are decompressed into an in-memory window only
/// as far as a read or seek has reached, and never past the size limit.
/// Reading the head of a large payload therefore inflates little more than
/// the head. Seeking relative to the end inflates everything.
///
/// The wrapped reader's file descriptor stays visible: a gzip stream over a
/// real file still reports a descriptor and is still not eligible for
/// direct reads.
pub struct GzipStream<R> {
    decoder: MultiGzDecoder<R>,
    inflated: Vec<u8>,
    pos: u64,
    limit: u64,
    finished: bool,
}

const INFLATE_CHUNK: usize = 8 * 1024;

impl<R: Read> GzipStream<R> {
    pub fn new(inner: R) -> io::Result<Self> {
        Self::with_limit(inner, DEFAULT_DECOMPRESSED_LIMIT)
    }

    /// Wrap `inner`, refusing to inflate more than `limit` bytes.
    ///
    /// The member header is checked here by inflating the first chunk, so a
    /// stream that is not gzip at all fails on construction.
    pub fn with_limit(inner: R, limit: u64) -> io::Result<Self> {
        let mut stream = Self {
            decoder: MultiGzDecoder::new(inner),
            inflated: Vec::new(),
            pos: 0,
            limit,
            finished: false,
        };
        stream.inflate_to(1)?;
        Ok(stream)
    }

    /// Inflate until at least `target` bytes are buffered or the payload
    /// ends. The buffer never grows past `limit`; one byte beyond it is
    /// enough to fail.
    fn inflate_to(&mut self, target: u64) -> io::Result<()> {
        let mut chunk = [0u8; INFLATE_CHUNK];
        while !self.finished && self.inflated_len() < target {
            let room = self.limit.saturating_sub(self.inflated_len());
            let want = usize::try_from(room)
                .map_or(INFLATE_CHUNK, |room| room.clamp(1, INFLATE_CHUNK));
            let n = match self.decoder.read(&mut chunk[..want]) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if n == 0 {
                self.finished = true;
                debug!(bytes = self.inflated.len(), "inflated gzip stream");
                break;
            }
            if n as u64 > room {
                return Err(InflateLimitExceeded { limit: self.limit }.into());
            }
            self.inflated.extend_from_slice(&chunk[..n]);
        }
        Ok(())
    }
}

impl<R> GzipStream<R> {
    pub fn get_ref(&self) -> &R {
        self.decoder.get_ref()
    }

    pub fn into_inner(self) -> R {
        self.decoder.into_inner()
    }

    /// Decompressed bytes produced so far.
    pub fn inflated_len(&self) -> u64 {
        self.inflated.len() as u64
    }
}

impl<R: Read> Read for GzipStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.inflate_to(self.pos.saturating_add(1))?;
        let Some(available) = usize::try_from(self.pos)
            .ok()
            .and_then(|start| self.inflated.get(start..))
        else {
            return Ok(0);
        };
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read> Seek for GzipStream<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(offset) => self.pos.checked_add_signed(offset),
            SeekFrom::End(offset) => {
                self.inflate_to(u64::MAX)?;
                self.inflated_len().checked_add_signed(offset)
            }
        };
        let target = target.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )
        })?;
        self.pos = target;
        Ok(target)
    }
}

impl<R> HasModuleIdentity for GzipStream<R> {
    fn module_identity(&self) -> &str {
        GZIP_MODULE
    }
}

impl<R: ProbeStream> ProbeStream for GzipStream<R> {
    fn as_file_descriptor(&self) -> Option<&dyn HasFileDescriptor> {
        self.get_ref().as_file_descriptor()
    }

    fn as_module_identity(&self) -> Option<&dyn HasModuleIdentity> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::is_zipfile;
    use crate::magic::{get_magic_number, legacy_magic_number};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    fn gz(payload: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn inflates_and_seeks() {
        let mut stream = GzipStream::new(Cursor::new(gz(b"hello pickle"))).unwrap();
        assert_eq!(stream.seek(SeekFrom::End(0)).unwrap(), 12);
        stream.seek(SeekFrom::Start(0)).unwrap();

        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello pickle");

        stream.seek(SeekFrom::Start(6)).unwrap();
        let mut tail = String::new();
        stream.read_to_string(&mut tail).unwrap();
        assert_eq!(tail, "pickle");
    }

    #[test]
    fn concatenated_members_are_joined() {
        let mut data = gz(b"first ");
        data.extend(gz(b"second"));
        let mut stream = GzipStream::new(Cursor::new(data)).unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "first second");
    }

    #[test]
    fn reports_gzip_identity() {
        let stream = GzipStream::new(Cursor::new(gz(b"x"))).unwrap();
        let identity = stream.as_module_identity().unwrap();
        assert_eq!(identity.module_identity(), "gzip");
        assert!(stream.as_file_descriptor().is_none());
    }

    #[test]
    fn file_backed_stream_keeps_descriptor() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&gz(b"payload")).unwrap();
        tmp.flush().unwrap();

        let stream = GzipStream::new(tmp.reopen().unwrap()).unwrap();
        assert!(stream.as_file_descriptor().is_some());
    }

    #[test]
    fn rejects_oversized_payload() {
        let mut stream = GzipStream::with_limit(Cursor::new(gz(&[0u8; 64])), 16).unwrap();
        let err = stream.read_to_end(&mut Vec::new()).unwrap_err();
        assert_eq!(InflateLimitExceeded::find(&err), Some(&InflateLimitExceeded { limit: 16 }));
        assert!(stream.inflated_len() <= 16);

        let mut stream = GzipStream::with_limit(Cursor::new(gz(&[0u8; 64])), 16).unwrap();
        assert!(stream.seek(SeekFrom::End(0)).is_err());
    }

    #[test]
    fn payload_within_limit_is_accepted() {
        let mut stream = GzipStream::with_limit(Cursor::new(gz(&[7u8; 64])), 64).unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, [7u8; 64]);
    }

    #[test]
    fn head_of_large_payload_is_inflated_on_demand() {
        let mut payload = b"\x80\x02\x8a\x0a\x6c\xfc\x9c\x46\xf9\x20\x6a\xa8\x50\x19.".to_vec();
        payload.resize(8 << 20, 0);
        let mut stream = GzipStream::new(Cursor::new(gz(&payload))).unwrap();

        assert!(!is_zipfile(&mut stream).unwrap());
        assert_eq!(get_magic_number(&mut stream).unwrap(), Some(legacy_magic_number()));
        assert_eq!(stream.stream_position().unwrap(), 0);
        assert!(stream.inflated_len() <= 64 * 1024, "{}", stream.inflated_len());
    }

    #[test]
    fn seeks_past_the_inflated_window() {
        let payload = (0..=255u8).cycle().take(100_000).collect::<Vec<_>>();
        let mut stream = GzipStream::new(Cursor::new(gz(&payload))).unwrap();

        stream.seek(SeekFrom::Start(50_000)).unwrap();
        let mut byte = [0u8; 1];
        stream.read_exact(&mut byte).unwrap();
        assert_eq!(byte[0], payload[50_000]);

        stream.seek(SeekFrom::Current(-1)).unwrap();
        stream.read_exact(&mut byte).unwrap();
        assert_eq!(byte[0], payload[50_000]);

        assert!(stream.seek(SeekFrom::Current(-100_000)).is_err());
        stream.seek(SeekFrom::Start(200_000)).unwrap();
        assert_eq!(stream.read(&mut byte).unwrap(), 0);
        assert_eq!(stream.inflated_len(), 100_000);
    }

    #[test]
    fn rejects_non_gzip_input() {
        let result = GzipStream::new(Cursor::new(b"PK\x03\x04not gzip".to_vec()));
        assert!(result.is_err());
    }

    #[test]
    fn is_gzip_checks_header_and_keeps_position() {
        let mut cursor = Cursor::new(gz(b"abc"));
        assert!(is_gzip(&mut cursor).unwrap());
        assert_eq!(cursor.position(), 0);

        let mut plain = Cursor::new(b"\x80\x02K\x01.".to_vec());
        assert!(!is_gzip(&mut plain).unwrap());
        assert_eq!(plain.position(), 0);

        let mut short = Cursor::new(vec![0x1F]);
        assert!(!is_gzip(&mut short).unwrap());
        assert_eq!(short.position(), 0);
    }
}
