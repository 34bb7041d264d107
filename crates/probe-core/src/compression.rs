//! Compression-wrapper detection and direct-read eligibility.

use std::io;

use tracing::debug;

use crate::stream::ProbeStream;

/// Module identities of transparent decompression adapters.
pub const COMPRESS_MODULES: &[&str] = &["gzip"];

/// True if the stream identifies itself as a decompression adapter.
///
/// Streams without a module identity are never considered compressed.
pub fn is_compressed_file<S: ProbeStream + ?Sized>(stream: &S) -> bool {
    stream
        .as_module_identity()
        .is_some_and(|identity| COMPRESS_MODULES.contains(&identity.module_identity()))
}

/// True if the stream is backed by a real file and is not compression-wrapped,
/// i.e. it can be read through its descriptor rather than through buffering.
///
/// A missing descriptor capability, or a descriptor query failing with
/// `ErrorKind::Unsupported`, answers `false`. Other query errors propagate.
pub fn should_read_directly<S: ProbeStream + ?Sized>(stream: &S) -> io::Result<bool> {
    if is_compressed_file(stream) {
        debug!("stream is compression-wrapped, no direct reads");
        return Ok(false);
    }

    let Some(fd) = stream.as_file_descriptor() else {
        return Ok(false);
    };

    match fd.file_descriptor() {
        Ok(fd) => Ok(fd >= 0),
        Err(e) if e.kind() == io::ErrorKind::Unsupported => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gzip::GzipStream;
    use crate::stream::{HasFileDescriptor, HasModuleIdentity};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Read, Seek, SeekFrom, Write};

    /// In-memory stream with a scripted descriptor answer and identity.
    struct Scripted {
        fd: Option<fn() -> io::Result<i64>>,
        module: Option<&'static str>,
        data: Cursor<Vec<u8>>,
    }

    impl Scripted {
        fn new(fd: Option<fn() -> io::Result<i64>>, module: Option<&'static str>) -> Self {
            Self {
                fd,
                module,
                data: Cursor::new(Vec::new()),
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.data.read(buf)
        }
    }

    impl Seek for Scripted {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.data.seek(pos)
        }
    }

    impl HasFileDescriptor for Scripted {
        fn file_descriptor(&self) -> io::Result<i64> {
            match self.fd {
                Some(query) => query(),
                None => Err(io::Error::from(io::ErrorKind::Unsupported)),
            }
        }
    }

    impl HasModuleIdentity for Scripted {
        fn module_identity(&self) -> &str {
            self.module.unwrap_or_default()
        }
    }

    impl ProbeStream for Scripted {
        fn as_file_descriptor(&self) -> Option<&dyn HasFileDescriptor> {
            self.fd.map(|_| self as &dyn HasFileDescriptor)
        }

        fn as_module_identity(&self) -> Option<&dyn HasModuleIdentity> {
            self.module.map(|_| self as &dyn HasModuleIdentity)
        }
    }

    fn gz_file(payload: &[u8]) -> tempfile::NamedTempFile {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(payload).unwrap();
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&encoder.finish().unwrap()).unwrap();
        tmp.flush().unwrap();
        tmp
    }

    #[test]
    fn in_memory_buffer_is_not_compressed_nor_direct() {
        let cursor = Cursor::new(b"\x80\x02.".to_vec());
        assert!(!is_compressed_file(&cursor));
        assert!(!should_read_directly(&cursor).unwrap());
    }

    #[test]
    fn plain_file_reads_directly() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let file = tmp.reopen().unwrap();
        assert!(!is_compressed_file(&file));
        if cfg!(any(unix, windows)) {
            assert!(should_read_directly(&file).unwrap());
        }
    }

    #[test]
    fn gzip_wrapped_file_is_compressed_and_not_direct() {
        let tmp = gz_file(b"\x80\x02K\x01.");
        let stream = GzipStream::new(tmp.reopen().unwrap()).unwrap();
        assert!(stream.as_file_descriptor().is_some());
        assert!(is_compressed_file(&stream));
        assert!(!should_read_directly(&stream).unwrap());
    }

    #[test]
    fn unsupported_descriptor_is_false() {
        let stream = Scripted::new(Some(|| Err(io::Error::from(io::ErrorKind::Unsupported))), None);
        assert!(!should_read_directly(&stream).unwrap());
    }

    #[test]
    fn negative_descriptor_is_false() {
        let stream = Scripted::new(Some(|| Ok(-1)), None);
        assert!(!should_read_directly(&stream).unwrap());
    }

    #[test]
    fn valid_descriptor_is_true() {
        let stream = Scripted::new(Some(|| Ok(3)), None);
        assert!(should_read_directly(&stream).unwrap());
    }

    #[test]
    fn gzip_identity_wins_over_valid_descriptor() {
        let stream = Scripted::new(Some(|| Ok(3)), Some("gzip"));
        assert!(is_compressed_file(&stream));
        assert!(!should_read_directly(&stream).unwrap());
    }

    #[test]
    fn unknown_identity_is_not_compressed() {
        let stream = Scripted::new(Some(|| Ok(3)), Some("bz2"));
        assert!(!is_compressed_file(&stream));
        assert!(should_read_directly(&stream).unwrap());
    }

    #[test]
    fn other_descriptor_errors_propagate() {
        let stream = Scripted::new(
            Some(|| Err(io::Error::from(io::ErrorKind::PermissionDenied))),
            None,
        );
        let err = should_read_directly(&stream).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn detection_does_not_move_the_stream() {
        let mut cursor = Cursor::new(b"abcdef".to_vec());
        cursor.set_position(3);
        is_compressed_file(&cursor);
        should_read_directly(&cursor).unwrap();
        assert_eq!(cursor.position(), 3);
    }
}
