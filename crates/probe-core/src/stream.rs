//! Optional stream capabilities.
//!
//! A stream handed to the detectors may or may not be backed by an OS file
//! and may or may not be a decompression wrapper. Both are modelled as
//! capabilities a stream can expose; a stream that exposes neither is an
//! ordinary in-memory byte source.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};

/// A stream that can report the OS descriptor it reads from.
pub trait HasFileDescriptor {
    /// The raw descriptor. `ErrorKind::Unsupported` means the stream has
    /// no descriptor after all (a pipe-less socket shim, a closed handle).
    fn file_descriptor(&self) -> io::Result<i64>;
}

/// A stream that can name the adapter family it belongs to, e.g. `"gzip"`.
pub trait HasModuleIdentity {
    fn module_identity(&self) -> &str;
}

/// A seekable byte stream with optional introspection capabilities.
pub trait ProbeStream: Read + Seek {
    fn as_file_descriptor(&self) -> Option<&dyn HasFileDescriptor> {
        None
    }

    fn as_module_identity(&self) -> Option<&dyn HasModuleIdentity> {
        None
    }
}

impl HasFileDescriptor for File {
    #[cfg(unix)]
    fn file_descriptor(&self) -> io::Result<i64> {
        use std::os::unix::io::AsRawFd;
        Ok(i64::from(self.as_raw_fd()))
    }

    #[cfg(windows)]
    fn file_descriptor(&self) -> io::Result<i64> {
        use std::os::windows::io::AsRawHandle;
        Ok(self.as_raw_handle() as isize as i64)
    }

    #[cfg(not(any(unix, windows)))]
    fn file_descriptor(&self) -> io::Result<i64> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }
}

impl ProbeStream for File {
    fn as_file_descriptor(&self) -> Option<&dyn HasFileDescriptor> {
        Some(self)
    }
}

impl<T: AsRef<[u8]>> ProbeStream for Cursor<T> {}

impl<R: ProbeStream> ProbeStream for BufReader<R> {
    fn as_file_descriptor(&self) -> Option<&dyn HasFileDescriptor> {
        self.get_ref().as_file_descriptor()
    }

    fn as_module_identity(&self) -> Option<&dyn HasModuleIdentity> {
        self.get_ref().as_module_identity()
    }
}

impl<S: ProbeStream + ?Sized> ProbeStream for &mut S {
    fn as_file_descriptor(&self) -> Option<&dyn HasFileDescriptor> {
        (**self).as_file_descriptor()
    }

    fn as_module_identity(&self) -> Option<&dyn HasModuleIdentity> {
        (**self).as_module_identity()
    }
}
