//! Scoped stream-position save/restore.

use std::io::{self, Seek, SeekFrom};
use std::ops::{Deref, DerefMut};

use tracing::warn;

/// Records a stream's position on creation and seeks back to it when
/// dropped, on every exit path, unless [`PositionGuard::disarm`] was called.
///
/// A restore that fails inside `drop` can only be logged. Call
/// [`PositionGuard::restore`] on paths where the error must be surfaced.
pub struct PositionGuard<'a, S: Seek + ?Sized> {
    stream: &'a mut S,
    start: u64,
    armed: bool,
}

impl<'a, S: Seek + ?Sized> PositionGuard<'a, S> {
    pub fn new(stream: &'a mut S) -> io::Result<Self> {
        let start = stream.stream_position()?;
        Ok(Self {
            stream,
            start,
            armed: true,
        })
    }

    /// Position recorded on entry.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Seek back now and report the outcome.
    pub fn restore(mut self) -> io::Result<()> {
        self.armed = false;
        self.stream.seek(SeekFrom::Start(self.start))?;
        Ok(())
    }

    /// Leave the stream wherever the caller puts it.
    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<S: Seek + ?Sized> Deref for PositionGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &*self.stream
    }
}

impl<S: Seek + ?Sized> DerefMut for PositionGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut *self.stream
    }
}

impl<S: Seek + ?Sized> Drop for PositionGuard<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.stream.seek(SeekFrom::Start(self.start)) {
                warn!("failed to restore stream position {}: {e}", self.start);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    #[test]
    fn drop_restores_position() {
        let mut cursor = Cursor::new(b"abcdef".to_vec());
        cursor.set_position(2);
        {
            let mut guard = PositionGuard::new(&mut cursor).unwrap();
            let mut buf = [0u8; 3];
            guard.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"cde");
        }
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn restore_reports_success() {
        let mut cursor = Cursor::new(b"abcdef".to_vec());
        let mut guard = PositionGuard::new(&mut cursor).unwrap();
        guard.seek(SeekFrom::End(0)).unwrap();
        assert_eq!(guard.start(), 0);
        guard.restore().unwrap();
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn disarmed_guard_leaves_position() {
        let mut cursor = Cursor::new(b"abcdef".to_vec());
        {
            let mut guard = PositionGuard::new(&mut cursor).unwrap();
            guard.seek(SeekFrom::Start(4)).unwrap();
            guard.disarm();
        }
        assert_eq!(cursor.position(), 4);
    }

    #[test]
    fn early_return_restores() {
        fn fails(cursor: &mut Cursor<Vec<u8>>) -> io::Result<()> {
            let mut guard = PositionGuard::new(cursor)?;
            let mut buf = [0u8; 16];
            guard.read_exact(&mut buf)?;
            Ok(())
        }

        let mut cursor = Cursor::new(b"abc".to_vec());
        cursor.set_position(1);
        assert!(fails(&mut cursor).is_err());
        assert_eq!(cursor.position(), 1);
    }
}
