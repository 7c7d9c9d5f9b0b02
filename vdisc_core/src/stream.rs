use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Any seekable byte source can back a reader.
pub trait BackingStream: Read + Seek + Send {}

impl<T: Read + Seek + Send> BackingStream for T {}

/// Shared, reference-counted handle to a read-only backing stream.
///
/// Cloning the handle takes a reference; dropping it releases one. Every
/// reader built on the same stream holds its own clone. The underlying
/// stream has a single cursor, so each positioned read seeks and reads
/// under one lock.
///
/// The size is captured once at construction. Disc images are opened
/// read-only and are not expected to change underneath the reader.
#[derive(Clone)]
pub struct SharedStream {
    inner: Arc<Mutex<Box<dyn BackingStream>>>,
    size: u64,
}

impl SharedStream {
    /// Wrap an already opened stream.
    pub fn new<S: BackingStream + 'static>(mut stream: S) -> Result<Self> {
        let size = stream.seek(SeekFrom::End(0))?;
        stream.seek(SeekFrom::Start(0))?;
        Ok(Self { inner: Arc::new(Mutex::new(Box::new(stream))), size })
    }

    /// Open a file read-only. Directories are rejected.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        if file.metadata()?.is_dir() {
            return Err(Error::BadStream(format!("{} is a directory", path.display())));
        }
        Self::new(file)
    }

    /// Total size of the stream in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of live handles sharing this stream.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Read up to `buf.len()` bytes at absolute position `pos`.
    ///
    /// Returns the number of bytes copied into `buf` together with the error
    /// that cut the read short, if any. Bytes copied before an error are
    /// counted. Without an error the count is short only at end of stream.
    pub fn read_at(&self, pos: u64, buf: &mut [u8]) -> (usize, Option<io::Error>) {
        let mut stream = self.inner.lock();
        if let Err(e) = stream.seek(SeekFrom::Start(pos)) {
            return (0, Some(e));
        }

        let mut filled = 0;
        while filled < buf.len() {
            match stream.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return (filled, Some(e)),
            }
        }
        (filled, None)
    }

    /// Read exactly `buf.len()` bytes at `pos`, failing on a short read.
    pub fn read_exact_at(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        let (n, err) = self.read_at(pos, buf);
        if let Some(e) = err {
            return Err(Error::Io(e));
        }
        if n != buf.len() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("wanted {} bytes at offset {}, stream returned {}", buf.len(), pos, n),
            )));
        }
        Ok(())
    }

    /// True when `[offset, offset + len)` lies entirely inside the stream.
    pub fn contains(&self, offset: u64, len: u64) -> bool {
        offset.checked_add(len).is_some_and(|end| end <= self.size)
    }
}

impl std::fmt::Debug for SharedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStream")
            .field("size", &self.size)
            .field("handles", &self.handle_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn numbered(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    #[test]
    fn test_read_at_positions() {
        let stream = SharedStream::new(Cursor::new(numbered(300))).unwrap();
        assert_eq!(stream.size(), 300);

        let mut buf = [0u8; 4];
        assert_eq!(stream.read_at(256, &mut buf).0, 4);
        assert_eq!(buf, [0, 1, 2, 3]);

        // Short read at the end of the stream.
        let (n, err) = stream.read_at(298, &mut buf);
        assert_eq!(n, 2);
        assert!(err.is_none());
        assert_eq!(&buf[..2], &[42, 43]);

        assert!(stream.read_exact_at(298, &mut buf).is_err());
    }

    #[test]
    fn test_clone_shares_stream() {
        let stream = SharedStream::new(Cursor::new(numbered(16))).unwrap();
        assert_eq!(stream.handle_count(), 1);

        let other = stream.clone();
        assert_eq!(stream.handle_count(), 2);
        drop(other);
        assert_eq!(stream.handle_count(), 1);
    }

    #[test]
    fn test_contains() {
        let stream = SharedStream::new(Cursor::new(numbered(100))).unwrap();
        assert!(stream.contains(0, 100));
        assert!(stream.contains(100, 0));
        assert!(!stream.contains(90, 11));
        assert!(!stream.contains(u64::MAX, 2));
    }

    #[test]
    fn test_open_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"binary\r\ndata").unwrap();
        file.flush().unwrap();

        let stream = SharedStream::open(file.path()).unwrap();
        assert_eq!(stream.size(), 12);
        let mut buf = [0u8; 12];
        stream.read_exact_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"binary\r\ndata");

        let dir = tempfile::tempdir().unwrap();
        assert!(SharedStream::open(dir.path()).is_err());
    }
}
