use std::io::{self, Read, Seek, SeekFrom};

use crate::error::{Error, Result};

/// Uniform random-access byte stream over a disc image.
///
/// Every reader kind (plain window, sparse or compressed container) honours
/// the same contract:
///
/// - `0 <= tell() <= size()` at all times.
/// - [`read`](Self::read) copies at most `min(buf.len(), size() - tell())`
///   bytes and advances the cursor by exactly the number returned. A short
///   count before the end means an error was recorded; bytes already copied
///   stay in `buf`.
/// - [`seek`](Self::seek) beyond `size()` fails and leaves the cursor alone.
///
/// A reader is not meant to be shared between threads without external
/// locking; cursor and cache state are unsynchronized.
pub trait DiscReader: Send {
    /// Read from the current position into `buf`, returning bytes copied.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Set the current position.
    fn seek(&mut self, pos: u64) -> Result<()>;

    /// Current position.
    fn tell(&self) -> u64;

    /// Total logical length of the image.
    fn size(&self) -> u64;

    /// Most recent failure, if any. Not cleared by later successful calls.
    fn last_error(&self) -> Option<&Error>;

    /// Forget the recorded failure.
    fn clear_error(&mut self);

    /// Remove and return the recorded failure.
    fn take_error(&mut self) -> Option<Error>;

    /// Seek to `pos` and read into `buf`.
    ///
    /// Unlike [`read`](Self::read) this reports a failure as `Err`, dropping
    /// the partial count.
    fn seek_and_read(&mut self, pos: u64, buf: &mut [u8]) -> Result<usize> {
        self.seek(pos)?;
        self.clear_error();
        let n = self.read(buf);
        if n < buf.len() {
            if let Some(err) = self.take_error() {
                return Err(err);
            }
        }
        Ok(n)
    }
}

/// Adapts a [`DiscReader`] to `std::io::Read + Seek`.
///
/// Parsers written against the standard traits (ISO9660, partition tables,
/// a nested [`PlainReader`](crate::PlainReader) through
/// [`SharedStream::new`](crate::SharedStream::new)) can consume any reader
/// this way.
pub struct ReaderStream<R> {
    inner: R,
}

impl<R: DiscReader> ReaderStream<R> {
    /// Wrap `inner`.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Borrow the wrapped reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Unwrap into the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn to_io_error(err: Error) -> io::Error {
    match err {
        Error::Io(e) => e,
        Error::InvalidArgument(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

impl<R: DiscReader> Read for ReaderStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.clear_error();
        let n = self.inner.read(buf);
        // Report the failure only when nothing was copied; the next call
        // starts at the failing block and surfaces it then.
        if n == 0 {
            if let Some(err) = self.inner.take_error() {
                return Err(to_io_error(err));
            }
        }
        Ok(n)
    }
}

impl<R: DiscReader> Seek for ReaderStream<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(d) => self.inner.size().checked_add_signed(d),
            SeekFrom::Current(d) => self.inner.tell().checked_add_signed(d),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative or overflowing position")
        })?;
        self.inner.seek(target).map_err(to_io_error)?;
        Ok(target)
    }
}
