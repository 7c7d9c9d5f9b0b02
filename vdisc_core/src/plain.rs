use log::debug;

use crate::error::{Error, Result};
use crate::reader::DiscReader;
use crate::stream::SharedStream;

/// Pass-through reader over a window of a backing stream.
///
/// Exposes `[offset, offset + length)` of the stream as a complete image:
/// `size()` is the window length and position 0 maps to `offset`. Used
/// directly for raw images and for images embedded at an offset inside a
/// larger file.
pub struct PlainReader {
    stream: SharedStream,
    offset: u64,
    length: u64,
    pos: u64,
    last_error: Option<Error>,
}

impl PlainReader {
    /// Expose the whole stream.
    pub fn new(stream: SharedStream) -> Self {
        Self::with_window(stream, 0, None)
    }

    /// Expose `length` bytes starting at `offset`.
    ///
    /// `None` means "until the end of the stream". A window reaching past the
    /// end of the stream is clamped to it, as is an offset past the end.
    pub fn with_window(stream: SharedStream, offset: u64, length: Option<u64>) -> Self {
        let stream_size = stream.size();
        let offset = offset.min(stream_size);
        let available = stream_size - offset;
        let length = match length {
            Some(len) if len <= available => len,
            _ => available,
        };
        debug!("plain reader window: offset={} length={} (stream {})", offset, length, stream_size);

        Self { stream, offset, length, pos: 0, last_error: None }
    }
}

impl DiscReader for PlainReader {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let remaining = self.length - self.pos;
        let want = (buf.len() as u64).min(remaining) as usize;
        if want == 0 {
            return 0;
        }

        let (n, err) = self.stream.read_at(self.offset + self.pos, &mut buf[..want]);
        self.pos += n as u64;
        if let Some(e) = err {
            self.last_error = Some(Error::Io(e));
        }
        n
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.length {
            let msg = format!("seek to {} beyond image size {}", pos, self.length);
            self.last_error = Some(Error::invalid_argument(msg.clone()));
            return Err(Error::invalid_argument(msg));
        }
        self.pos = pos;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> u64 {
        self.length
    }

    fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    fn clear_error(&mut self) {
        self.last_error = None;
    }

    fn take_error(&mut self) -> Option<Error> {
        self.last_error.take()
    }
}
