//! Container formats and format detection.
//!
//! Each submodule provides a `detect` function that looks at a header
//! buffer and an `open` function that validates the container and returns
//! a [`SparseReader`](vdisc_core::SparseReader) over its mapper.
//! [`open_disc`] ties them together.

pub mod ciso;
pub mod cso;
pub mod gcz;
pub mod wbfs;

pub use ciso::{CisoMapper, CisoReader};
pub use cso::{CsoMapper, CsoReader};
pub use gcz::{GczMapper, GczReader};
pub use wbfs::{WbfsMapper, WbfsReader};

use log::debug;
use vdisc_core::{DiscFormat, DiscReader, Error, Options, PlainReader, Result, SharedStream};

/// Detect the container format from the first bytes of a file.
///
/// Anything non-empty that no container claims is treated as a plain
/// image. An empty file has no format.
pub fn detect(header: &[u8], file_size: u64) -> Option<DiscFormat> {
    if file_size == 0 {
        return None;
    }
    ciso::detect(header)
        .or_else(|| wbfs::detect(header))
        .or_else(|| gcz::detect(header))
        .or_else(|| cso::detect(header))
        .or(Some(DiscFormat::Plain))
}

/// Detect the format of `stream` and open a reader over it.
pub fn open_disc(stream: SharedStream, options: &Options) -> Result<Box<dyn DiscReader>> {
    options.validate()?;

    let probe_len = (options.header_probe_len as u64).min(stream.size()) as usize;
    let mut header = vec![0u8; probe_len];
    stream.read_exact_at(0, &mut header)?;

    let format = detect(&header, stream.size())
        .ok_or_else(|| Error::unsupported("empty file has no disc format"))?;
    debug!("detected {} image ({} bytes)", format, stream.size());
    open_format(stream, format, options)
}

/// Open `stream` as a specific format, skipping detection.
pub fn open_format(
    stream: SharedStream,
    format: DiscFormat,
    options: &Options,
) -> Result<Box<dyn DiscReader>> {
    let reader: Box<dyn DiscReader> = match format {
        DiscFormat::Plain => Box::new(PlainReader::new(stream)),
        DiscFormat::GcnCiso => Box::new(ciso::open(stream, options)?),
        DiscFormat::Wbfs => Box::new(wbfs::open(stream, options)?),
        DiscFormat::Gcz => Box::new(gcz::open(stream, options)?),
        DiscFormat::Cso | DiscFormat::Zso => Box::new(cso::open(stream, options)?),
    };
    Ok(reader)
}
