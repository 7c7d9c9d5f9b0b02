mod deflate_codec;
mod lz4_codec;
mod passthrough;
mod zlib_codec;

pub use deflate_codec::DeflateCodec;
pub use lz4_codec::Lz4Codec;
pub use passthrough::PassThroughCodec;
pub use zlib_codec::ZlibCodec;

use std::io::{self, Read};
use std::sync::Arc;
use vdisc_core::format::{CODEC_DEFLATE, CODEC_LZ4, CODEC_STORED, CODEC_ZLIB};
use vdisc_core::Codec;

/// Resolve a codec from its numeric id.
///
/// Block mappers call this once while parsing a container header and keep
/// the returned codec for every block they materialize.
pub fn codec_by_id(id: u16) -> anyhow::Result<Arc<dyn Codec>> {
    match id {
        CODEC_STORED => Ok(Arc::new(PassThroughCodec)),
        CODEC_ZLIB => Ok(Arc::new(ZlibCodec)),
        CODEC_DEFLATE => Ok(Arc::new(DeflateCodec)),
        CODEC_LZ4 => Ok(Arc::new(Lz4Codec)),
        _ => anyhow::bail!("unknown codec id {}; supported: 0 (stored), 1 (zlib), 2 (deflate), 3 (lz4)", id),
    }
}

/// Read a decoder's output, keeping at most `raw_len` bytes.
///
/// One byte of lookahead lets the decoder reach the end of an exactly-sized
/// stream and check its trailer.
pub(crate) fn read_capped(decoder: impl Read, raw_len: usize) -> io::Result<Vec<u8>> {
    let mut raw = Vec::with_capacity(raw_len);
    decoder.take(raw_len as u64 + 1).read_to_end(&mut raw)?;
    raw.truncate(raw_len);
    Ok(raw)
}
