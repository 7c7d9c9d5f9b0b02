use flate2::read::DeflateDecoder;
use vdisc_core::codec::Codec;
use vdisc_core::format::CODEC_DEFLATE;

use crate::read_capped;

/// Raw deflate (RFC 1951) block codec.
///
/// Used by CSO, whose blocks carry no zlib header or checksum. Alignment
/// padding after the final deflate block is ignored.
pub struct DeflateCodec;

impl Codec for DeflateCodec {
    fn id(&self) -> u16 {
        CODEC_DEFLATE
    }

    fn name(&self) -> &'static str {
        "deflate"
    }

    fn decompress_block(&self, stored: &[u8], raw_len: usize) -> anyhow::Result<Vec<u8>> {
        read_capped(DeflateDecoder::new(stored), raw_len)
            .map_err(|e| anyhow::anyhow!("deflate decompress error: {}", e))
    }
}
