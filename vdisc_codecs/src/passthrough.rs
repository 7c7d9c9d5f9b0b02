use vdisc_core::codec::Codec;
use vdisc_core::format::CODEC_STORED;

/// No-op codec for blocks a container stores uncompressed.
///
/// Containers flag incompressible blocks and store them verbatim, sometimes
/// followed by alignment padding. Anything past `raw_len` is dropped.
pub struct PassThroughCodec;

impl Codec for PassThroughCodec {
    fn id(&self) -> u16 {
        CODEC_STORED
    }

    fn name(&self) -> &'static str {
        "stored"
    }

    fn decompress_block(&self, stored: &[u8], raw_len: usize) -> anyhow::Result<Vec<u8>> {
        Ok(stored[..stored.len().min(raw_len)].to_vec())
    }
}
