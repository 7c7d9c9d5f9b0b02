use lz4_flex::block::decompress_into;
use vdisc_core::codec::Codec;
use vdisc_core::format::CODEC_LZ4;

/// LZ4 block codec (no frame, no size prefix).
///
/// Used by ZSO. The output buffer is sized to `raw_len`; a block that would
/// decode past it is rejected.
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn id(&self) -> u16 {
        CODEC_LZ4
    }

    fn name(&self) -> &'static str {
        "lz4"
    }

    fn decompress_block(&self, stored: &[u8], raw_len: usize) -> anyhow::Result<Vec<u8>> {
        let mut raw = vec![0u8; raw_len];
        let n = decompress_into(stored, &mut raw)
            .map_err(|e| anyhow::anyhow!("lz4 decompress error: {}", e))?;
        raw.truncate(n);
        Ok(raw)
    }
}
