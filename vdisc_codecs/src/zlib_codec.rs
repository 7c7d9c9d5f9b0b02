use flate2::read::ZlibDecoder;
use vdisc_core::codec::Codec;
use vdisc_core::format::CODEC_ZLIB;

use crate::read_capped;

/// zlib (RFC 1950) block codec.
///
/// Used by GCZ. The zlib trailer carries an Adler-32 of the decoded data,
/// which flate2 checks when it reaches the end of the stream.
pub struct ZlibCodec;

impl Codec for ZlibCodec {
    fn id(&self) -> u16 {
        CODEC_ZLIB
    }

    fn name(&self) -> &'static str {
        "zlib"
    }

    fn decompress_block(&self, stored: &[u8], raw_len: usize) -> anyhow::Result<Vec<u8>> {
        read_capped(ZlibDecoder::new(stored), raw_len)
            .map_err(|e| anyhow::anyhow!("zlib decompress error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_decodes_block() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 13) as u8).collect();
        let out = ZlibCodec.decompress_block(&zlib(&data), data.len()).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_output_capped() {
        let data = vec![0x5Au8; 1000];
        let out = ZlibCodec.decompress_block(&zlib(&data), 100).unwrap();
        assert_eq!(out.len(), 100);
    }

    #[test]
    fn test_corrupt_checksum_rejected() {
        let data = vec![7u8; 256];
        let mut stored = zlib(&data);
        let last = stored.len() - 1;
        stored[last] ^= 0xFF;
        assert!(ZlibCodec.decompress_block(&stored, data.len()).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(ZlibCodec.decompress_block(b"definitely not zlib", 64).is_err());
    }
}
