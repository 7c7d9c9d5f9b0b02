//! GCZ images (Dolphin compressed GameCube/Wii discs).
//!
//! Every block is stored, either zlib-compressed or verbatim, so there are no
//! empty blocks. Pointers are relative to the start of the data area.
//!
//! ```text
//! 0x00        magic: u32 LE = 0xB10BC001
//! 0x04        sub_type: u32 LE
//! 0x08        compressed_data_size: u64 LE
//! 0x10        data_size: u64 LE
//! 0x18        block_size: u32 LE
//! 0x1C        num_blocks: u32 LE
//! 0x20        block pointers: u64 LE x num_blocks (bit 63 = uncompressed)
//!             block hashes: u32 LE x num_blocks
//! data_offset compressed data
//! ```

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use vdisc_core::format::{le_u32, le_u64, CODEC_STORED, CODEC_ZLIB};
use vdisc_core::{
    BlockAddress, BlockMapper, Codec, DiscFormat, Error, Options, Result, SharedStream,
    SparseReader,
};

/// Magic at offset 0, little-endian.
pub const GCZ_MAGIC: u32 = 0xB10B_C001;
/// Size of the fixed header.
pub const GCZ_HEADER_SIZE: u64 = 32;

const UNCOMPRESSED_FLAG: u64 = 1 << 63;

/// Reader over a GCZ image.
pub type GczReader = SparseReader<GczMapper>;

fn reject(msg: String) -> Error {
    warn!("GCZ: {}", msg);
    Error::Corrupt(msg)
}

/// Recognize a GCZ header. Needs the full 32-byte header.
pub fn detect(header: &[u8]) -> Option<DiscFormat> {
    if header.len() < GCZ_HEADER_SIZE as usize || le_u32(header, 0) != GCZ_MAGIC {
        return None;
    }
    let block_size = le_u32(header, 0x18);
    (block_size != 0).then_some(DiscFormat::Gcz)
}

/// Parse and validate a GCZ image and wrap it in a reader.
pub fn open(stream: SharedStream, options: &Options) -> Result<GczReader> {
    let mapper = GczMapper::parse(&stream, options)?;
    SparseReader::new(stream, mapper)
}

#[derive(Debug, Clone, Copy)]
struct StoredBlock {
    offset: u64,
    len: u32,
    compressed: bool,
}

/// Block mapper for GCZ.
pub struct GczMapper {
    block_size: u32,
    data_size: u64,
    blocks: Vec<StoredBlock>,
    zlib: Arc<dyn Codec>,
    stored: Arc<dyn Codec>,
}

impl fmt::Debug for GczMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GczMapper")
            .field("block_size", &self.block_size)
            .field("data_size", &self.data_size)
            .field("blocks", &self.blocks.len())
            .finish()
    }
}

impl GczMapper {
    /// Read the header and block pointer table from `stream`.
    pub fn parse(stream: &SharedStream, options: &Options) -> Result<Self> {
        if stream.size() < GCZ_HEADER_SIZE {
            return Err(reject(format!("file is {} bytes, smaller than the header", stream.size())));
        }
        let mut header = [0u8; GCZ_HEADER_SIZE as usize];
        stream.read_exact_at(0, &mut header)?;

        if le_u32(&header, 0) != GCZ_MAGIC {
            return Err(Error::unsupported("missing GCZ magic"));
        }
        let sub_type = le_u32(&header, 4);
        let compressed_data_size = le_u64(&header, 8);
        let data_size = le_u64(&header, 0x10);
        let block_size = le_u32(&header, 0x18);
        let num_blocks = le_u32(&header, 0x1C);

        options.check_block_size(block_size as u64)?;
        options.check_index_entries(num_blocks as u64)?;
        if (num_blocks as u64) * (block_size as u64) < data_size {
            return Err(reject(format!(
                "{} blocks of {} bytes cannot hold {} bytes",
                num_blocks, block_size, data_size
            )));
        }

        let data_offset = GCZ_HEADER_SIZE + 12 * num_blocks as u64;
        if !stream.contains(data_offset, compressed_data_size) {
            return Err(reject(format!(
                "data area at {:#x} ({} bytes) runs past end of file ({} bytes)",
                data_offset,
                compressed_data_size,
                stream.size()
            )));
        }

        let mut raw = vec![0u8; num_blocks as usize * 8];
        stream.read_exact_at(GCZ_HEADER_SIZE, &mut raw)?;
        let pointers: Vec<u64> = (0..num_blocks as usize).map(|i| le_u64(&raw, i * 8)).collect();

        let mut blocks = Vec::with_capacity(pointers.len());
        for (idx, &pointer) in pointers.iter().enumerate() {
            let start = pointer & !UNCOMPRESSED_FLAG;
            let end = pointers
                .get(idx + 1)
                .map_or(compressed_data_size, |next| next & !UNCOMPRESSED_FLAG);
            if start > end || end > compressed_data_size {
                return Err(reject(format!(
                    "block {} spans {:#x}..{:#x}, outside data area of {} bytes",
                    idx, start, end, compressed_data_size
                )));
            }
            let len = end - start;
            if len == 0 || len > block_size as u64 {
                return Err(reject(format!("block {} has stored length {}", idx, len)));
            }

            let compressed = pointer & UNCOMPRESSED_FLAG == 0;
            let logical = data_size.saturating_sub(idx as u64 * block_size as u64).min(block_size as u64);
            if !compressed && len < logical {
                return Err(reject(format!(
                    "uncompressed block {} stores {} of {} bytes",
                    idx, len, logical
                )));
            }

            blocks.push(StoredBlock { offset: data_offset + start, len: len as u32, compressed });
        }

        let lookup = |id| vdisc_codecs::codec_by_id(id).map_err(|e| Error::unsupported(e.to_string()));
        let zlib = lookup(CODEC_ZLIB)?;
        let stored = lookup(CODEC_STORED)?;

        debug!(
            "GCZ: sub type {}, {} blocks of {:#x}, {} compressed bytes, disc size {}",
            sub_type, num_blocks, block_size, compressed_data_size, data_size
        );

        Ok(Self { block_size, data_size, blocks, zlib, stored })
    }

    /// Number of blocks stored zlib-compressed.
    pub fn compressed_blocks(&self) -> usize {
        self.blocks.iter().filter(|b| b.compressed).count()
    }
}

impl BlockMapper for GczMapper {
    fn format_name(&self) -> &'static str {
        "GCZ"
    }

    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn disc_size(&self) -> u64 {
        self.data_size
    }

    fn resolve(&self, block_idx: u64) -> BlockAddress {
        match self.blocks.get(block_idx as usize) {
            Some(block) => BlockAddress::Physical(block.offset),
            None => BlockAddress::Invalid,
        }
    }

    fn materialize_block(
        &self,
        stream: &SharedStream,
        block_idx: u64,
        phys_addr: u64,
    ) -> Result<Vec<u8>> {
        let block = self
            .blocks
            .get(block_idx as usize)
            .ok_or(Error::BlockOutOfRange { index: block_idx })?;
        let mut stored = vec![0u8; block.len as usize];
        stream.read_exact_at(phys_addr, &mut stored)?;

        let codec = if block.compressed { &self.zlib } else { &self.stored };
        codec
            .decompress_block(&stored, self.block_size as usize)
            .map_err(|source| Error::Decompression { index: block_idx, source })
    }
}
