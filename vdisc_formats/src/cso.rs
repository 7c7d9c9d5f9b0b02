//! PSP CSO and ZSO images.
//!
//! Both share one layout and differ only in the block codec: CSO blocks are
//! raw deflate, ZSO blocks are raw LZ4.
//!
//! ```text
//! 0x00  "CISO" or "ZISO"
//! 0x04  header_size: u32 LE (0 or 0x18)
//! 0x08  uncompressed_size: u64 LE
//! 0x10  block_size: u32 LE
//! 0x14  version: u8
//! 0x15  align: u8
//! 0x16  reserved: 2 bytes
//! 0x18  index: u32 LE x (block count + 1), bit 31 = stored verbatim
//! ```

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use vdisc_core::format::{le_u32, le_u64, CODEC_DEFLATE, CODEC_LZ4, CODEC_STORED};
use vdisc_core::{
    BlockAddress, BlockMapper, Codec, DiscFormat, Error, Options, Result, SharedStream,
    SparseReader,
};

/// Magic of deflate-compressed images.
pub const CSO_MAGIC: &[u8; 4] = b"CISO";
/// Magic of LZ4-compressed images.
pub const ZSO_MAGIC: &[u8; 4] = b"ZISO";
/// Size of the fixed header; the index follows it.
pub const CSO_HEADER_SIZE: u64 = 0x18;

const PLAIN_FLAG: u32 = 0x8000_0000;
const MIN_BLOCK_SIZE: u32 = 0x800;
const MAX_VERSION: u8 = 1;
const MAX_ALIGN: u8 = 31;

/// Reader over a CSO or ZSO image.
pub type CsoReader = SparseReader<CsoMapper>;

fn reject(msg: String) -> Error {
    warn!("CSO: {}", msg);
    Error::Corrupt(msg)
}

/// Recognize a CSO/ZSO header. Needs the full 24-byte header.
///
/// GameCube CISO uses the same magic; it is told apart by the header size
/// field, which holds the block size there.
pub fn detect(header: &[u8]) -> Option<DiscFormat> {
    if header.len() < CSO_HEADER_SIZE as usize {
        return None;
    }
    let format = match &header[..4] {
        m if m == CSO_MAGIC => DiscFormat::Cso,
        m if m == ZSO_MAGIC => DiscFormat::Zso,
        _ => return None,
    };
    let header_size = le_u32(header, 4);
    if header_size != 0 && header_size != CSO_HEADER_SIZE as u32 {
        return None;
    }
    let block_size = le_u32(header, 0x10);
    (block_size.is_power_of_two() && block_size >= MIN_BLOCK_SIZE).then_some(format)
}

/// Parse and validate a CSO/ZSO image and wrap it in a reader.
pub fn open(stream: SharedStream, options: &Options) -> Result<CsoReader> {
    let mapper = CsoMapper::parse(&stream, options)?;
    SparseReader::new(stream, mapper)
}

#[derive(Debug, Clone, Copy)]
struct StoredBlock {
    len: u32,
    plain: bool,
}

/// Block mapper for CSO and ZSO.
pub struct CsoMapper {
    format: DiscFormat,
    block_size: u32,
    uncompressed_size: u64,
    positions: Vec<u64>,
    blocks: Vec<StoredBlock>,
    codec: Arc<dyn Codec>,
    stored: Arc<dyn Codec>,
}

impl fmt::Debug for CsoMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsoMapper")
            .field("format", &self.format)
            .field("block_size", &self.block_size)
            .field("uncompressed_size", &self.uncompressed_size)
            .field("blocks", &self.blocks.len())
            .field("codec", &self.codec.name())
            .finish()
    }
}

impl CsoMapper {
    /// Read the header and index from `stream`.
    pub fn parse(stream: &SharedStream, options: &Options) -> Result<Self> {
        if stream.size() < CSO_HEADER_SIZE {
            return Err(reject(format!("file is {} bytes, smaller than the header", stream.size())));
        }
        let mut header = [0u8; CSO_HEADER_SIZE as usize];
        stream.read_exact_at(0, &mut header)?;

        let (format, codec_id) = match &header[..4] {
            m if m == CSO_MAGIC => (DiscFormat::Cso, CODEC_DEFLATE),
            m if m == ZSO_MAGIC => (DiscFormat::Zso, CODEC_LZ4),
            _ => return Err(Error::unsupported("missing CSO/ZSO magic")),
        };
        let header_size = le_u32(&header, 4);
        let uncompressed_size = le_u64(&header, 8);
        let block_size = le_u32(&header, 0x10);
        let version = header[0x14];
        let align = header[0x15];

        if header_size != 0 && header_size != CSO_HEADER_SIZE as u32 {
            return Err(reject(format!("header size {:#x}", header_size)));
        }
        if version > MAX_VERSION {
            return Err(Error::unsupported(format!("{} version {} not supported", format, version)));
        }
        if !block_size.is_power_of_two() || block_size < MIN_BLOCK_SIZE {
            return Err(reject(format!("block size {:#x}", block_size)));
        }
        options.check_block_size(block_size as u64)?;
        if align > MAX_ALIGN {
            return Err(reject(format!("index alignment shift {}", align)));
        }

        let block_count = uncompressed_size.div_ceil(block_size as u64);
        let entries = block_count + 1;
        options.check_index_entries(entries)?;
        if !stream.contains(CSO_HEADER_SIZE, entries * 4) {
            return Err(reject(format!("index of {} entries runs past end of file", entries)));
        }
        let mut raw = vec![0u8; entries as usize * 4];
        stream.read_exact_at(CSO_HEADER_SIZE, &mut raw)?;

        let positions: Vec<u64> = (0..entries as usize)
            .map(|i| ((le_u32(&raw, i * 4) & !PLAIN_FLAG) as u64) << align)
            .collect();
        let max_stored = block_size as u64 + (1u64 << align);

        let mut blocks = Vec::with_capacity(block_count as usize);
        for idx in 0..block_count as usize {
            let (start, end) = (positions[idx], positions[idx + 1]);
            if start > end || end > stream.size() {
                return Err(reject(format!(
                    "block {} spans {:#x}..{:#x}, file is {} bytes",
                    idx,
                    start,
                    end,
                    stream.size()
                )));
            }
            let len = end - start;
            if len > max_stored {
                return Err(reject(format!("block {} has stored length {}", idx, len)));
            }

            let plain = le_u32(&raw, idx * 4) & PLAIN_FLAG != 0;
            let logical = logical_len(uncompressed_size, block_size, idx as u64);
            if plain && len < logical {
                return Err(reject(format!("plain block {} stores {} of {} bytes", idx, len, logical)));
            }
            if !plain && len == 0 {
                return Err(reject(format!("compressed block {} is empty", idx)));
            }
            blocks.push(StoredBlock { len: len as u32, plain });
        }

        let lookup = |id| vdisc_codecs::codec_by_id(id).map_err(|e| Error::unsupported(e.to_string()));
        let codec = lookup(codec_id)?;
        let stored = lookup(CODEC_STORED)?;

        debug!(
            "{}: version {}, {} blocks of {:#x}, align {}, disc size {}",
            format, version, block_count, block_size, align, uncompressed_size
        );

        Ok(Self { format, block_size, uncompressed_size, positions, blocks, codec, stored })
    }

    /// Which of the two variants this image is.
    pub fn format(&self) -> DiscFormat {
        self.format
    }
}

fn logical_len(total: u64, block_size: u32, idx: u64) -> u64 {
    total.saturating_sub(idx * block_size as u64).min(block_size as u64)
}

impl BlockMapper for CsoMapper {
    fn format_name(&self) -> &'static str {
        self.format.name()
    }

    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn disc_size(&self) -> u64 {
        self.uncompressed_size
    }

    fn resolve(&self, block_idx: u64) -> BlockAddress {
        if block_idx < self.blocks.len() as u64 {
            BlockAddress::Physical(self.positions[block_idx as usize])
        } else {
            BlockAddress::Invalid
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

        let raw_len = logical_len(self.uncompressed_size, self.block_size, block_idx) as usize;
        let codec = if block.plain { &self.stored } else { &self.codec };
        codec
            .decompress_block(&stored, raw_len)
            .map_err(|source| Error::Decompression { index: block_idx, source })
    }
}
