//! WBFS images (Wii discs stored in a WBFS partition file).
//!
//! Only the first disc slot is read. Its WLBA table maps each logical WBFS
//! block of the Wii disc to a block of the partition; WLBA 0 is the
//! partition header itself and marks an unallocated block.
//!
//! ```text
//! 0x00        "WBFS"
//! 0x04        n_hd_sec: u32 BE
//! 0x08        hd_sec_sz_s: u8      (hd sector = 1 << s)
//! 0x09        wbfs_sec_sz_s: u8    (WBFS block = 1 << s)
//! 0x0C        disc table: u8 per slot, non-zero = in use
//! hd_sec_sz   disc info: 0x100-byte disc header copy, then u16 BE WLBA table
//! ```

use log::{debug, warn};
use vdisc_core::format::{be_u16, be_u32};
use vdisc_core::{
    BlockAddress, BlockMapper, DiscFormat, Error, Options, Result, SharedStream, SparseReader,
};

/// Magic at offset 0.
pub const WBFS_MAGIC: &[u8; 4] = b"WBFS";

const DISC_TABLE_OFFSET: usize = 12;
const DISC_HEADER_COPY_SIZE: u64 = 0x100;

const WII_SECTOR_SIZE_SHIFT: u32 = 15;
/// Sectors on a dual-layer Wii disc.
const WII_SECTORS_PER_DISC: u64 = 143432 * 2;

const HD_SEC_SHIFT_RANGE: std::ops::RangeInclusive<u8> = 9..=12;
const WBFS_SEC_SHIFT_RANGE: std::ops::RangeInclusive<u8> = 15..=30;

/// Reader over a WBFS image.
pub type WbfsReader = SparseReader<WbfsMapper>;

fn reject(msg: String) -> Error {
    warn!("WBFS: {}", msg);
    Error::Corrupt(msg)
}

/// Recognize a WBFS header. Needs at least 13 bytes.
pub fn detect(header: &[u8]) -> Option<DiscFormat> {
    if header.len() <= DISC_TABLE_OFFSET || &header[..4] != WBFS_MAGIC {
        return None;
    }
    let shifts_ok =
        HD_SEC_SHIFT_RANGE.contains(&header[8]) && WBFS_SEC_SHIFT_RANGE.contains(&header[9]);
    (shifts_ok && header[DISC_TABLE_OFFSET] != 0).then_some(DiscFormat::Wbfs)
}

/// Parse and validate a WBFS image and wrap it in a reader.
pub fn open(stream: SharedStream, options: &Options) -> Result<WbfsReader> {
    let mapper = WbfsMapper::parse(&stream, options)?;
    SparseReader::new(stream, mapper)
}

/// Block mapper for WBFS.
#[derive(Debug)]
pub struct WbfsMapper {
    block_shift: u32,
    disc_size: u64,
    wlba: Vec<u16>,
}

impl WbfsMapper {
    /// Read the partition header and the first disc's WLBA table.
    pub fn parse(stream: &SharedStream, options: &Options) -> Result<Self> {
        let mut head = [0u8; DISC_TABLE_OFFSET + 1];
        if stream.size() < head.len() as u64 {
            return Err(reject(format!("file is {} bytes, too small for a header", stream.size())));
        }
        stream.read_exact_at(0, &mut head)?;

        if &head[..4] != WBFS_MAGIC {
            return Err(Error::unsupported("missing WBFS magic"));
        }
        let n_hd_sec = be_u32(&head, 4);
        let hd_sec_shift = head[8];
        let block_shift = head[9];
        if !HD_SEC_SHIFT_RANGE.contains(&hd_sec_shift) {
            return Err(Error::unsupported(format!("hd sector shift {} not supported", hd_sec_shift)));
        }
        if !WBFS_SEC_SHIFT_RANGE.contains(&block_shift) {
            return Err(Error::unsupported(format!("WBFS sector shift {} not supported", block_shift)));
        }
        options.check_block_size(1u64 << block_shift)?;
        if head[DISC_TABLE_OFFSET] == 0 {
            return Err(reject("first disc slot is empty".into()));
        }

        let hd_sec_sz = 1u64 << hd_sec_shift;
        let block_size = 1u64 << block_shift;
        let entries = (WII_SECTORS_PER_DISC << WII_SECTOR_SIZE_SHIFT) >> block_shift;
        options.check_index_entries(entries)?;

        let table_offset = hd_sec_sz + DISC_HEADER_COPY_SIZE;
        let table_len = entries * 2;
        if !stream.contains(table_offset, table_len) {
            return Err(reject(format!(
                "WLBA table at {:#x} ({} bytes) runs past end of file",
                table_offset, table_len
            )));
        }
        let mut raw = vec![0u8; table_len as usize];
        stream.read_exact_at(table_offset, &mut raw)?;
        let wlba: Vec<u16> = (0..entries as usize).map(|i| be_u16(&raw, i * 2)).collect();

        let mut last_used = None;
        for (idx, &lba) in wlba.iter().enumerate() {
            if lba == 0 {
                continue;
            }
            let addr = (lba as u64) << block_shift;
            if !stream.contains(addr, block_size) {
                return Err(reject(format!(
                    "block {} maps to {:#x}, past end of file ({} bytes)",
                    idx,
                    addr,
                    stream.size()
                )));
            }
            last_used = Some(idx);
        }
        let last_used = last_used.ok_or_else(|| reject("WLBA table has no allocated blocks".into()))?;

        let disc_size = (last_used as u64 + 1) * block_size;
        debug!(
            "WBFS: {} hd sectors of {} bytes, block size {:#x}, {} table entries, disc size {}",
            n_hd_sec, hd_sec_sz, block_size, entries, disc_size
        );

        Ok(Self { block_shift: block_shift as u32, disc_size, wlba })
    }
}

impl BlockMapper for WbfsMapper {
    fn format_name(&self) -> &'static str {
        "WBFS"
    }

    fn block_size(&self) -> u32 {
        1 << self.block_shift
    }

    fn disc_size(&self) -> u64 {
        self.disc_size
    }

    fn resolve(&self, block_idx: u64) -> BlockAddress {
        match self.wlba.get(block_idx as usize) {
            Some(0) => BlockAddress::Empty,
            Some(&lba) => BlockAddress::Physical((lba as u64) << self.block_shift),
            None => BlockAddress::Invalid,
        }
    }
}
