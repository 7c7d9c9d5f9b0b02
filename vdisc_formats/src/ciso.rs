//! GameCube/Wii CISO images.
//!
//! A presence map marks which logical blocks are stored; absent blocks read
//! as zeros. Stored blocks follow the header in logical order.
//!
//! ```text
//! 0x0000  "CISO"
//! 0x0004  block_size: u32 LE
//! 0x0008  block map: 0x7FF8 bytes (0 = absent, 1 = present)
//! 0x8000  present blocks, block_size bytes each
//! ```

use log::{debug, warn};
use vdisc_core::format::le_u32;
use vdisc_core::{
    BlockAddress, BlockMapper, DiscFormat, Error, Options, Result, SharedStream, SparseReader,
};

/// Magic at offset 0.
pub const CISO_MAGIC: &[u8; 4] = b"CISO";
/// Size of the header, including the block map.
pub const CISO_HEADER_SIZE: u64 = 0x8000;
/// Entries in the block map.
pub const CISO_MAP_SIZE: usize = 0x7FF8;

const BLOCK_SIZE_MIN: u32 = 0x8000;
const BLOCK_SIZE_MAX: u32 = 16 * 1024 * 1024;

/// Reader over a CISO image.
pub type CisoReader = SparseReader<CisoMapper>;

fn valid_block_size(block_size: u32) -> bool {
    block_size.is_power_of_two() && (BLOCK_SIZE_MIN..=BLOCK_SIZE_MAX).contains(&block_size)
}

fn reject(msg: String) -> Error {
    warn!("CISO: {}", msg);
    Error::Corrupt(msg)
}

/// Recognize a CISO header. Needs at least 8 bytes.
pub fn detect(header: &[u8]) -> Option<DiscFormat> {
    if header.len() < 8 || &header[..4] != CISO_MAGIC {
        return None;
    }
    valid_block_size(le_u32(header, 4)).then_some(DiscFormat::GcnCiso)
}

/// Parse and validate a CISO image and wrap it in a reader.
pub fn open(stream: SharedStream, options: &Options) -> Result<CisoReader> {
    let mapper = CisoMapper::parse(&stream, options)?;
    SparseReader::new(stream, mapper)
}

/// Block mapper for CISO.
#[derive(Debug)]
pub struct CisoMapper {
    block_size: u32,
    disc_size: u64,
    /// Physical slot of each logical block up to the last present one.
    slots: Vec<Option<u32>>,
    present: u32,
}

impl CisoMapper {
    /// Read the header and block map from `stream`.
    pub fn parse(stream: &SharedStream, options: &Options) -> Result<Self> {
        if stream.size() < CISO_HEADER_SIZE {
            return Err(reject(format!("file is {} bytes, smaller than the header", stream.size())));
        }
        let mut header = vec![0u8; CISO_HEADER_SIZE as usize];
        stream.read_exact_at(0, &mut header)?;

        if &header[..4] != CISO_MAGIC {
            return Err(Error::unsupported("missing CISO magic"));
        }
        let block_size = le_u32(&header, 4);
        if !valid_block_size(block_size) {
            return Err(Error::unsupported(format!("CISO block size {:#x} not supported", block_size)));
        }
        options.check_block_size(block_size as u64)?;

        let mut slots = Vec::with_capacity(CISO_MAP_SIZE);
        let mut present = 0u32;
        let mut last_present = None;
        for (idx, &flag) in header[8..].iter().enumerate() {
            match flag {
                0 => slots.push(None),
                1 => {
                    slots.push(Some(present));
                    present += 1;
                    last_present = Some(idx);
                }
                other => {
                    return Err(reject(format!("block map entry {} has value {:#04x}", idx, other)));
                }
            }
        }

        let last_present = last_present.ok_or_else(|| reject("block map has no present blocks".into()))?;
        slots.truncate(last_present + 1);

        // Stored blocks are contiguous, so checking the end of the last one
        // covers every entry.
        let data_end = CISO_HEADER_SIZE + present as u64 * block_size as u64;
        if data_end > stream.size() {
            return Err(reject(format!(
                "{} present blocks need {} bytes, file has {}",
                present,
                data_end,
                stream.size()
            )));
        }

        let disc_size = slots.len() as u64 * block_size as u64;
        debug!(
            "CISO: {} of {} blocks present, block size {:#x}, disc size {}",
            present,
            slots.len(),
            block_size,
            disc_size
        );

        Ok(Self { block_size, disc_size, slots, present })
    }

    /// Number of blocks actually stored in the file.
    pub fn present_blocks(&self) -> u32 {
        self.present
    }
}

impl BlockMapper for CisoMapper {
    fn format_name(&self) -> &'static str {
        "CISO"
    }

    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn disc_size(&self) -> u64 {
        self.disc_size
    }

    fn resolve(&self, block_idx: u64) -> BlockAddress {
        match self.slots.get(block_idx as usize) {
            Some(Some(slot)) => {
                BlockAddress::Physical(CISO_HEADER_SIZE + *slot as u64 * self.block_size as u64)
            }
            Some(None) => BlockAddress::Empty,
            None if (block_idx as usize) < CISO_MAP_SIZE => BlockAddress::Empty,
            None => BlockAddress::Invalid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use vdisc_core::DiscReader;

    const BS: usize = 0x8000;

    /// Build a CISO image. `map[i]` is the fill byte for a present block.
    fn build(map: &[Option<u8>]) -> Vec<u8> {
        let mut out = vec![0u8; CISO_HEADER_SIZE as usize];
        out[..4].copy_from_slice(CISO_MAGIC);
        out[4..8].copy_from_slice(&(BS as u32).to_le_bytes());
        for (i, entry) in map.iter().enumerate() {
            if let Some(fill) = entry {
                out[8 + i] = 1;
                out.extend(std::iter::repeat(*fill).take(BS));
            }
        }
        out
    }

    fn stream(bytes: Vec<u8>) -> SharedStream {
        SharedStream::new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn test_detect() {
        let image = build(&[Some(1)]);
        assert_eq!(detect(&image[..16]), Some(DiscFormat::GcnCiso));

        // PSP CSO shares the magic but has a 0x18 header size at offset 4.
        let mut psp = image[..16].to_vec();
        psp[4..8].copy_from_slice(&0x18u32.to_le_bytes());
        assert_eq!(detect(&psp), None);

        assert_eq!(detect(b"CISO"), None);
        assert_eq!(detect(b"WBFS\0\0\0\0"), None);
    }

    #[test]
    fn test_present_and_absent_blocks() {
        let mut reader = open(stream(build(&[Some(0xAA), None, Some(0xBB)])), &Options::default()).unwrap();
        assert_eq!(reader.size(), 3 * BS as u64);
        assert_eq!(reader.mapper().present_blocks(), 2);

        let mut buf = vec![0u8; 3 * BS];
        assert_eq!(reader.read(&mut buf), 3 * BS);
        assert!(buf[..BS].iter().all(|&b| b == 0xAA));
        assert!(buf[BS..2 * BS].iter().all(|&b| b == 0));
        assert!(buf[2 * BS..].iter().all(|&b| b == 0xBB));
    }

    #[test]
    fn test_resolve() {
        let mapper = CisoMapper::parse(&stream(build(&[None, Some(1), Some(2)])), &Options::default()).unwrap();
        assert_eq!(mapper.resolve(0), BlockAddress::Empty);
        assert_eq!(mapper.resolve(1), BlockAddress::Physical(0x8000));
        assert_eq!(mapper.resolve(2), BlockAddress::Physical(0x8000 + BS as u64));
        assert_eq!(mapper.resolve(100), BlockAddress::Empty);
        assert_eq!(mapper.resolve(CISO_MAP_SIZE as u64), BlockAddress::Invalid);
    }

    #[test]
    fn test_bad_map_entry_rejected() {
        let mut image = build(&[Some(1)]);
        image[9] = 2;
        let err = CisoMapper::parse(&stream(image), &Options::default()).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn test_truncated_data_rejected() {
        let mut image = build(&[Some(1), Some(2)]);
        image.truncate(image.len() - 1);
        let err = CisoMapper::parse(&stream(image), &Options::default()).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn test_empty_map_rejected() {
        let err = CisoMapper::parse(&stream(build(&[None, None])), &Options::default()).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn test_block_size_limits() {
        let mut image = build(&[Some(1)]);
        image[4..8].copy_from_slice(&0x9000u32.to_le_bytes());
        assert!(matches!(
            CisoMapper::parse(&stream(image), &Options::default()),
            Err(Error::Unsupported(_))
        ));

        let options = Options::default().max_block_size(0x4000);
        assert!(CisoMapper::parse(&stream(build(&[Some(1)])), &options).is_err());
    }
}
