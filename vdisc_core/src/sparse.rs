//! Sparse block engine.
//!
//! Turns arbitrary byte-range reads into per-block work for containers that
//! store a subset of fixed-size logical blocks, possibly compressed, behind a
//! per-format index table:
//!
//! ```text
//!  logical:  [ blk 0 ][ blk 1 ][ blk 2 ][ blk 3 ] ...
//!               |        |        |        |
//!  resolve:  Physical  Empty   Physical  Invalid
//!               |        |        |        |
//!  output:   mapper    zeros    mapper    stop, error recorded
//! ```
//!
//! The format-specific half lives behind [`BlockMapper`]: it parses and
//! validates the header at construction and answers "where is block N".
//! The engine owns the cursor and a single-slot cache of the most recently
//! materialized block.

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::reader::DiscReader;
use crate::stream::SharedStream;

/// Where a logical block lives in the backing stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockAddress {
    /// Not allocated; reads as zeros.
    Empty,
    /// No such block in the index table.
    Invalid,
    /// Byte offset of the stored block in the backing stream.
    Physical(u64),
}

/// Format-specific half of a sparse reader.
///
/// Implementations parse their header and index table up front and must
/// reject any entry whose stored bytes would fall outside the backing
/// stream. After construction, [`resolve`](Self::resolve) is a pure table
/// lookup.
pub trait BlockMapper: Send {
    /// Short format name for logging.
    fn format_name(&self) -> &'static str;

    /// Logical block size in bytes. Never zero.
    fn block_size(&self) -> u32;

    /// Total logical size of the image in bytes.
    fn disc_size(&self) -> u64;

    /// Map a logical block index to its stored location.
    fn resolve(&self, block_idx: u64) -> BlockAddress;

    /// Produce the full logical contents of `block_idx`, stored at `phys_addr`.
    ///
    /// The default reads one uncompressed block verbatim. Compressed formats
    /// override this to read the stored length and decode it.
    fn materialize_block(
        &self,
        stream: &SharedStream,
        _block_idx: u64,
        phys_addr: u64,
    ) -> Result<Vec<u8>> {
        let mut block = vec![0u8; self.block_size() as usize];
        stream.read_exact_at(phys_addr, &mut block)?;
        Ok(block)
    }
}

/// Counters for the block cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Calls into [`BlockMapper::materialize_block`].
    pub materializations: u64,
    /// Block accesses served from the cache.
    pub hits: u64,
}

struct CachedBlock {
    index: u64,
    data: Vec<u8>,
}

/// Random-access reader over a block-mapped container.
pub struct SparseReader<M> {
    stream: SharedStream,
    mapper: M,
    block_size: u64,
    total_size: u64,
    pos: u64,
    cache: Option<CachedBlock>,
    stats: CacheStats,
    last_error: Option<Error>,
}

impl<M: BlockMapper> SparseReader<M> {
    /// Build a reader from a stream and an already validated mapper.
    pub fn new(stream: SharedStream, mapper: M) -> Result<Self> {
        let block_size = mapper.block_size() as u64;
        if block_size == 0 {
            return Err(Error::corrupt(format!("{}: block size is zero", mapper.format_name())));
        }
        let total_size = mapper.disc_size();
        debug!(
            "{}: {} logical bytes in blocks of {} bytes",
            mapper.format_name(),
            total_size,
            block_size
        );

        Ok(Self {
            stream,
            mapper,
            block_size,
            total_size,
            pos: 0,
            cache: None,
            stats: CacheStats::default(),
            last_error: None,
        })
    }

    /// The format-specific mapper.
    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Logical block size in bytes.
    pub fn block_size(&self) -> u32 {
        self.block_size as u32
    }

    /// Number of logical blocks covering the image.
    pub fn block_count(&self) -> u64 {
        self.total_size.div_ceil(self.block_size)
    }

    /// Cache counters since construction.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Index of the block currently held by the cache.
    pub fn cached_block_index(&self) -> Option<u64> {
        self.cache.as_ref().map(|c| c.index)
    }

    /// Fill `dst` from `block_idx`, starting `offset` bytes into the block.
    fn copy_from_block(&mut self, block_idx: u64, offset: usize, dst: &mut [u8]) -> Result<()> {
        match self.mapper.resolve(block_idx) {
            BlockAddress::Empty => {
                dst.fill(0);
                Ok(())
            }
            BlockAddress::Invalid => {
                debug!("{}: block {} has no index entry", self.mapper.format_name(), block_idx);
                Err(Error::BlockOutOfRange { index: block_idx })
            }
            BlockAddress::Physical(addr) => {
                let end = offset + dst.len();
                let block = self.cached_block(block_idx, addr)?;
                if block.len() < end {
                    return Err(Error::corrupt(format!(
                        "block {} holds {} bytes, needed {}",
                        block_idx,
                        block.len(),
                        end
                    )));
                }
                dst.copy_from_slice(&block[offset..end]);
                Ok(())
            }
        }
    }

    /// Return the contents of `block_idx`, materializing it on a cache miss.
    ///
    /// A miss drops the previous entry before materializing, so a failed
    /// block leaves the cache empty.
    fn cached_block(&mut self, block_idx: u64, addr: u64) -> Result<&[u8]> {
        let entry = match self.cache.take() {
            Some(cached) if cached.index == block_idx => {
                self.stats.hits += 1;
                cached
            }
            _ => {
                trace!(
                    "{}: materializing block {} at {:#x}",
                    self.mapper.format_name(),
                    block_idx,
                    addr
                );
                let data = self.mapper.materialize_block(&self.stream, block_idx, addr)?;
                self.stats.materializations += 1;
                CachedBlock { index: block_idx, data }
            }
        };
        Ok(&self.cache.insert(entry).data)
    }
}

impl<M: BlockMapper> DiscReader for SparseReader<M> {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut remaining = (buf.len() as u64).min(self.total_size - self.pos) as usize;
        let mut copied = 0;

        while remaining > 0 {
            let block_idx = self.pos / self.block_size;
            let offset = (self.pos % self.block_size) as usize;
            let chunk = remaining.min(self.block_size as usize - offset);

            if let Err(e) = self.copy_from_block(block_idx, offset, &mut buf[copied..copied + chunk]) {
                self.last_error = Some(e);
                break;
            }

            copied += chunk;
            remaining -= chunk;
            self.pos += chunk as u64;
        }

        copied
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.total_size {
            let msg = format!("seek to {} beyond image size {}", pos, self.total_size);
            self.last_error = Some(Error::invalid_argument(msg.clone()));
            return Err(Error::invalid_argument(msg));
        }
        self.pos = pos;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> u64 {
        self.total_size
    }

    fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    fn clear_error(&mut self) {
        self.last_error = None;
    }

    fn take_error(&mut self) -> Option<Error> {
        self.last_error.take()
    }
}
