/// Container variant selected by header detection.
///
/// Detection runs on a header buffer before any reader exists; the variant
/// tells the caller which reader to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscFormat {
    /// Uncompressed, contiguous image read through a [`PlainReader`](crate::PlainReader).
    Plain,
    /// GameCube/Wii CISO: sparse blocks behind a presence map.
    GcnCiso,
    /// WBFS: Wii disc stored in a WBFS partition file.
    Wbfs,
    /// GCZ: Dolphin's zlib-compressed block format.
    Gcz,
    /// PSP CSO: raw-deflate compressed blocks.
    Cso,
    /// PSP ZSO: LZ4 compressed blocks.
    Zso,
}

impl DiscFormat {
    /// Short human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::GcnCiso => "CISO",
            Self::Wbfs => "WBFS",
            Self::Gcz => "GCZ",
            Self::Cso => "CSO",
            Self::Zso => "ZSO",
        }
    }
}

impl std::fmt::Display for DiscFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── Codec IDs ──────────────────────────────────────────────────────────────

/// Block stored verbatim.
pub const CODEC_STORED: u16 = 0;
/// zlib stream (RFC 1950), as used by GCZ.
pub const CODEC_ZLIB: u16 = 1;
/// Raw deflate (RFC 1951), as used by CSO.
pub const CODEC_DEFLATE: u16 = 2;
/// LZ4 block format, as used by ZSO.
pub const CODEC_LZ4: u16 = 3;

// ── Field helpers ──────────────────────────────────────────────────────────
//
// Callers check the buffer length before slicing.

/// Little-endian `u32` at `off`.
#[inline]
pub fn le_u32(buf: &[u8], off: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[off..off + 4]);
    u32::from_le_bytes(b)
}

/// Little-endian `u64` at `off`.
#[inline]
pub fn le_u64(buf: &[u8], off: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(b)
}

/// Big-endian `u16` at `off`.
#[inline]
pub fn be_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([buf[off], buf[off + 1]])
}

/// Big-endian `u32` at `off`.
#[inline]
pub fn be_u32(buf: &[u8], off: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[off..off + 4]);
    u32::from_be_bytes(b)
}
