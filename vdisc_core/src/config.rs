//! Limits applied while parsing untrusted container headers.

/// Largest fixed header any detector needs to see.
pub const MIN_HEADER_PROBE_LEN: usize = 32;

/// Options controlling how containers are opened.
#[derive(Debug, Clone)]
pub struct Options {
    /// Largest block size a container may declare (in bytes).
    /// Default: 64MB
    pub max_block_size: u32,

    /// Largest index table a container may declare (in entries).
    /// Default: 16M entries
    pub max_index_entries: usize,

    /// Number of header bytes handed to format detection.
    /// Default: 512
    pub header_probe_len: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_block_size: 64 * 1024 * 1024,  // 64MB
            max_index_entries: 16 * 1024 * 1024, // 16M
            header_probe_len: 512,
        }
    }
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the largest accepted block size.
    pub fn max_block_size(mut self, size: u32) -> Self {
        self.max_block_size = size;
        self
    }

    /// Sets the largest accepted index table.
    pub fn max_index_entries(mut self, entries: usize) -> Self {
        self.max_index_entries = entries;
        self
    }

    /// Sets the number of header bytes read for detection.
    pub fn header_probe_len(mut self, len: usize) -> Self {
        self.header_probe_len = len;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_block_size == 0 {
            return Err(crate::Error::invalid_argument("max_block_size must be > 0"));
        }
        if self.max_index_entries == 0 {
            return Err(crate::Error::invalid_argument("max_index_entries must be > 0"));
        }
        if self.header_probe_len < MIN_HEADER_PROBE_LEN {
            return Err(crate::Error::invalid_argument(format!(
                "header_probe_len must be >= {}",
                MIN_HEADER_PROBE_LEN
            )));
        }
        Ok(())
    }

    /// Rejects a declared block size above `max_block_size`.
    pub fn check_block_size(&self, block_size: u64) -> crate::Result<()> {
        if block_size == 0 || block_size > self.max_block_size as u64 {
            return Err(crate::Error::unsupported(format!(
                "block size {} outside 1..={}",
                block_size, self.max_block_size
            )));
        }
        Ok(())
    }

    /// Rejects a declared index table larger than `max_index_entries`.
    pub fn check_index_entries(&self, entries: u64) -> crate::Result<()> {
        if entries > self.max_index_entries as u64 {
            return Err(crate::Error::corrupt(format!(
                "index table of {} entries exceeds limit of {}",
                entries, self.max_index_entries
            )));
        }
        Ok(())
    }
}
