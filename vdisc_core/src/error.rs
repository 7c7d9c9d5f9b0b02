//! Error type shared by every reader in the workspace.
//!
//! Readers never panic on hostile container data. Construction returns
//! `Err`, and `read` records the failure so it can be fetched afterwards with
//! [`DiscReader::last_error`](crate::DiscReader::last_error).

use std::io;

use thiserror::Error;

/// The result type used throughout vdisc.
pub type Result<T> = std::result::Result<T, Error>;

/// POSIX error numbers reported by [`Error::errno`].
pub mod errno {
    /// I/O error.
    pub const EIO: i32 = 5;
    /// Bad file descriptor.
    pub const EBADF: i32 = 9;
    /// Invalid argument.
    pub const EINVAL: i32 = 22;
    /// Result out of range.
    pub const ERANGE: i32 = 34;
    /// Operation not supported.
    pub const ENOTSUP: i32 = 95;
}

/// Errors produced while opening or reading a disc image.
#[derive(Error, Debug)]
pub enum Error {
    /// The backing stream failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A caller-supplied argument was rejected (e.g. a seek past the end).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The index table has no entry for this logical block.
    #[error("Block {index} is out of range")]
    BlockOutOfRange {
        /// Logical block index that failed to resolve.
        index: u64,
    },

    /// The container header or index table is malformed.
    #[error("Corrupt disc image: {0}")]
    Corrupt(String),

    /// The container uses a feature or version that is not handled.
    #[error("Unsupported format: {0}")]
    Unsupported(String),

    /// A block could not be decompressed.
    #[error("Decompression of block {index} failed: {source}")]
    Decompression {
        /// Logical block index being materialized.
        index: u64,
        /// Error reported by the codec.
        #[source]
        source: anyhow::Error,
    },

    /// The backing stream handle is unusable.
    #[error("Bad stream handle: {0}")]
    BadStream(String),
}

impl Error {
    /// Creates a new corruption error.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new unsupported format error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    /// POSIX-style error number for hosts that only understand `errno`.
    ///
    /// I/O errors keep the OS code when the platform supplied one.
    pub fn errno(&self) -> i32 {
        match self {
            Error::Io(e) => e.raw_os_error().unwrap_or(errno::EIO),
            Error::InvalidArgument(_) => errno::EINVAL,
            Error::BlockOutOfRange { .. } => errno::ERANGE,
            Error::Corrupt(_) | Error::Decompression { .. } => errno::EIO,
            Error::Unsupported(_) => errno::ENOTSUP,
            Error::BadStream(_) => errno::EBADF,
        }
    }
}
