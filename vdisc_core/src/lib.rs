//! Virtual block-addressable reading layer for disc images.
//!
//! Every reader exposes the same read/seek/tell/size contract
//! ([`DiscReader`]) whether the image is a raw file, a window into a larger
//! file ([`PlainReader`]) or a sparse/compressed container driven by a
//! format-specific [`BlockMapper`] through the [`SparseReader`] engine.

pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod plain;
pub mod reader;
pub mod sparse;
pub mod stream;

pub use codec::Codec;
pub use config::Options;
pub use error::{Error, Result};
pub use format::DiscFormat;
pub use plain::PlainReader;
pub use reader::{DiscReader, ReaderStream};
pub use sparse::{BlockAddress, BlockMapper, CacheStats, SparseReader};
pub use stream::SharedStream;
