/// Per-block decompression abstraction.
///
/// Each `Codec` implementation:
/// - Is identified by a stable numeric `id()` (see the `CODEC_*` constants in
///   [`format`](crate::format)).
/// - Decodes one stored block independently of every other block. Containers
///   that use a codec never carry state across blocks, which is what lets the
///   sparse engine materialize any block on its own.
/// - Is a black box to the engine: failures come back as `anyhow::Error` and
///   are wrapped into [`Error::Decompression`](crate::Error::Decompression).
pub trait Codec: Send + Sync {
    /// Stable codec ID.
    fn id(&self) -> u16;

    /// Human-readable codec name for logging.
    fn name(&self) -> &'static str;

    /// Decode a single stored block, producing at most `raw_len` bytes.
    ///
    /// Shorter output is returned as-is; the engine rejects a read that
    /// needs bytes the block does not have.
    fn decompress_block(&self, stored: &[u8], raw_len: usize) -> anyhow::Result<Vec<u8>>;
}
