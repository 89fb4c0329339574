//! Compression for persisted metadata.
//!
//! The episode cache can be stored either as plain JSON or gzip-compressed
//! JSON. This crate hides the difference behind the [`Compression`] enum:
//!
//! - **Format detection** from magic bytes ([`Compression::from_magic_bytes`]),
//!   so a cache is readable whatever name it was stored under
//! - **In-memory** compression/decompression ([`Compression::compress`],
//!   [`Compression::decompress`])
//!
//! Gzip uses the default level; cache files are small and rewritten after
//! every chapter, so speed matters more than the last few bytes.

mod construct;
pub mod error;
mod ops;
#[cfg(feature = "serde")]
mod serialize;
mod util;

/// A supported compression format.
///
/// Defaults to [`None`](Self::None) (uncompressed).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Uncompressed
    #[default]
    None,
    /// Gzip compression (.gz)
    Gzip,
}
