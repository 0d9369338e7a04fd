//! Lump building and loading
//!
//! A lump is one file holding the concatenated bytes of many serialized
//! assets, optionally compressed as a whole. The [`LumpBuilder`] packs assets
//! into size-capped lumps and writes them alongside a
//! [`Manifest`](crate::manifest::Manifest); the [`LumpReader`] opens one lump
//! file, verifies it against its manifest entry and serves byte ranges from
//! the decompressed payload.
//!
//! # Lump Layout
//!
//! ```text
//! uncompressed: [asset 0][asset 1][asset 2]...
//! on disk:      LZ4 frame of the above, or the raw bytes
//! ```
//!
//! There is no per-lump header; ids, sizes and the checksum live in the
//! manifest.

mod builder;
mod compression;
mod error;
mod reader;

pub use builder::LumpBuilder;
pub use compression::{
    CompressionMethod, FrameHeader, LZ4_FRAME_MAGIC, LZ4_MAX_HEADER_SIZE,
    MAX_DECOMPRESSION_SIZE, compress_lump, decode_frame_into, decompress_lump,
};
pub use error::{LumpError, LumpResult};
pub use reader::LumpReader;
