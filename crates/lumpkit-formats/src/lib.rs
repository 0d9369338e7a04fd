//! Builder and reader for content-addressed, compressed asset lumps
//!
//! This crate packages opaque, already-serialized engine assets (meshes,
//! textures, materials, prefabs, scripts) into size-capped binary containers
//! called *lumps*, and loads them back on the runtime side.
//!
//! # Components
//!
//! - **[`lump::LumpBuilder`]**: accumulates serialized assets into capped
//!   lumps, deduplicates by content hash, compresses each lump once, and
//!   writes the lump files plus a manifest.
//! - **[`lump::LumpReader`]**: lazily opens one lump file, verifies its
//!   length and checksum, decompresses it once, and serves byte ranges.
//! - **[`manifest::Manifest`]**: the persisted index of every lump and the
//!   assets inside it.
//! - **[`bundle::Bundle`]**: resolves asset ids across all lumps of a bundle
//!   under a [`config::LoadPolicy`].
//!
//! # Example
//!
//! ```rust,no_run
//! use lumpkit_formats::bundle::Bundle;
//! use lumpkit_formats::config::{BuilderConfig, LoadPolicy};
//! use lumpkit_formats::lump::LumpBuilder;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut builder = LumpBuilder::new(BuilderConfig::default());
//! let mesh = builder.add_asset(b"serialized mesh")?;
//! let prefab = builder.add_asset(b"serialized prefab")?;
//! builder.add_initial_asset(prefab);
//! builder.build("bundle", "registry.bin")?;
//!
//! let mut bundle = Bundle::open("bundle", "registry.bin", LoadPolicy::default())?;
//! assert_eq!(bundle.load_asset(mesh)?, b"serialized mesh");
//! # Ok(())
//! # }
//! ```

#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![warn(missing_docs)]

pub mod bundle;
pub mod config;
pub mod lump;
pub mod manifest;

// Test utilities module
#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod test_utils;

pub use lumpkit_hash::{AssetId, HashMethod};

/// Common trait for the crate's persisted binary formats
pub trait LumpFormat: Sized {
    /// Parse from bytes
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>>;

    /// Build to bytes
    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>>;

    /// Verify round-trip correctness
    fn verify_round_trip(data: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
        let parsed = Self::parse(data)?;
        let rebuilt = parsed.build()?;
        if data != rebuilt.as_slice() {
            return Err("Round-trip verification failed".into());
        }
        Ok(())
    }
}
