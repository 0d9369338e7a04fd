//! Content hashing primitives for asset lumps
//!
//! This crate provides the two hash functions the lump pipeline relies on:
//!
//! - **Asset identity**: XXH3-64 over an asset's serialized bytes yields its
//!   [`AssetId`]. Bit-identical assets always share an id, which is what
//!   deduplication is built on.
//! - **Lump integrity**: XXH32 over a lump's uncompressed payload, computed
//!   incrementally so large lumps can be verified without loading them
//!   whole. See [`StreamingChecksum`].
//!
//! # Examples
//!
//! ## Asset Id Generation
//!
//! ```
//! use lumpkit_hash::AssetId;
//!
//! let id = AssetId::from_data(b"serialized mesh");
//! assert_eq!(id, AssetId::from_data(b"serialized mesh"));
//! assert!(!id.is_null());
//! println!("Asset id: {id}");
//! ```
//!
//! ## Lump Checksums
//!
//! ```
//! use lumpkit_hash::{HashMethod, StreamingChecksum, checksum_bytes};
//!
//! let mut state = StreamingChecksum::new();
//! state.update(b"first half, ");
//! state.update(b"second half");
//!
//! let whole = checksum_bytes(HashMethod::XxHash32, b"first half, second half")?;
//! assert_eq!(state.finish(), whole);
//! # Ok::<(), lumpkit_hash::HashError>(())
//! ```

#![warn(missing_docs)]

pub mod asset_id;
pub mod checksum;
pub mod error;

pub use asset_id::AssetId;
pub use checksum::{
    HashMethod, LOAD_CHUNK_SIZE, StreamingChecksum, checksum_bytes, checksum_reader, xxh32_digest,
};
pub use error::HashError;
