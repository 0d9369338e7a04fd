//! Error types for manifest parsing and building

use lumpkit_hash::AssetId;
use thiserror::Error;

/// Errors that can occur when parsing, validating or building manifests
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Invalid magic signature detected
    #[error("Invalid manifest magic: expected 'LMNF', got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported manifest format version
    #[error("Unsupported manifest version: {0}")]
    UnsupportedVersion(u32),

    /// Header count does not match the data that follows
    #[error("{field} count mismatch: header says {expected}, found {actual}")]
    CountMismatch {
        /// Which list disagrees with its header count
        field: &'static str,
        /// Count recorded in the header
        expected: usize,
        /// Count actually present
        actual: usize,
    },

    /// A list is too long for its 32-bit count field
    #[error("Too many {field}: {count}")]
    TooManyEntries {
        /// Which list overflowed
        field: &'static str,
        /// Number of entries
        count: usize,
    },

    /// The null sentinel appears as a packed asset
    #[error("Null asset id packed in lump {lump}")]
    NullAsset {
        /// Lump index holding the null entry
        lump: usize,
    },

    /// The same asset id is packed more than once
    #[error("Asset {0} is packed more than once")]
    DuplicateAsset(AssetId),

    /// An initial asset id is not packed in any lump
    #[error("Initial asset {0} does not resolve to any lump")]
    UnresolvedInitialAsset(AssetId),

    /// Unparsed bytes after the initial asset list
    #[error("{0} trailing bytes after manifest")]
    TrailingData(usize),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `BinRW` parsing/writing error
    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Type alias for manifest operation results
pub type ManifestResult<T> = std::result::Result<T, ManifestError>;
