//! Error types for lump building and loading

use lumpkit_hash::{AssetId, HashError};
use thiserror::Error;

use crate::manifest::ManifestError;

/// Lump operation result type
pub type LumpResult<T> = Result<T, LumpError>;

/// Errors raised while packing, finalizing or loading lumps
#[derive(Debug, Error)]
pub enum LumpError {
    /// Serialized asset is larger than a whole lump
    #[error("Asset of {size} bytes exceeds maximum lump size of {max} bytes")]
    AssetTooLarge {
        /// Serialized asset size
        size: usize,
        /// Configured lump capacity
        max: usize,
    },

    /// Content-identical asset was already added in this build session
    #[error("Duplicate asset {0}")]
    DuplicateAsset(AssetId),

    /// Internal invariant violated by the calling sequence
    #[error("Bad lump contents: {0}")]
    BadContents(String),

    /// Asset size cannot be represented in a manifest entry
    #[error("Asset size {0} does not fit the 32-bit manifest size field")]
    BadSize(usize),

    /// Requested byte range lies outside the decompressed lump
    #[error("Asset range {offset}+{size} exceeds lump size of {available} bytes")]
    RangeExceeded {
        /// Requested start offset
        offset: usize,
        /// Requested length
        size: usize,
        /// Decompressed lump length
        available: usize,
    },

    /// Length or checksum verification failed
    #[error("Integrity check failed: {0}")]
    IntegrityFailure(String),

    /// Malformed compressed frame
    #[error("Malformed lump data: {0}")]
    FormatError(String),

    /// Initial asset is not packed in any lump
    #[error("Unresolved asset reference {0}")]
    UnresolvedAsset(AssetId),

    /// Hash or compression tag rejected under the strict policy
    #[error("Unknown {kind} method tag {tag:#04x}")]
    UnknownMethod {
        /// Which method family the tag belongs to
        kind: &'static str,
        /// Raw tag value
        tag: u8,
    },

    /// Asset requested before the lump was decompressed
    #[error("Lump has not been decompressed")]
    NotDecompressed,

    /// Lump previously failed to load and refuses further requests
    #[error("Lump {index} is unavailable: {reason}")]
    LumpUnavailable {
        /// Lump index in the manifest
        index: usize,
        /// Why the lump was dropped
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Manifest encode/decode error
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Hashing error
    #[error("Hash error: {0}")]
    Hash(#[from] HashError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LumpError {
    /// Whether the caller can carry on with the current session
    ///
    /// `DuplicateAsset` is success-by-dedup, oversized assets only affect the
    /// asset that was rejected, and integrity/range failures only affect the
    /// lump they were raised for.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DuplicateAsset(_)
                | Self::AssetTooLarge { .. }
                | Self::BadSize(_)
                | Self::RangeExceeded { .. }
                | Self::IntegrityFailure(_)
                | Self::FormatError(_)
                | Self::LumpUnavailable { .. }
        )
    }

    /// Whether this error reports corrupted or mismatched lump data
    pub fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            Self::IntegrityFailure(_) | Self::FormatError(_) | Self::RangeExceeded { .. }
        )
    }
}
