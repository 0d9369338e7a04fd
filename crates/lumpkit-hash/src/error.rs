//! Error types for hashing operations

use thiserror::Error;

/// Errors that can occur while hashing asset or lump data
#[derive(Debug, Error)]
pub enum HashError {
    /// Hash method tag is not one this crate can compute
    #[error("Unsupported hash method: {0:#04x}")]
    UnsupportedMethod(u8),

    /// Invalid asset id text
    #[error("Invalid asset id: {0}")]
    InvalidAssetId(String),

    /// Hex decoding error
    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// I/O error while streaming input
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
