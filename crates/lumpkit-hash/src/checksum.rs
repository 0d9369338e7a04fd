//! Lump integrity checksums
//!
//! Lump checksums are computed over the *uncompressed* lump payload and stored
//! in the manifest as a 64-bit field. The only supported algorithm today is
//! XXH32 with seed 0, widened to 64 bits.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use xxhash_rust::xxh32::Xxh32;

use crate::error::HashError;

/// Chunk size used when streaming lump files through a hash or decoder
pub const LOAD_CHUNK_SIZE: usize = 1024;

/// Hash method tag stored in each lump entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum HashMethod {
    /// No checksum recorded
    None,
    /// XXH32, seed 0, streamed in fixed-size chunks
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "xxhash32"))]
    XxHash32,
    /// Tag written by a newer or foreign tool
    Unknown(u8),
}

impl HashMethod {
    /// Parse from the on-disk tag
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::None,
            1 => Self::XxHash32,
            other => Self::Unknown(other),
        }
    }

    /// Get the on-disk tag
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::None => 0,
            Self::XxHash32 => 1,
            Self::Unknown(other) => other,
        }
    }

    /// Whether this crate can compute the method
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for HashMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::XxHash32 => write!(f, "xxhash32"),
            Self::Unknown(tag) => write!(f, "unknown({tag:#04x})"),
        }
    }
}

/// Incremental XXH32 accumulator
pub struct StreamingChecksum {
    state: Xxh32,
}

impl StreamingChecksum {
    /// Create a fresh accumulator (seed 0)
    pub fn new() -> Self {
        Self {
            state: Xxh32::new(0),
        }
    }

    /// Feed more bytes
    pub fn update(&mut self, data: &[u8]) {
        self.state.update(data);
    }

    /// Digest of everything fed so far, widened to the manifest field width
    pub fn finish(&self) -> u64 {
        u64::from(self.state.digest())
    }
}

impl Default for StreamingChecksum {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot XXH32 with seed 0
pub fn xxh32_digest(data: &[u8]) -> u32 {
    xxhash_rust::xxh32::xxh32(data, 0)
}

/// Checksum a complete in-memory payload
///
/// `HashMethod::None` yields `0`.
pub fn checksum_bytes(method: HashMethod, data: &[u8]) -> Result<u64, HashError> {
    match method {
        HashMethod::None => Ok(0),
        HashMethod::XxHash32 => Ok(u64::from(xxh32_digest(data))),
        HashMethod::Unknown(tag) => Err(HashError::UnsupportedMethod(tag)),
    }
}

/// Checksum everything a reader yields, `LOAD_CHUNK_SIZE` bytes at a time
///
/// Returns the digest together with the number of bytes consumed.
pub fn checksum_reader<R: Read>(method: HashMethod, mut reader: R) -> Result<(u64, u64), HashError> {
    if let HashMethod::Unknown(tag) = method {
        return Err(HashError::UnsupportedMethod(tag));
    }

    let mut state = StreamingChecksum::new();
    let mut buffer = [0u8; LOAD_CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        total += bytes_read as u64;
        if method == HashMethod::XxHash32 {
            state.update(&buffer[..bytes_read]);
        }
    }

    let digest = match method {
        HashMethod::XxHash32 => state.finish(),
        _ => 0,
    };
    Ok((digest, total))
}
