//! Lump reader
//!
//! Opens one lump file lazily. Verification methods report through booleans
//! so callers decide what a failed check means; decompression and range
//! lookups return typed errors.

use std::fs::{self, File};
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use lumpkit_hash::{HashMethod, checksum_reader};
use lz4_flex::frame::FrameDecoder;
use tracing::{debug, warn};

use super::compression::{CompressionMethod, FrameHeader, LZ4_MAX_HEADER_SIZE, decode_frame_into};
use super::error::{LumpError, LumpResult};
use crate::config::LoadPolicy;

/// Reader for a single lump file
#[derive(Debug)]
pub struct LumpReader {
    path: PathBuf,
    policy: LoadPolicy,
    data: Option<Vec<u8>>,
}

impl LumpReader {
    /// Create a reader for `path` under the default (permissive) policy
    ///
    /// No I/O happens until a verify or decompress call.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self::with_policy(path, LoadPolicy::default())
    }

    /// Create a reader for `path` under `policy`
    pub fn with_policy<P: Into<PathBuf>>(path: P, policy: LoadPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
            data: None,
        }
    }

    /// Check that the file on disk is exactly `expected` bytes long
    pub fn verify_length(&self, expected: u64) -> bool {
        match fs::metadata(&self.path) {
            Ok(metadata) if metadata.len() == expected => true,
            Ok(metadata) => {
                warn!(
                    "Lump {} is {} bytes, manifest expects {expected}",
                    self.path.display(),
                    metadata.len()
                );
                false
            }
            Err(e) => {
                warn!("Failed to stat lump {}: {e}", self.path.display());
                false
            }
        }
    }

    /// Recompute the payload checksum and compare it with `expected`
    ///
    /// The checksum covers the uncompressed payload, so compressed lumps are
    /// streamed through the frame decoder while hashing. Lumps without a
    /// hash method always pass.
    pub fn verify_hash(
        &self,
        method: HashMethod,
        expected: u64,
        compression: CompressionMethod,
    ) -> bool {
        match method {
            HashMethod::None => return true,
            HashMethod::Unknown(tag) => {
                if self.policy.strict_methods {
                    warn!(
                        "Lump {} uses unknown hash method {tag:#04x}",
                        self.path.display()
                    );
                    return false;
                }
                warn!(
                    "Lump {} uses unknown hash method {tag:#04x}, skipping verification",
                    self.path.display()
                );
                return true;
            }
            HashMethod::XxHash32 => {}
        }

        let file = match File::open(&self.path) {
            Ok(file) => BufReader::new(file),
            Err(e) => {
                warn!("Failed to open lump {}: {e}", self.path.display());
                return false;
            }
        };

        let result = match compression {
            CompressionMethod::None => checksum_reader(method, file),
            CompressionMethod::Lz4 => checksum_reader(method, FrameDecoder::new(file)),
            CompressionMethod::Unknown(tag) => {
                if self.policy.strict_methods {
                    warn!(
                        "Lump {} uses unknown compression {tag:#04x}",
                        self.path.display()
                    );
                    return false;
                }
                checksum_reader(method, file)
            }
        };

        match result {
            Ok((actual, total)) if actual == expected => {
                debug!(
                    "Lump {} checksum {actual:#x} verified over {total} bytes",
                    self.path.display()
                );
                true
            }
            Ok((actual, _)) => {
                warn!(
                    "Lump {} checksum mismatch: expected {expected:#x}, got {actual:#x}",
                    self.path.display()
                );
                false
            }
            Err(e) => {
                warn!("Failed to checksum lump {}: {e}", self.path.display());
                false
            }
        }
    }

    /// Load the lump into memory, decompressing it with `method`
    ///
    /// Calling this again after a successful load does nothing. On error the
    /// lump stays unloaded.
    ///
    /// # Errors
    /// - `FormatError` if the compressed frame is malformed, corrupted or
    ///   declares more than [`MAX_DECOMPRESSION_SIZE`](super::MAX_DECOMPRESSION_SIZE)
    /// - `UnknownMethod` for unknown compression tags under a strict policy
    /// - `Io` if the file cannot be read
    pub fn decompress(&mut self, method: CompressionMethod) -> LumpResult<()> {
        if self.data.is_some() {
            return Ok(());
        }

        let data = match method {
            CompressionMethod::None => fs::read(&self.path)?,
            CompressionMethod::Lz4 => self.read_lz4()?,
            CompressionMethod::Unknown(tag) => {
                if self.policy.strict_methods {
                    return Err(LumpError::UnknownMethod {
                        kind: "compression",
                        tag,
                    });
                }
                warn!(
                    "Lump {} uses unknown compression {tag:#04x}, reading raw bytes",
                    self.path.display()
                );
                fs::read(&self.path)?
            }
        };

        debug!(
            "Loaded lump {} ({} bytes, {method})",
            self.path.display(),
            data.len()
        );
        self.data = Some(data);
        Ok(())
    }

    /// Borrow `size` bytes at `offset` from the decompressed lump
    ///
    /// # Errors
    /// - `NotDecompressed` if [`decompress`](Self::decompress) has not
    ///   succeeded yet
    /// - `RangeExceeded` if the range runs past the end of the lump
    pub fn load_asset(&self, offset: usize, size: usize) -> LumpResult<&[u8]> {
        let data = self.data.as_deref().ok_or(LumpError::NotDecompressed)?;

        let range_error = || LumpError::RangeExceeded {
            offset,
            size,
            available: data.len(),
        };
        let end = offset.checked_add(size).ok_or_else(range_error)?;

        data.get(offset..end).ok_or_else(range_error)
    }

    /// Path of the lump file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the lump is decompressed and ready for `load_asset`
    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    /// Size of the decompressed payload, if loaded
    pub fn loaded_size(&self) -> Option<usize> {
        self.data.as_ref().map(Vec::len)
    }

    /// Drop the decompressed payload
    pub fn unload(&mut self) {
        self.data = None;
    }

    fn read_lz4(&self) -> LumpResult<Vec<u8>> {
        let mut file = BufReader::new(File::open(&self.path)?);

        let mut head = Vec::with_capacity(LZ4_MAX_HEADER_SIZE);
        file.by_ref()
            .take(LZ4_MAX_HEADER_SIZE as u64)
            .read_to_end(&mut head)?;

        let header = FrameHeader::parse(&head)?;
        let mut out = vec![0u8; header.allocation_size()?];

        decode_frame_into(Cursor::new(head).chain(file), &mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::lump::compress_lump;
    use crate::test_utils::asset_payload;
    use lumpkit_hash::checksum_bytes;

    fn write_lump(dir: &Path, payload: &[u8], method: CompressionMethod) -> PathBuf {
        let path = dir.join("lump-0000.bin");
        fs::write(&path, compress_lump(payload, method).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_compressed_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let payload = asset_payload(3, 10_000);
        let path = write_lump(dir.path(), &payload, CompressionMethod::Lz4);

        let mut reader = LumpReader::new(&path);
        assert!(!reader.is_loaded());
        reader.decompress(CompressionMethod::Lz4).unwrap();
        assert_eq!(reader.loaded_size(), Some(payload.len()));
        assert_eq!(reader.load_asset(100, 50).unwrap(), &payload[100..150]);

        // Idempotent
        reader.decompress(CompressionMethod::Lz4).unwrap();
        assert_eq!(reader.loaded_size(), Some(payload.len()));
    }

    #[test]
    fn test_verify_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lump(dir.path(), b"0123456789", CompressionMethod::None);

        let reader = LumpReader::new(&path);
        assert!(reader.verify_length(10));
        assert!(!reader.verify_length(11));
        assert!(!LumpReader::new(dir.path().join("missing.bin")).verify_length(10));
    }

    #[test]
    fn test_verify_hash_over_uncompressed_payload() {
        let dir = tempfile::tempdir().unwrap();
        let payload = asset_payload(9, 5000);
        let expected = checksum_bytes(HashMethod::XxHash32, &payload).unwrap();

        let path = write_lump(dir.path(), &payload, CompressionMethod::Lz4);
        let reader = LumpReader::new(&path);
        assert!(reader.verify_hash(HashMethod::XxHash32, expected, CompressionMethod::Lz4));
        assert!(!reader.verify_hash(HashMethod::XxHash32, expected ^ 1, CompressionMethod::Lz4));

        let raw_path = dir.path().join("raw.bin");
        fs::write(&raw_path, &payload).unwrap();
        let raw = LumpReader::new(&raw_path);
        assert!(raw.verify_hash(HashMethod::XxHash32, expected, CompressionMethod::None));
    }

    #[test]
    fn test_verify_hash_none_always_passes() {
        let reader = LumpReader::new("does-not-exist.bin");
        assert!(reader.verify_hash(HashMethod::None, 0xDEAD, CompressionMethod::Lz4));
    }

    #[test]
    fn test_unknown_methods_follow_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lump(dir.path(), b"raw payload", CompressionMethod::None);

        let mut permissive = LumpReader::new(&path);
        assert!(permissive.verify_hash(HashMethod::Unknown(9), 1, CompressionMethod::None));
        permissive.decompress(CompressionMethod::Unknown(7)).unwrap();
        assert_eq!(permissive.load_asset(0, 3).unwrap(), b"raw");

        let mut strict = LumpReader::with_policy(&path, LoadPolicy::strict());
        assert!(!strict.verify_hash(HashMethod::Unknown(9), 1, CompressionMethod::None));
        assert!(matches!(
            strict.decompress(CompressionMethod::Unknown(7)),
            Err(LumpError::UnknownMethod { tag: 7, .. })
        ));
        assert!(!strict.is_loaded());
    }

    #[test]
    fn test_corrupted_lump_stays_unloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lump-0000.bin");
        let mut compressed = compress_lump(&asset_payload(4, 8000), CompressionMethod::Lz4).unwrap();
        let middle = compressed.len() / 2;
        compressed[middle] ^= 0xFF;
        fs::write(&path, compressed).unwrap();

        let mut reader = LumpReader::new(&path);
        assert!(matches!(
            reader.decompress(CompressionMethod::Lz4),
            Err(LumpError::FormatError(_))
        ));
        assert!(!reader.is_loaded());
        assert!(matches!(
            reader.load_asset(0, 1),
            Err(LumpError::NotDecompressed)
        ));
    }

    #[test]
    fn test_not_a_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lump(dir.path(), b"plain bytes", CompressionMethod::None);

        let mut reader = LumpReader::new(&path);
        assert!(matches!(
            reader.decompress(CompressionMethod::Lz4),
            Err(LumpError::FormatError(_))
        ));
    }

    #[test]
    fn test_range_checks() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lump(dir.path(), b"0123456789", CompressionMethod::None);

        let mut reader = LumpReader::new(&path);
        assert!(matches!(
            reader.load_asset(0, 1),
            Err(LumpError::NotDecompressed)
        ));

        reader.decompress(CompressionMethod::None).unwrap();
        assert_eq!(reader.load_asset(4, 6).unwrap(), b"456789");
        assert!(reader.load_asset(10, 0).unwrap().is_empty());
        assert!(matches!(
            reader.load_asset(5, 6),
            Err(LumpError::RangeExceeded {
                offset: 5,
                size: 6,
                available: 10
            })
        ));
        assert!(matches!(
            reader.load_asset(usize::MAX, 2),
            Err(LumpError::RangeExceeded { .. })
        ));

        reader.unload();
        assert!(!reader.is_loaded());
    }
}
