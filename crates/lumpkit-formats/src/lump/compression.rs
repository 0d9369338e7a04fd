//! Lump compression and decompression
//!
//! Lumps are compressed as a single LZ4 frame. The frame header always carries
//! the uncompressed content size so a reader can allocate the output buffer
//! before decoding, and both block and content checksums are enabled so that
//! corruption surfaces as an error instead of a silently wrong buffer.

use lz4_flex::frame::{BlockMode, BlockSize, FrameDecoder, FrameEncoder, FrameInfo};
use lumpkit_hash::xxh32_digest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{ErrorKind, Read, Write};

use super::error::{LumpError, LumpResult};

/// Maximum allowed decompressed lump size (1 GiB)
///
/// Limits the allocation a corrupted or hostile frame header can request.
pub const MAX_DECOMPRESSION_SIZE: usize = 1024 * 1024 * 1024;

/// LZ4 frame magic number (little-endian on disk)
pub const LZ4_FRAME_MAGIC: u32 = 0x184D_2204;

/// Largest possible LZ4 frame header: magic, FLG, BD, content size, dict id, HC
pub const LZ4_MAX_HEADER_SIZE: usize = 4 + 2 + 8 + 4 + 1;

const FLG_VERSION_MASK: u8 = 0b1100_0000;
const FLG_VERSION_01: u8 = 0b0100_0000;
const FLG_CONTENT_SIZE: u8 = 0b0000_1000;
const FLG_DICT_ID: u8 = 0b0000_0001;

/// Compression method tag stored in each lump entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionMethod {
    /// Raw concatenated asset bytes
    None,
    /// Single LZ4 frame with embedded content size
    #[default]
    Lz4,
    /// Tag written by a newer or foreign tool
    Unknown(u8),
}

impl CompressionMethod {
    /// Parse from the on-disk tag
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::None,
            1 => Self::Lz4,
            other => Self::Unknown(other),
        }
    }

    /// Get the on-disk tag
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Lz4 => 1,
            Self::Unknown(other) => other,
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Lz4 => write!(f, "lz4"),
            Self::Unknown(tag) => write!(f, "unknown({tag:#04x})"),
        }
    }
}

/// Parsed LZ4 frame header fields the reader cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Uncompressed size declared by the frame
    pub content_size: u64,
    /// Header length in bytes, including magic and descriptor checksum
    pub header_len: usize,
}

impl FrameHeader {
    /// Parse the frame header at the start of `data`
    ///
    /// `data` must hold at least the complete header. Lumps written by this
    /// crate always embed the content size; frames without one are rejected.
    pub fn parse(data: &[u8]) -> LumpResult<Self> {
        if data.len() < 7 {
            return Err(LumpError::FormatError(format!(
                "LZ4 frame header truncated: {} bytes",
                data.len()
            )));
        }

        let magic = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        if magic != LZ4_FRAME_MAGIC {
            return Err(LumpError::FormatError(format!(
                "Invalid LZ4 frame magic: {magic:#010x}"
            )));
        }

        let flg = data[4];
        if flg & FLG_VERSION_MASK != FLG_VERSION_01 {
            return Err(LumpError::FormatError(format!(
                "Unsupported LZ4 frame version bits in FLG {flg:#04x}"
            )));
        }
        if flg & FLG_CONTENT_SIZE == 0 {
            return Err(LumpError::FormatError(
                "LZ4 frame does not declare its content size".to_string(),
            ));
        }

        let descriptor_len = 2 + 8 + if flg & FLG_DICT_ID != 0 { 4 } else { 0 };
        let header_len = 4 + descriptor_len + 1;
        if data.len() < header_len {
            return Err(LumpError::FormatError(format!(
                "LZ4 frame header truncated: need {header_len} bytes, have {}",
                data.len()
            )));
        }

        let descriptor = &data[4..4 + descriptor_len];
        let expected_hc = ((xxh32_digest(descriptor) >> 8) & 0xFF) as u8;
        let actual_hc = data[4 + descriptor_len];
        if expected_hc != actual_hc {
            return Err(LumpError::FormatError(format!(
                "LZ4 frame descriptor checksum mismatch: expected {expected_hc:#04x}, got {actual_hc:#04x}"
            )));
        }

        let mut size_bytes = [0u8; 8];
        size_bytes.copy_from_slice(&data[6..14]);
        let content_size = u64::from_le_bytes(size_bytes);

        Ok(Self {
            content_size,
            header_len,
        })
    }

    /// Declared content size as an allocation length, bounded by
    /// [`MAX_DECOMPRESSION_SIZE`]
    pub fn allocation_size(&self) -> LumpResult<usize> {
        let size = usize::try_from(self.content_size).map_err(|_| {
            LumpError::FormatError("Declared content size too large for platform".to_string())
        })?;

        if size > MAX_DECOMPRESSION_SIZE {
            return Err(LumpError::FormatError(format!(
                "Declared content size {size} exceeds limit of {MAX_DECOMPRESSION_SIZE} bytes"
            )));
        }

        Ok(size)
    }
}

/// Compress a lump payload with the given method
pub fn compress_lump(data: &[u8], method: CompressionMethod) -> LumpResult<Vec<u8>> {
    match method {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Lz4 => {
            // Independent 4 MiB blocks keep decoding cheap and parallelizable
            let frame_info = FrameInfo::new()
                .content_size(Some(data.len() as u64))
                .block_size(BlockSize::Max4MB)
                .block_mode(BlockMode::Independent)
                .block_checksums(true)
                .content_checksum(true);

            let mut encoder = FrameEncoder::with_frame_info(frame_info, Vec::new());
            encoder.write_all(data)?;
            encoder
                .finish()
                .map_err(|e| LumpError::FormatError(format!("LZ4 compression failed: {e}")))
        }
        CompressionMethod::Unknown(tag) => Err(LumpError::BadContents(format!(
            "Cannot compress with unknown method {tag:#04x}"
        ))),
    }
}

/// Drive a frame decoder over `reader` until `out` is exactly filled
///
/// The frame must produce exactly `out.len()` bytes; shorter or longer
/// frames, bad checksums and malformed blocks are all `FormatError`s.
pub fn decode_frame_into<R: Read>(reader: R, out: &mut [u8]) -> LumpResult<()> {
    let mut decoder = FrameDecoder::new(reader);
    let mut filled = 0;

    while filled < out.len() {
        match decoder.read(&mut out[filled..]) {
            Ok(0) => {
                return Err(LumpError::FormatError(format!(
                    "LZ4 frame ended after {filled} of {} bytes",
                    out.len()
                )));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                return Err(LumpError::FormatError(format!(
                    "LZ4 decompression failed: {e}"
                )));
            }
        }
    }

    // Draining past the declared size validates the end mark and content checksum
    let mut extra = [0u8; 1];
    loop {
        match decoder.read(&mut extra) {
            Ok(0) => return Ok(()),
            Ok(_) => {
                return Err(LumpError::FormatError(format!(
                    "LZ4 frame yields more than the declared {} bytes",
                    out.len()
                )));
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                return Err(LumpError::FormatError(format!(
                    "LZ4 decompression failed: {e}"
                )));
            }
        }
    }
}

/// Decompress an in-memory lump payload
pub fn decompress_lump(data: &[u8], method: CompressionMethod) -> LumpResult<Vec<u8>> {
    match method {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Lz4 => {
            let header = FrameHeader::parse(data)?;
            let mut out = vec![0u8; header.allocation_size()?];
            decode_frame_into(data, &mut out)?;
            Ok(out)
        }
        CompressionMethod::Unknown(tag) => Err(LumpError::UnknownMethod {
            kind: "compression",
            tag,
        }),
    }
}
