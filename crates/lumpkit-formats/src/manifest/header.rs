//! Manifest header parsing and building

use binrw::{BinRead, BinWrite};

use crate::manifest::error::{ManifestError, ManifestResult};

/// Magic signature at the start of every manifest
pub const MANIFEST_MAGIC: [u8; 4] = *b"LMNF";

/// Current manifest format version
pub const MANIFEST_VERSION: u32 = 1;

/// Manifest header
///
/// - Magic signature "LMNF" (4 bytes)
/// - Format version (4 bytes)
/// - Lump count (4 bytes)
/// - Initial asset count (4 bytes)
///
/// All multi-byte fields are little-endian.
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct ManifestHeader {
    /// Magic signature, always "LMNF"
    pub magic: [u8; 4],

    /// Format version
    pub version: u32,

    /// Number of lump entries that follow
    pub lump_count: u32,

    /// Number of initial asset ids after the lump entries
    pub initial_count: u32,
}

impl ManifestHeader {
    /// Size of the header in bytes
    pub const SIZE: usize = 16;

    /// Create a header for the current format version
    pub fn new(lump_count: u32, initial_count: u32) -> Self {
        Self {
            magic: MANIFEST_MAGIC,
            version: MANIFEST_VERSION,
            lump_count,
            initial_count,
        }
    }

    /// Validate the header fields
    pub fn validate(&self) -> ManifestResult<()> {
        if self.magic != MANIFEST_MAGIC {
            return Err(ManifestError::InvalidMagic(self.magic));
        }

        if self.version != MANIFEST_VERSION {
            return Err(ManifestError::UnsupportedVersion(self.version));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use binrw::io::Cursor;

    #[test]
    fn test_header_layout() {
        let header = ManifestHeader::new(2, 1);
        let mut cursor = Cursor::new(Vec::new());
        header.write(&mut cursor).unwrap();

        let bytes = cursor.into_inner();
        assert_eq!(bytes.len(), ManifestHeader::SIZE);
        assert_eq!(&bytes[0..4], b"LMNF");
        assert_eq!(&bytes[4..8], &[1, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &[2, 0, 0, 0]);
        assert_eq!(&bytes[12..16], &[1, 0, 0, 0]);

        let parsed = ManifestHeader::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_validate_rejects_bad_magic() {
        let mut header = ManifestHeader::new(0, 0);
        header.magic = *b"NOPE";
        assert!(matches!(
            header.validate(),
            Err(ManifestError::InvalidMagic(m)) if m == *b"NOPE"
        ));
    }

    #[test]
    fn test_validate_rejects_future_version() {
        let mut header = ManifestHeader::new(0, 0);
        header.version = 2;
        assert!(matches!(
            header.validate(),
            Err(ManifestError::UnsupportedVersion(2))
        ));
    }
}
