//! Bundle manifest: the index describing every lump and the assets inside it
//!
//! The manifest is the root object of a bundle. It records, per lump, the
//! on-disk file size, the checksum of the uncompressed payload, the hash and
//! compression methods, and the ordered list of `(AssetId, size)` pairs. It
//! also lists the "initial" asset ids collaborators treat as entry points.
//!
//! # Binary Layout
//!
//! ```text
//! magic "LMNF" | version u32 | lump_count u32 | initial_count u32
//! lump_count × ( file_size u64 | checksum u64 | hash u8 | compression u8
//!                | asset_count u32 | asset_count × (id u64 | size u32) )
//! initial_count × id u64
//! ```
//!
//! All integers are little-endian. Asset offsets are implicit: the Nth asset
//! of a lump starts at the sum of the sizes of the assets before it.
//!
//! # Example
//!
//! ```rust
//! use lumpkit_formats::lump::CompressionMethod;
//! use lumpkit_formats::manifest::{AssetEntry, LumpEntry, Manifest};
//! use lumpkit_hash::{AssetId, HashMethod};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mesh = AssetId::from_data(b"mesh");
//! let prefab = AssetId::from_data(b"prefab");
//!
//! let lump = LumpEntry::new(
//!     0,
//!     0,
//!     HashMethod::None,
//!     CompressionMethod::None,
//!     vec![AssetEntry::new(mesh, 4), AssetEntry::new(prefab, 6)],
//! )?;
//! let manifest = Manifest::new(vec![lump], vec![prefab])?;
//!
//! let location = manifest.locate(prefab).expect("prefab is packed");
//! assert_eq!(location.offset, 4);
//!
//! let bytes = manifest.build()?;
//! assert_eq!(Manifest::parse(&bytes)?, manifest);
//! # Ok(())
//! # }
//! ```

mod entry;
mod error;
mod header;

pub use entry::{AssetEntry, LumpEntry};
pub use error::{ManifestError, ManifestResult};
pub use header::{MANIFEST_MAGIC, MANIFEST_VERSION, ManifestHeader};

use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};
use lumpkit_hash::AssetId;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;

/// Default manifest file name inside a bundle directory
pub const DEFAULT_MANIFEST_NAME: &str = "registry.bin";

/// File name of the lump with the given creation ordinal
pub fn lump_file_name(index: usize) -> String {
    format!("lump-{index:04}.bin")
}

/// Where an asset lives inside a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetLocation {
    /// Index of the lump in the manifest
    pub lump_index: usize,
    /// Offset inside the decompressed lump
    pub offset: u64,
    /// Serialized size
    pub size: u32,
}

/// Complete bundle manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Header with magic, version and counts
    pub header: ManifestHeader,
    /// One entry per lump, in lump file order
    pub lumps: Vec<LumpEntry>,
    /// Entry-point asset ids
    pub initial_assets: Vec<AssetId>,
}

impl Manifest {
    /// Create a manifest for the current format version
    pub fn new(lumps: Vec<LumpEntry>, initial_assets: Vec<AssetId>) -> ManifestResult<Self> {
        let lump_count = u32::try_from(lumps.len()).map_err(|_| ManifestError::TooManyEntries {
            field: "lumps",
            count: lumps.len(),
        })?;
        let initial_count =
            u32::try_from(initial_assets.len()).map_err(|_| ManifestError::TooManyEntries {
                field: "initial assets",
                count: initial_assets.len(),
            })?;

        Ok(Self {
            header: ManifestHeader::new(lump_count, initial_count),
            lumps,
            initial_assets,
        })
    }

    /// Parse a manifest from binary data and validate it
    ///
    /// # Errors
    /// Returns error if:
    /// - The magic or version is wrong
    /// - The data is truncated or has trailing bytes
    /// - An asset id is null or packed twice
    /// - An initial asset does not resolve
    pub fn parse(data: &[u8]) -> ManifestResult<Self> {
        let mut cursor = Cursor::new(data);

        let header = ManifestHeader::read(&mut cursor)?;
        header.validate()?;

        // Counts are untrusted; never reserve more than the input could hold
        let remaining = data.len().saturating_sub(ManifestHeader::SIZE);
        let mut lumps =
            Vec::with_capacity((header.lump_count as usize).min(remaining / LumpEntry::MIN_SIZE));
        for _ in 0..header.lump_count {
            lumps.push(LumpEntry::read(&mut cursor)?);
        }

        let remaining = data.len().saturating_sub(cursor.position() as usize);
        let mut initial_assets =
            Vec::with_capacity((header.initial_count as usize).min(remaining / AssetId::SIZE));
        for _ in 0..header.initial_count {
            initial_assets.push(AssetId::read(&mut cursor)?);
        }

        let consumed = cursor.position() as usize;
        if consumed != data.len() {
            return Err(ManifestError::TrailingData(data.len() - consumed));
        }

        let manifest = Self {
            header,
            lumps,
            initial_assets,
        };
        manifest.validate()?;

        Ok(manifest)
    }

    /// Serialize the manifest to binary data
    pub fn build(&self) -> ManifestResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        self.header.write(&mut cursor)?;

        for lump in &self.lumps {
            lump.write(&mut cursor)?;
        }

        for id in &self.initial_assets {
            id.write(&mut cursor)?;
        }

        Ok(buffer)
    }

    /// Read and parse a manifest file
    pub fn read_from<P: AsRef<Path>>(path: P) -> ManifestResult<Self> {
        let data = std::fs::read(path)?;
        Self::parse(&data)
    }

    /// Serialize and write the manifest to a file
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> ManifestResult<()> {
        let data = self.build()?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Validate internal consistency of the manifest
    ///
    /// Every asset id must be non-null and resolve to exactly one location,
    /// and every initial asset must be packed somewhere.
    pub fn validate(&self) -> ManifestResult<()> {
        self.header.validate()?;

        if self.lumps.len() != self.header.lump_count as usize {
            return Err(ManifestError::CountMismatch {
                field: "lump",
                expected: self.header.lump_count as usize,
                actual: self.lumps.len(),
            });
        }

        if self.initial_assets.len() != self.header.initial_count as usize {
            return Err(ManifestError::CountMismatch {
                field: "initial asset",
                expected: self.header.initial_count as usize,
                actual: self.initial_assets.len(),
            });
        }

        for lump in &self.lumps {
            lump.validate()?;
        }

        let index = AssetIndex::from_manifest(self)?;
        for id in &self.initial_assets {
            if !index.contains(*id) {
                return Err(ManifestError::UnresolvedInitialAsset(*id));
            }
        }

        Ok(())
    }

    /// Find where an asset lives
    ///
    /// Linear scan; build an [`AssetIndex`] for repeated lookups.
    pub fn locate(&self, id: AssetId) -> Option<AssetLocation> {
        self.lumps
            .iter()
            .enumerate()
            .find_map(|(lump_index, lump)| {
                lump.find(id).map(|(offset, size)| AssetLocation {
                    lump_index,
                    offset,
                    size,
                })
            })
    }

    /// Build a hash index over every packed asset
    pub fn index(&self) -> ManifestResult<AssetIndex> {
        AssetIndex::from_manifest(self)
    }

    /// Total number of packed assets
    pub fn asset_count(&self) -> usize {
        self.lumps.iter().map(|lump| lump.assets.len()).sum()
    }

    /// Total size of all lump files on disk
    pub fn total_file_size(&self) -> u64 {
        self.lumps.iter().map(|lump| lump.file_size).sum()
    }

    /// Total size of all decompressed lumps
    pub fn total_uncompressed_size(&self) -> u64 {
        self.lumps.iter().map(LumpEntry::uncompressed_size).sum()
    }
}

impl crate::LumpFormat for Manifest {
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::parse(data)?)
    }

    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        Ok(self.build()?)
    }
}

/// Hash map from asset id to its location
#[derive(Debug, Clone, Default)]
pub struct AssetIndex {
    locations: HashMap<AssetId, AssetLocation>,
}

impl AssetIndex {
    /// Index every asset of `manifest`
    ///
    /// Fails on null ids and on ids packed more than once.
    pub fn from_manifest(manifest: &Manifest) -> ManifestResult<Self> {
        let mut locations = HashMap::with_capacity(manifest.asset_count());

        for (lump_index, lump) in manifest.lumps.iter().enumerate() {
            for (asset, offset) in lump.asset_offsets() {
                if asset.id.is_null() {
                    return Err(ManifestError::NullAsset { lump: lump_index });
                }

                match locations.entry(asset.id) {
                    Entry::Occupied(_) => return Err(ManifestError::DuplicateAsset(asset.id)),
                    Entry::Vacant(slot) => {
                        slot.insert(AssetLocation {
                            lump_index,
                            offset,
                            size: asset.size,
                        });
                    }
                }
            }
        }

        Ok(Self { locations })
    }

    /// Location of `id`, if packed
    pub fn get(&self, id: AssetId) -> Option<AssetLocation> {
        self.locations.get(&id).copied()
    }

    /// Whether `id` is packed
    pub fn contains(&self, id: AssetId) -> bool {
        self.locations.contains_key(&id)
    }

    /// Number of indexed assets
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Iterate over all indexed assets
    pub fn iter(&self) -> impl Iterator<Item = (AssetId, AssetLocation)> + '_ {
        self.locations.iter().map(|(id, location)| (*id, *location))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::lump::CompressionMethod;
    use crate::test_utils::test_round_trip;
    use lumpkit_hash::HashMethod;
    use pretty_assertions::assert_eq;

    fn id(raw: u64) -> AssetId {
        AssetId::from_raw(raw)
    }

    fn lump(assets: &[(u64, u32)]) -> LumpEntry {
        LumpEntry::new(
            assets.iter().map(|(_, s)| u64::from(*s)).sum(),
            0x1234,
            HashMethod::XxHash32,
            CompressionMethod::None,
            assets
                .iter()
                .map(|(raw, size)| AssetEntry::new(id(*raw), *size))
                .collect(),
        )
        .unwrap()
    }

    fn sample_manifest() -> Manifest {
        Manifest::new(
            vec![lump(&[(1, 100), (2, 200)]), lump(&[(3, 750)])],
            vec![id(3)],
        )
        .unwrap()
    }

    #[test]
    fn test_manifest_round_trip() {
        test_round_trip(&sample_manifest()).unwrap();
    }

    fn header_bytes(lump_count: u32, initial_count: u32) -> Vec<u8> {
        let mut bytes = MANIFEST_MAGIC.to_vec();
        bytes.extend_from_slice(&MANIFEST_VERSION.to_le_bytes());
        bytes.extend_from_slice(&lump_count.to_le_bytes());
        bytes.extend_from_slice(&initial_count.to_le_bytes());
        bytes
    }

    #[test]
    fn test_huge_lump_count_rejected() {
        let bytes = header_bytes(u32::MAX, 0);
        assert_eq!(bytes.len(), ManifestHeader::SIZE);
        assert!(matches!(
            Manifest::parse(&bytes),
            Err(ManifestError::BinRw(_))
        ));
    }

    #[test]
    fn test_huge_initial_count_rejected() {
        assert!(Manifest::parse(&header_bytes(0, u32::MAX)).is_err());
    }

    #[test]
    fn test_huge_asset_count_rejected() {
        let mut bytes = header_bytes(1, 0);
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(Manifest::parse(&bytes).is_err());
    }

    #[test]
    fn test_locate_across_lumps() {
        let manifest = sample_manifest();

        assert_eq!(
            manifest.locate(id(2)),
            Some(AssetLocation {
                lump_index: 0,
                offset: 100,
                size: 200
            })
        );
        assert_eq!(
            manifest.locate(id(3)),
            Some(AssetLocation {
                lump_index: 1,
                offset: 0,
                size: 750
            })
        );
        assert_eq!(manifest.locate(id(42)), None);
    }

    #[test]
    fn test_index_agrees_with_locate() {
        let manifest = sample_manifest();
        let index = manifest.index().unwrap();
        assert_eq!(index.len(), 3);
        for (asset_id, location) in index.iter() {
            assert_eq!(manifest.locate(asset_id), Some(location));
        }
    }

    #[test]
    fn test_totals() {
        let manifest = sample_manifest();
        assert_eq!(manifest.asset_count(), 3);
        assert_eq!(manifest.total_uncompressed_size(), 1050);
        assert_eq!(manifest.total_file_size(), 1050);
    }

    #[test]
    fn test_duplicate_asset_rejected() {
        let manifest = Manifest::new(vec![lump(&[(1, 10)]), lump(&[(1, 10)])], vec![]).unwrap();
        let bytes = manifest.build().unwrap();
        assert!(matches!(
            Manifest::parse(&bytes),
            Err(ManifestError::DuplicateAsset(dup)) if dup == id(1)
        ));
    }

    #[test]
    fn test_null_asset_rejected() {
        let manifest = Manifest::new(vec![lump(&[(0, 10)])], vec![]).unwrap();
        assert!(matches!(
            manifest.validate(),
            Err(ManifestError::NullAsset { lump: 0 })
        ));
    }

    #[test]
    fn test_unresolved_initial_asset_rejected() {
        let manifest = Manifest::new(vec![lump(&[(1, 10)])], vec![id(9)]).unwrap();
        assert!(matches!(
            manifest.validate(),
            Err(ManifestError::UnresolvedInitialAsset(missing)) if missing == id(9)
        ));
    }

    #[test]
    fn test_trailing_data_rejected() {
        let mut bytes = sample_manifest().build().unwrap();
        bytes.push(0);
        assert!(matches!(
            Manifest::parse(&bytes),
            Err(ManifestError::TrailingData(1))
        ));
    }

    #[test]
    fn test_truncated_data_rejected() {
        let bytes = sample_manifest().build().unwrap();
        assert!(Manifest::parse(&bytes[..bytes.len() - 3]).is_err());
    }

    #[test]
    fn test_empty_manifest() {
        let manifest = Manifest::new(vec![], vec![]).unwrap();
        let bytes = manifest.build().unwrap();
        assert_eq!(bytes.len(), ManifestHeader::SIZE);
        assert_eq!(Manifest::parse(&bytes).unwrap(), manifest);
    }

    #[test]
    fn test_lump_file_names_follow_index() {
        assert_eq!(lump_file_name(0), "lump-0000.bin");
        assert_eq!(lump_file_name(12), "lump-0012.bin");
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_MANIFEST_NAME);
        let manifest = sample_manifest();
        manifest.write_to(&path).unwrap();
        assert_eq!(Manifest::read_from(&path).unwrap(), manifest);
    }
}
