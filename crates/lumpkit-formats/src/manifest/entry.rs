//! Lump and asset entries

use binrw::{BinRead, BinResult, BinWrite, Endian};
use lumpkit_hash::{AssetId, HashMethod};

use crate::lump::CompressionMethod;
use crate::manifest::error::{ManifestError, ManifestResult};

/// One packed asset: its id and serialized size
///
/// The asset's offset inside the decompressed lump is not stored; it is the
/// sum of the sizes of all assets listed before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct AssetEntry {
    /// Content-derived asset id
    pub id: AssetId,
    /// Serialized size in bytes
    pub size: u32,
}

impl AssetEntry {
    /// Size of an encoded entry in bytes
    pub const SIZE: usize = AssetId::SIZE + 4;

    /// Create a new asset entry
    pub const fn new(id: AssetId, size: u32) -> Self {
        Self { id, size }
    }
}

/// Manifest entry describing one lump file
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct LumpEntry {
    /// Size of the lump file on disk (after compression)
    pub file_size: u64,

    /// Checksum of the uncompressed payload
    pub checksum: u64,

    /// Algorithm used for `checksum`
    #[br(map = |x: u8| HashMethod::from_byte(x))]
    #[bw(map = |x: &HashMethod| x.as_byte())]
    pub hash_method: HashMethod,

    /// Compression applied to the lump file
    #[br(map = |x: u8| CompressionMethod::from_byte(x))]
    #[bw(map = |x: &CompressionMethod| x.as_byte())]
    pub compression: CompressionMethod,

    /// Number of assets in the lump
    pub asset_count: u32,

    /// Packed assets in append order
    #[br(args(asset_count), parse_with = parse_assets)]
    pub assets: Vec<AssetEntry>,
}

/// Upper bound on entries reserved before any are read
const ASSET_PREALLOC_LIMIT: usize = 4096;

/// Read `count` asset entries without trusting `count` for allocation
fn parse_assets<R: std::io::Read + std::io::Seek>(
    reader: &mut R,
    endian: Endian,
    (count,): (u32,),
) -> BinResult<Vec<AssetEntry>> {
    let mut assets = Vec::with_capacity((count as usize).min(ASSET_PREALLOC_LIMIT));
    for _ in 0..count {
        assets.push(AssetEntry::read_options(reader, endian, ())?);
    }
    Ok(assets)
}

impl LumpEntry {
    /// Size of an encoded entry with no assets
    pub const MIN_SIZE: usize = 8 + 8 + 1 + 1 + 4;

    /// Create a lump entry, deriving the asset count from `assets`
    pub fn new(
        file_size: u64,
        checksum: u64,
        hash_method: HashMethod,
        compression: CompressionMethod,
        assets: Vec<AssetEntry>,
    ) -> ManifestResult<Self> {
        let asset_count =
            u32::try_from(assets.len()).map_err(|_| ManifestError::TooManyEntries {
                field: "assets",
                count: assets.len(),
            })?;

        Ok(Self {
            file_size,
            checksum,
            hash_method,
            compression,
            asset_count,
            assets,
        })
    }

    /// Assets paired with their byte offset inside the decompressed lump
    pub fn asset_offsets(&self) -> impl Iterator<Item = (AssetEntry, u64)> + '_ {
        self.assets.iter().scan(0u64, |offset, asset| {
            let start = *offset;
            *offset += u64::from(asset.size);
            Some((*asset, start))
        })
    }

    /// Offset and size of `id` inside this lump
    pub fn find(&self, id: AssetId) -> Option<(u64, u32)> {
        self.asset_offsets()
            .find(|(asset, _)| asset.id == id)
            .map(|(asset, offset)| (offset, asset.size))
    }

    /// Size of the decompressed payload
    pub fn uncompressed_size(&self) -> u64 {
        self.assets.iter().map(|a| u64::from(a.size)).sum()
    }

    /// Validate internal consistency
    pub fn validate(&self) -> ManifestResult<()> {
        if self.assets.len() != self.asset_count as usize {
            return Err(ManifestError::CountMismatch {
                field: "asset",
                expected: self.asset_count as usize,
                actual: self.assets.len(),
            });
        }
        Ok(())
    }
}
