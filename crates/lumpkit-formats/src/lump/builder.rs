//! Lump builder
//!
//! Packs serialized assets into size-capped lumps and writes the lump files
//! plus the manifest describing them.
//!
//! # Example
//!
//! ```rust,no_run
//! use lumpkit_formats::config::BuilderConfig;
//! use lumpkit_formats::lump::LumpBuilder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut builder = LumpBuilder::new(BuilderConfig::default().with_max_lump_size(1 << 20));
//!
//! let texture = builder.add_asset(b"texture bytes")?;
//! let prefab = builder.add_asset(b"prefab bytes")?;
//! builder.add_initial_asset(prefab);
//!
//! let manifest = builder.build("out", "registry.bin")?;
//! assert!(manifest.locate(texture).is_some());
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use lumpkit_hash::{AssetId, checksum_bytes};
use tracing::{debug, info, warn};

use super::compression::compress_lump;
use super::error::{LumpError, LumpResult};
use crate::config::BuilderConfig;
use crate::manifest::{AssetEntry, LumpEntry, Manifest, lump_file_name};

/// Directory created inside the output directory for staged publication
const STAGING_DIR_NAME: &str = ".lumpkit-staging";

/// A lump that is still being filled
#[derive(Debug, Default)]
struct PendingLump {
    /// Concatenated asset bytes; replaced by the compressed form on finalize
    data: Vec<u8>,
    /// Packed assets in append order
    assets: Vec<AssetEntry>,
    /// Set once the payload has been checksummed and compressed
    finalized: bool,
}

impl PendingLump {
    fn has_room_for(&self, len: usize, max: usize) -> bool {
        self.data.len() + len <= max
    }

    /// Checksum and compress the payload in place, returning the checksum
    fn finalize(&mut self, config: &BuilderConfig) -> LumpResult<u64> {
        if self.finalized {
            return Err(LumpError::BadContents(
                "Lump has already been compressed".to_string(),
            ));
        }

        let checksum = checksum_bytes(config.hash_method, &self.data)?;
        self.data = compress_lump(&self.data, config.compression)?;
        self.finalized = true;

        Ok(checksum)
    }
}

/// Builder for lump files and their manifest
///
/// Assets are appended to the newest lump until it would exceed
/// `max_lump_size`, at which point a new lump is opened. Lumps are never
/// revisited, so packing is in insertion order.
#[derive(Debug)]
pub struct LumpBuilder {
    config: BuilderConfig,
    lumps: Vec<PendingLump>,
    used_ids: HashSet<AssetId>,
    initial_assets: Vec<AssetId>,
    built: bool,
}

impl LumpBuilder {
    /// Create an empty builder
    pub fn new(config: BuilderConfig) -> Self {
        Self {
            config,
            lumps: Vec::new(),
            used_ids: HashSet::new(),
            initial_assets: Vec::new(),
            built: false,
        }
    }

    /// Add one serialized asset and return its content-derived id
    ///
    /// # Errors
    /// - `BadSize` if the length does not fit the manifest's 32-bit size field
    /// - `AssetTooLarge` if the asset is bigger than a whole lump
    /// - `BadContents` if the content hashes to the null id, or the builder
    ///   has already been built
    /// - `DuplicateAsset` if identical bytes were already added; the existing
    ///   entry is kept and nothing is appended
    pub fn add_asset(&mut self, data: &[u8]) -> LumpResult<AssetId> {
        let size = self.check_asset_size(data.len())?;

        let id = AssetId::from_data(data);
        if id.is_null() {
            return Err(LumpError::BadContents(
                "Asset content hashes to the null id".to_string(),
            ));
        }

        if self.used_ids.contains(&id) {
            return Err(LumpError::DuplicateAsset(id));
        }

        if self.built {
            return Err(LumpError::BadContents(
                "Cannot add assets after the bundle was built".to_string(),
            ));
        }

        let max = self.config.max_lump_size;
        let needs_new_lump = self
            .lumps
            .last()
            .is_none_or(|lump| !lump.has_room_for(data.len(), max));
        if needs_new_lump {
            debug!("Opening lump {} for asset {id} ({size} bytes)", self.lumps.len());
            self.lumps.push(PendingLump::default());
        }

        let lump = self
            .lumps
            .last_mut()
            .ok_or_else(|| LumpError::BadContents("No lump available".to_string()))?;
        if lump.finalized {
            return Err(LumpError::BadContents(
                "Selected lump is already finalized".to_string(),
            ));
        }

        lump.data.extend_from_slice(data);
        lump.assets.push(AssetEntry::new(id, size));
        self.used_ids.insert(id);

        Ok(id)
    }

    /// Add an asset, returning the existing id if identical bytes were
    /// already packed
    pub fn add_asset_dedup(&mut self, data: &[u8]) -> LumpResult<AssetId> {
        match self.add_asset(data) {
            Err(LumpError::DuplicateAsset(id)) => {
                debug!("Skipping duplicate asset {id}");
                Ok(id)
            }
            other => other,
        }
    }

    /// Register an entry-point asset
    ///
    /// The id is only checked when the bundle is built.
    pub fn add_initial_asset(&mut self, id: AssetId) {
        self.initial_assets.push(id);
    }

    /// Compress every lump and write the lump files plus the manifest
    ///
    /// Lumps are written as `lump-NNNN.bin` in creation order and the
    /// manifest is written last under `manifest_name`. Without
    /// `atomic_publish` a failure leaves a partial bundle behind that the
    /// caller must discard.
    ///
    /// After a successful write, `lump-NNNN.bin` files left in `output_dir`
    /// by an earlier, larger build are removed, starting at the first index
    /// past the new manifest's lumps.
    ///
    /// # Errors
    /// - `UnresolvedAsset` if an initial asset was never added
    /// - `BadContents` if the builder was already built
    /// - `Io` on any filesystem failure
    pub fn build<P: AsRef<Path>>(
        &mut self,
        output_dir: P,
        manifest_name: &str,
    ) -> LumpResult<Manifest> {
        if self.built {
            return Err(LumpError::BadContents(
                "Bundle has already been built".to_string(),
            ));
        }
        if manifest_name.is_empty() {
            return Err(LumpError::BadContents(
                "Manifest name must not be empty".to_string(),
            ));
        }
        self.config.validate()?;

        for id in &self.initial_assets {
            if !self.used_ids.contains(id) {
                return Err(LumpError::UnresolvedAsset(*id));
            }
        }

        let output_dir = output_dir.as_ref();
        fs::create_dir_all(output_dir)?;

        let manifest = if self.config.atomic_publish {
            self.publish_staged(output_dir, manifest_name)?
        } else {
            self.write_bundle(output_dir, manifest_name)?
        };
        remove_stale_lumps(output_dir, manifest.lumps.len())?;

        info!(
            "Built {} lumps with {} assets into {} ({} bytes on disk, {} bytes uncompressed)",
            manifest.lumps.len(),
            manifest.asset_count(),
            output_dir.display(),
            manifest.total_file_size(),
            manifest.total_uncompressed_size()
        );

        Ok(manifest)
    }

    /// Number of lumps opened so far
    pub fn lump_count(&self) -> usize {
        self.lumps.len()
    }

    /// Number of distinct assets added so far
    pub fn asset_count(&self) -> usize {
        self.used_ids.len()
    }

    /// Whether an asset with this id was added
    pub fn contains(&self, id: AssetId) -> bool {
        self.used_ids.contains(&id)
    }

    /// Registered entry-point assets
    pub fn initial_assets(&self) -> &[AssetId] {
        &self.initial_assets
    }

    /// Builder configuration
    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    fn check_asset_size(&self, len: usize) -> LumpResult<u32> {
        let size = u32::try_from(len).map_err(|_| LumpError::BadSize(len))?;
        if len > self.config.max_lump_size {
            return Err(LumpError::AssetTooLarge {
                size: len,
                max: self.config.max_lump_size,
            });
        }
        Ok(size)
    }

    fn write_bundle(&mut self, dir: &Path, manifest_name: &str) -> LumpResult<Manifest> {
        self.built = true;

        let mut entries = Vec::with_capacity(self.lumps.len());
        for (index, lump) in self.lumps.iter_mut().enumerate() {
            let uncompressed = lump.data.len();
            let checksum = lump.finalize(&self.config)?;

            let path = dir.join(lump_file_name(index));
            fs::write(&path, &lump.data)?;

            debug!(
                "Wrote {} ({} assets, {uncompressed} -> {} bytes, {} checksum {checksum:#x})",
                path.display(),
                lump.assets.len(),
                lump.data.len(),
                self.config.hash_method
            );

            entries.push(LumpEntry::new(
                lump.data.len() as u64,
                checksum,
                self.config.hash_method,
                self.config.compression,
                lump.assets.clone(),
            )?);
        }

        let manifest = Manifest::new(entries, self.initial_assets.clone())?;
        manifest.validate()?;
        manifest.write_to(dir.join(manifest_name))?;

        Ok(manifest)
    }

    /// Write into a staging directory, then move lumps and finally the
    /// manifest into `output_dir`
    fn publish_staged(&mut self, output_dir: &Path, manifest_name: &str) -> LumpResult<Manifest> {
        let staging = output_dir.join(STAGING_DIR_NAME);
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir(&staging)?;

        let result = self
            .write_bundle(&staging, manifest_name)
            .and_then(|manifest| {
                for index in 0..manifest.lumps.len() {
                    let name = lump_file_name(index);
                    fs::rename(staging.join(&name), output_dir.join(&name))?;
                }
                fs::rename(staging.join(manifest_name), output_dir.join(manifest_name))?;
                Ok(manifest)
            });

        if let Err(e) = fs::remove_dir_all(&staging) {
            warn!("Failed to remove staging directory {}: {e}", staging.display());
        }

        result
    }
}

/// Delete consecutive lump files from `first` onwards
fn remove_stale_lumps(dir: &Path, first: usize) -> LumpResult<()> {
    let mut index = first;
    loop {
        let path = dir.join(lump_file_name(index));
        if !path.is_file() {
            return Ok(());
        }
        debug!("Removing stale lump {}", path.display());
        fs::remove_file(&path)?;
        index += 1;
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::lump::CompressionMethod;
    use crate::manifest::DEFAULT_MANIFEST_NAME;
    use crate::test_utils::asset_payload;
    use lumpkit_hash::HashMethod;
    use pretty_assertions::assert_eq;

    fn small_config() -> BuilderConfig {
        BuilderConfig::default()
            .with_max_lump_size(1000)
            .with_compression(CompressionMethod::None)
    }

    #[test]
    fn test_rollover_to_new_lump() {
        let mut builder = LumpBuilder::new(small_config());
        let a = builder.add_asset(&asset_payload(1, 100)).unwrap();
        let b = builder.add_asset(&asset_payload(2, 200)).unwrap();
        let c = builder.add_asset(&asset_payload(3, 750)).unwrap();
        assert_eq!(builder.lump_count(), 2);

        let dir = tempfile::tempdir().unwrap();
        let manifest = builder.build(dir.path(), DEFAULT_MANIFEST_NAME).unwrap();

        assert_eq!(manifest.lumps.len(), 2);
        assert_eq!(manifest.lumps[0].assets.len(), 2);
        assert_eq!(manifest.lumps[0].file_size, 300);
        assert_eq!(manifest.lumps[1].file_size, 750);
        assert_eq!(manifest.locate(a).unwrap().offset, 0);
        assert_eq!(manifest.locate(b).unwrap().offset, 100);
        assert_eq!(manifest.locate(c).unwrap().lump_index, 1);

        assert!(dir.path().join("lump-0000.bin").exists());
        assert!(dir.path().join("lump-0001.bin").exists());
        assert_eq!(
            Manifest::read_from(dir.path().join(DEFAULT_MANIFEST_NAME)).unwrap(),
            manifest
        );
    }

    #[test]
    fn test_exact_fit_stays_in_lump() {
        let mut builder = LumpBuilder::new(small_config());
        builder.add_asset(&asset_payload(1, 400)).unwrap();
        builder.add_asset(&asset_payload(2, 600)).unwrap();
        assert_eq!(builder.lump_count(), 1);
    }

    #[test]
    fn test_duplicate_asset() {
        let mut builder = LumpBuilder::new(small_config());
        let data = asset_payload(7, 64);
        let id = builder.add_asset(&data).unwrap();

        assert!(matches!(
            builder.add_asset(&data),
            Err(LumpError::DuplicateAsset(dup)) if dup == id
        ));
        assert_eq!(builder.add_asset_dedup(&data).unwrap(), id);
        assert_eq!(builder.asset_count(), 1);
        assert_eq!(builder.lumps[0].data.len(), 64);
    }

    #[test]
    fn test_asset_too_large() {
        let mut builder = LumpBuilder::new(small_config());
        let err = builder.add_asset(&asset_payload(0, 1001)).unwrap_err();
        assert!(matches!(
            err,
            LumpError::AssetTooLarge {
                size: 1001,
                max: 1000
            }
        ));
        assert!(err.is_recoverable());
        assert_eq!(builder.lump_count(), 0);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_size_beyond_manifest_field() {
        let builder = LumpBuilder::new(BuilderConfig::default().with_max_lump_size(usize::MAX));
        let len = u32::MAX as usize + 1;
        assert!(matches!(
            builder.check_asset_size(len),
            Err(LumpError::BadSize(n)) if n == len
        ));
    }

    #[test]
    fn test_unresolved_initial_asset() {
        let mut builder = LumpBuilder::new(small_config());
        builder.add_asset(b"present").unwrap();
        let missing = AssetId::from_data(b"missing");
        builder.add_initial_asset(missing);

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            builder.build(dir.path(), DEFAULT_MANIFEST_NAME),
            Err(LumpError::UnresolvedAsset(id)) if id == missing
        ));
        assert!(!dir.path().join(DEFAULT_MANIFEST_NAME).exists());
    }

    #[test]
    fn test_build_twice_rejected() {
        let mut builder = LumpBuilder::new(small_config());
        builder.add_asset(b"asset").unwrap();

        let dir = tempfile::tempdir().unwrap();
        builder.build(dir.path(), DEFAULT_MANIFEST_NAME).unwrap();

        assert!(matches!(
            builder.build(dir.path(), DEFAULT_MANIFEST_NAME),
            Err(LumpError::BadContents(_))
        ));
        assert!(matches!(
            builder.add_asset(b"late asset"),
            Err(LumpError::BadContents(_))
        ));
    }

    #[test]
    fn test_finalize_twice_rejected() {
        let config = small_config();
        let mut lump = PendingLump::default();
        lump.data.extend_from_slice(b"payload");
        lump.finalize(&config).unwrap();
        assert!(matches!(
            lump.finalize(&config),
            Err(LumpError::BadContents(_))
        ));
    }

    #[test]
    fn test_checksum_covers_uncompressed_payload() {
        let config = BuilderConfig::default().with_max_lump_size(1 << 16);
        let mut builder = LumpBuilder::new(config);
        let first = asset_payload(1, 4000);
        let second = asset_payload(2, 4000);
        builder.add_asset(&first).unwrap();
        builder.add_asset(&second).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let manifest = builder.build(dir.path(), DEFAULT_MANIFEST_NAME).unwrap();
        let entry = &manifest.lumps[0];

        let mut payload = first;
        payload.extend_from_slice(&second);
        assert_eq!(entry.compression, CompressionMethod::Lz4);
        assert_eq!(
            entry.checksum,
            checksum_bytes(HashMethod::XxHash32, &payload).unwrap()
        );
        assert!(entry.file_size < payload.len() as u64);
    }

    #[test]
    fn test_atomic_publish_leaves_no_staging() {
        let mut builder = LumpBuilder::new(small_config().with_atomic_publish(true));
        builder.add_asset(&asset_payload(1, 600)).unwrap();
        builder.add_asset(&asset_payload(2, 600)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let manifest = builder.build(dir.path(), DEFAULT_MANIFEST_NAME).unwrap();

        assert_eq!(manifest.lumps.len(), 2);
        assert!(dir.path().join("lump-0001.bin").exists());
        assert!(dir.path().join(DEFAULT_MANIFEST_NAME).exists());
        assert!(!dir.path().join(STAGING_DIR_NAME).exists());
    }

    #[test]
    fn test_rebuild_removes_stale_lumps() {
        let dir = tempfile::tempdir().unwrap();

        let mut larger = LumpBuilder::new(small_config());
        for seed in 1..=3 {
            larger.add_asset(&asset_payload(seed, 800)).unwrap();
        }
        larger.build(dir.path(), DEFAULT_MANIFEST_NAME).unwrap();
        assert!(dir.path().join("lump-0002.bin").exists());

        for atomic in [false, true] {
            let mut smaller = LumpBuilder::new(small_config().with_atomic_publish(atomic));
            smaller.add_asset(&asset_payload(9, 100)).unwrap();
            let manifest = smaller.build(dir.path(), DEFAULT_MANIFEST_NAME).unwrap();

            assert_eq!(manifest.lumps.len(), 1);
            assert!(dir.path().join("lump-0000.bin").exists());
            assert!(!dir.path().join("lump-0001.bin").exists());
            assert!(!dir.path().join("lump-0002.bin").exists());
            assert_eq!(
                std::fs::read(dir.path().join("lump-0000.bin")).unwrap(),
                asset_payload(9, 100)
            );
        }
    }

    #[test]
    fn test_empty_builder_writes_empty_manifest() {
        let mut builder = LumpBuilder::new(small_config());
        let dir = tempfile::tempdir().unwrap();
        let manifest = builder.build(dir.path(), DEFAULT_MANIFEST_NAME).unwrap();
        assert!(manifest.lumps.is_empty());
        assert!(dir.path().join(DEFAULT_MANIFEST_NAME).exists());
    }
}
