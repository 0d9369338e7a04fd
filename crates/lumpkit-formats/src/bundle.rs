//! Bundle loader
//!
//! A bundle is a directory holding a manifest and the lump files it names.
//! [`Bundle`] resolves asset ids through the manifest, opens the owning lump
//! on first use, verifies it under a [`LoadPolicy`] and serves the asset
//! bytes. A lump that fails to load is remembered as failed and refuses its
//! assets; other lumps are unaffected.

use std::path::{Path, PathBuf};

use lumpkit_hash::AssetId;
use tracing::{debug, error, warn};

use crate::config::LoadPolicy;
use crate::lump::{LumpError, LumpReader, LumpResult};
use crate::manifest::{AssetIndex, AssetLocation, LumpEntry, Manifest, lump_file_name};

/// Load state of one lump in a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LumpState {
    /// Not opened yet, or unloaded
    NotLoaded,
    /// Decompressed and serving assets
    Loaded,
    /// Refuses all requests
    Failed(String),
}

#[derive(Debug)]
struct LumpSlot {
    reader: LumpReader,
    failure: Option<String>,
}

/// An opened bundle directory
#[derive(Debug)]
pub struct Bundle {
    dir: PathBuf,
    manifest: Manifest,
    index: AssetIndex,
    policy: LoadPolicy,
    slots: Vec<LumpSlot>,
}

impl Bundle {
    /// Parse the manifest in `dir` and index its assets
    ///
    /// Lump files are not touched until an asset is requested.
    pub fn open<P: AsRef<Path>>(dir: P, manifest_name: &str, policy: LoadPolicy) -> LumpResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let manifest = Manifest::read_from(dir.join(manifest_name))?;
        let index = manifest.index()?;

        let slots = (0..manifest.lumps.len())
            .map(|i| LumpSlot {
                reader: LumpReader::with_policy(dir.join(lump_file_name(i)), policy),
                failure: None,
            })
            .collect();

        debug!(
            "Opened bundle {} with {} lumps and {} assets",
            dir.display(),
            manifest.lumps.len(),
            index.len()
        );

        Ok(Self {
            dir,
            manifest,
            index,
            policy,
            slots,
        })
    }

    /// Bytes of asset `id`, loading its lump if needed
    ///
    /// # Errors
    /// - `UnresolvedAsset` if the manifest does not list `id`
    /// - `LumpUnavailable` if the owning lump failed earlier
    /// - the verification or decompression error on the first failed load
    pub fn load_asset(&mut self, id: AssetId) -> LumpResult<&[u8]> {
        let location = self.locate(id).ok_or(LumpError::UnresolvedAsset(id))?;
        self.ensure_loaded(location.lump_index)?;

        let offset = usize::try_from(location.offset).map_err(|_| LumpError::RangeExceeded {
            offset: usize::MAX,
            size: location.size as usize,
            available: 0,
        })?;

        self.slots[location.lump_index]
            .reader
            .load_asset(offset, location.size as usize)
    }

    /// Entry-point assets listed by the manifest
    pub fn initial_assets(&self) -> &[AssetId] {
        &self.manifest.initial_assets
    }

    /// The parsed manifest
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Where `id` lives, if packed
    pub fn locate(&self, id: AssetId) -> Option<AssetLocation> {
        self.index.get(id)
    }

    /// Whether the bundle packs `id`
    pub fn contains(&self, id: AssetId) -> bool {
        self.index.contains(id)
    }

    /// Bundle directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load state of lump `index`
    pub fn lump_state(&self, index: usize) -> Option<LumpState> {
        self.slots.get(index).map(|slot| match &slot.failure {
            Some(reason) => LumpState::Failed(reason.clone()),
            None if slot.reader.is_loaded() => LumpState::Loaded,
            None => LumpState::NotLoaded,
        })
    }

    /// Drop the decompressed payload of lump `index`
    ///
    /// Failed lumps stay failed. Returns whether the lump was loaded.
    pub fn unload_lump(&mut self, index: usize) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) if slot.reader.is_loaded() => {
                slot.reader.unload();
                true
            }
            _ => false,
        }
    }

    fn ensure_loaded(&mut self, index: usize) -> LumpResult<()> {
        let slot = &mut self.slots[index];
        if let Some(reason) = &slot.failure {
            return Err(LumpError::LumpUnavailable {
                index,
                reason: reason.clone(),
            });
        }
        if slot.reader.is_loaded() {
            return Ok(());
        }

        let entry = &self.manifest.lumps[index];
        match load_lump(&mut slot.reader, entry, self.policy) {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("Lump {index} of {} failed to load: {e}", self.dir.display());
                slot.reader.unload();
                slot.failure = Some(e.to_string());
                Err(e)
            }
        }
    }
}

/// Verify and decompress one lump according to `policy`
fn load_lump(reader: &mut LumpReader, entry: &LumpEntry, policy: LoadPolicy) -> LumpResult<()> {
    let check = |passed: bool, what: &str| -> LumpResult<()> {
        if passed {
            return Ok(());
        }
        let message = format!("{what} check failed for {}", reader.path().display());
        if policy.integrity_failures_fatal {
            return Err(LumpError::IntegrityFailure(message));
        }
        warn!("{message}, loading anyway");
        Ok(())
    };

    if policy.verify_length {
        check(reader.verify_length(entry.file_size), "length")?;
    }
    if policy.verify_hash {
        check(
            reader.verify_hash(entry.hash_method, entry.checksum, entry.compression),
            "checksum",
        )?;
    }

    reader.decompress(entry.compression)?;

    let expected = entry.uncompressed_size();
    let actual = reader.loaded_size().unwrap_or_default() as u64;
    if actual != expected {
        let message = format!(
            "Lump {} holds {actual} bytes, manifest lists {expected}",
            reader.path().display()
        );
        if policy.integrity_failures_fatal {
            return Err(LumpError::IntegrityFailure(message));
        }
        warn!("{message}");
    }

    Ok(())
}
