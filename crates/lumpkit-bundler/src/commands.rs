//! Subcommand implementations.
//!
//! Each command returns a report value so it can be tested without
//! capturing stdout; [`run`] prints the reports.

use anyhow::{Context, Result, bail};
use lumpkit_formats::bundle::Bundle;
use lumpkit_formats::config::LoadPolicy;
use lumpkit_formats::lump::{LumpBuilder, LumpReader};
use lumpkit_formats::manifest::{LumpEntry, Manifest, lump_file_name};
use lumpkit_hash::AssetId;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{BundleArgs, Cli, Command, ExtractArgs, InspectArgs, PackArgs};

/// File written next to the manifest mapping source paths to asset ids
pub const ALIASES_FILE_NAME: &str = "aliases.json";

/// Outcome of `pack`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSummary {
    /// Source files visited
    pub files: usize,
    /// Distinct assets packed
    pub assets: usize,
    /// Lump files written
    pub lumps: usize,
    /// Relative source path to asset id
    pub aliases: BTreeMap<String, AssetId>,
}

/// Serializable view of a manifest
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    /// Manifest format version
    pub version: u32,
    /// Per-lump details
    pub lumps: Vec<LumpReport>,
    /// Entry-point asset ids as hex
    pub initial_assets: Vec<String>,
    /// Total bytes on disk
    pub total_file_size: u64,
    /// Total decompressed bytes
    pub total_uncompressed_size: u64,
}

/// One lump in an [`InspectReport`]
#[derive(Debug, Clone, Serialize)]
pub struct LumpReport {
    /// Lump file name
    pub file: String,
    /// Bytes on disk
    pub file_size: u64,
    /// Decompressed bytes
    pub uncompressed_size: u64,
    /// Compression method
    pub compression: String,
    /// Checksum method
    pub hash_method: String,
    /// Recorded checksum
    pub checksum: u64,
    /// Number of assets
    pub asset_count: usize,
    /// Assets with offsets, when requested
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<AssetReport>,
}

/// One asset in a [`LumpReport`]
#[derive(Debug, Clone, Serialize)]
pub struct AssetReport {
    /// Asset id as hex
    pub id: String,
    /// Offset inside the decompressed lump
    pub offset: u64,
    /// Serialized size
    pub size: u32,
}

/// Outcome of `verify`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Lumps checked
    pub lumps_checked: usize,
    /// `(lump index, reason)` for every lump that failed
    pub failures: Vec<(usize, String)>,
}

impl VerifyReport {
    /// Whether every lump passed
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Dispatch a parsed command line
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Pack(args) => {
            let summary = pack(&args)?;
            println!(
                "Packed {} files as {} assets in {} lumps into {}",
                summary.files,
                summary.assets,
                summary.lumps,
                args.output.display()
            );
        }
        Command::Inspect(args) => {
            let report = inspect(&args)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Command::Verify(args) => {
            let report = verify(&args)?;
            for (index, reason) in &report.failures {
                println!("lump {index}: FAILED ({reason})");
            }
            if !report.is_ok() {
                bail!(
                    "{} of {} lumps failed verification",
                    report.failures.len(),
                    report.lumps_checked
                );
            }
            println!("All {} lumps verified", report.lumps_checked);
        }
        Command::Extract(args) => {
            let written = extract(&args)?;
            println!("Wrote {written} bytes to {}", args.out.display());
        }
    }

    Ok(())
}

/// Pack every regular file below `args.source`
///
/// Files are visited in sorted path order so identical trees produce
/// identical bundles. Identical files are packed once.
pub fn pack(args: &PackArgs) -> Result<PackSummary> {
    if !args.source.is_dir() {
        bail!("Source {} is not a directory", args.source.display());
    }

    let config = args
        .builder_config()
        .context("Failed to resolve builder configuration")?;
    let mut builder = LumpBuilder::new(config);
    let mut aliases = BTreeMap::new();
    let mut files = 0;

    for entry in WalkDir::new(&args.source).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", args.source.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = relative_name(&args.source, path)?;
        let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let id = builder
            .add_asset_dedup(&data)
            .with_context(|| format!("Failed to add {relative}"))?;

        debug!("{relative} -> {id}");
        aliases.insert(relative, id);
        files += 1;
    }

    for name in &args.initial {
        let name = name.replace('\\', "/");
        let Some(id) = aliases.get(&name) else {
            bail!("Initial asset {name} is not a file in {}", args.source.display());
        };
        builder.add_initial_asset(*id);
    }

    let manifest = builder
        .build(&args.output, &args.manifest_name)
        .with_context(|| format!("Failed to build bundle in {}", args.output.display()))?;

    let alias_json: BTreeMap<&str, String> = aliases
        .iter()
        .map(|(name, id)| (name.as_str(), id.to_hex()))
        .collect();
    let alias_path = args.output.join(ALIASES_FILE_NAME);
    fs::write(&alias_path, serde_json::to_vec_pretty(&alias_json)?)
        .with_context(|| format!("Failed to write {}", alias_path.display()))?;

    info!(
        "Packed {files} files from {} into {}",
        args.source.display(),
        args.output.display()
    );

    Ok(PackSummary {
        files,
        assets: manifest.asset_count(),
        lumps: manifest.lumps.len(),
        aliases,
    })
}

/// Describe the manifest of a bundle
pub fn inspect(args: &InspectArgs) -> Result<InspectReport> {
    let manifest = read_manifest(&args.bundle)?;

    let lumps = manifest
        .lumps
        .iter()
        .enumerate()
        .map(|(index, lump)| LumpReport {
            file: lump_file_name(index),
            file_size: lump.file_size,
            uncompressed_size: lump.uncompressed_size(),
            compression: lump.compression.to_string(),
            hash_method: lump.hash_method.to_string(),
            checksum: lump.checksum,
            asset_count: lump.assets.len(),
            assets: if args.assets {
                lump.asset_offsets()
                    .map(|(asset, offset)| AssetReport {
                        id: asset.id.to_hex(),
                        offset,
                        size: asset.size,
                    })
                    .collect()
            } else {
                Vec::new()
            },
        })
        .collect();

    Ok(InspectReport {
        version: manifest.header.version,
        lumps,
        initial_assets: manifest
            .initial_assets
            .iter()
            .map(|id| id.to_hex())
            .collect(),
        total_file_size: manifest.total_file_size(),
        total_uncompressed_size: manifest.total_uncompressed_size(),
    })
}

/// Check every lump of a bundle under the strict policy
///
/// Verification failures are collected, not returned as errors; only an
/// unreadable manifest fails the command itself.
pub fn verify(args: &BundleArgs) -> Result<VerifyReport> {
    let manifest = read_manifest(args)?;
    let mut report = VerifyReport::default();

    for (index, entry) in manifest.lumps.iter().enumerate() {
        let path = args.bundle.join(lump_file_name(index));
        let mut reader = LumpReader::with_policy(path, LoadPolicy::strict());

        report.lumps_checked += 1;
        match verify_lump(&mut reader, entry) {
            Ok(()) => debug!("Lump {index} verified"),
            Err(reason) => {
                warn!("Lump {index} failed verification: {reason}");
                report.failures.push((index, reason));
            }
        }
    }

    Ok(report)
}

/// Write one asset to `args.out`, returning the number of bytes written
pub fn extract(args: &ExtractArgs) -> Result<usize> {
    let id: AssetId = args
        .id
        .parse()
        .with_context(|| format!("Invalid asset id {}", args.id))?;

    let mut bundle = Bundle::open(
        &args.bundle.bundle,
        &args.bundle.manifest_name,
        LoadPolicy::from(args.policy),
    )
    .with_context(|| format!("Failed to open bundle {}", args.bundle.bundle.display()))?;

    let bytes = bundle
        .load_asset(id)
        .with_context(|| format!("Failed to load asset {id}"))?;
    fs::write(&args.out, bytes)
        .with_context(|| format!("Failed to write {}", args.out.display()))?;

    Ok(bytes.len())
}

fn verify_lump(reader: &mut LumpReader, entry: &LumpEntry) -> std::result::Result<(), String> {
    if !reader.verify_length(entry.file_size) {
        return Err(format!("length differs from {} bytes", entry.file_size));
    }
    if !reader.verify_hash(entry.hash_method, entry.checksum, entry.compression) {
        return Err(format!("{} checksum mismatch", entry.hash_method));
    }
    reader
        .decompress(entry.compression)
        .map_err(|e| e.to_string())?;

    let loaded = reader.loaded_size().unwrap_or_default() as u64;
    if loaded != entry.uncompressed_size() {
        return Err(format!(
            "decompressed to {loaded} bytes, manifest lists {}",
            entry.uncompressed_size()
        ));
    }

    Ok(())
}

fn read_manifest(args: &BundleArgs) -> Result<Manifest> {
    let path = args.bundle.join(&args.manifest_name);
    Manifest::read_from(&path).with_context(|| format!("Failed to read manifest {}", path.display()))
}

fn relative_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("{} is outside {}", path.display(), root.display()))?;

    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

fn print_report(report: &InspectReport) {
    println!("Manifest version {}", report.version);
    println!(
        "{} lumps, {} bytes on disk, {} bytes uncompressed",
        report.lumps.len(),
        report.total_file_size,
        report.total_uncompressed_size
    );

    for lump in &report.lumps {
        println!(
            "  {}: {} assets, {} -> {} bytes, {} / {} {:#010x}",
            lump.file,
            lump.asset_count,
            lump.file_size,
            lump.uncompressed_size,
            lump.compression,
            lump.hash_method,
            lump.checksum
        );
        for asset in &lump.assets {
            println!("    {} @ {} ({} bytes)", asset.id, asset.offset, asset.size);
        }
    }

    for id in &report.initial_assets {
        println!("Initial asset {id}");
    }
}
