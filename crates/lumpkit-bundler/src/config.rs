//! Command-line configuration.
//!
//! Every option can be given as a flag or through a `LUMPKIT_*` environment
//! variable. Pack settings may additionally come from a JSON file
//! (`--config`); flags given on the command line override the file.
//!
//! # Example
//!
//! ```no_run
//! use lumpkit_bundler::Cli;
//!
//! let cli = Cli::from_args();
//! println!("{:?}", cli.command);
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use lumpkit_formats::config::{BuilderConfig, LoadPolicy};
use lumpkit_formats::lump::{CompressionMethod, LumpResult};
use lumpkit_formats::manifest::DEFAULT_MANIFEST_NAME;
use lumpkit_hash::HashMethod;
use std::path::PathBuf;

/// Top-level command line.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "lumpkit",
    about = "Pack, inspect and verify content-addressed asset lump bundles",
    version
)]
pub struct Cli {
    /// Log output format
    #[arg(
        long,
        global = true,
        env = "LUMPKIT_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Text
    )]
    pub log_format: LogFormat,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

/// Available subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Pack every file below a directory into a bundle
    Pack(PackArgs),
    /// Print the manifest of a bundle
    Inspect(InspectArgs),
    /// Check length, checksum and decompression of every lump
    Verify(BundleArgs),
    /// Write one asset of a bundle to a file
    Extract(ExtractArgs),
}

/// Compression choices accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompressionArg {
    /// Store lumps uncompressed
    None,
    /// LZ4 frame per lump
    Lz4,
}

impl From<CompressionArg> for CompressionMethod {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::None => Self::None,
            CompressionArg::Lz4 => Self::Lz4,
        }
    }
}

/// Checksum choices accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HashArg {
    /// No checksum
    None,
    /// XXH32 over the uncompressed payload
    Xxhash32,
}

impl From<HashArg> for HashMethod {
    fn from(arg: HashArg) -> Self {
        match arg {
            HashArg::None => Self::None,
            HashArg::Xxhash32 => Self::XxHash32,
        }
    }
}

/// Load policy presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Verify, warn on failures, approve unknown methods
    Permissive,
    /// Verify and refuse anything that fails
    Strict,
    /// Skip verification
    Trusting,
}

impl From<PolicyArg> for LoadPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Permissive => Self::permissive(),
            PolicyArg::Strict => Self::strict(),
            PolicyArg::Trusting => Self::trusting(),
        }
    }
}

/// Arguments for `pack`.
#[derive(Debug, Clone, Args)]
pub struct PackArgs {
    /// Directory holding serialized asset files
    pub source: PathBuf,

    /// Bundle output directory
    pub output: PathBuf,

    /// Builder settings as JSON
    #[arg(long, env = "LUMPKIT_BUILDER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Lump capacity in bytes
    #[arg(long, env = "LUMPKIT_MAX_LUMP_SIZE")]
    pub max_lump_size: Option<usize>,

    /// Lump compression
    #[arg(long, env = "LUMPKIT_COMPRESSION", value_enum)]
    pub compression: Option<CompressionArg>,

    /// Lump checksum
    #[arg(long = "hash", env = "LUMPKIT_HASH", value_enum)]
    pub hash_method: Option<HashArg>,

    /// Stage files and publish the manifest last
    #[arg(long, env = "LUMPKIT_ATOMIC")]
    pub atomic: bool,

    /// Manifest file name inside the bundle
    #[arg(long, env = "LUMPKIT_MANIFEST_NAME", default_value = DEFAULT_MANIFEST_NAME)]
    pub manifest_name: String,

    /// Entry-point asset, as a path relative to the source directory
    #[arg(long = "initial", value_name = "PATH")]
    pub initial: Vec<String>,
}

impl PackArgs {
    /// Resolve the builder configuration from the JSON file and flags.
    pub fn builder_config(&self) -> LumpResult<BuilderConfig> {
        let mut config = match &self.config {
            Some(path) => BuilderConfig::from_json_file(path)?,
            None => BuilderConfig::default(),
        };

        if let Some(size) = self.max_lump_size {
            config = config.with_max_lump_size(size);
        }
        if let Some(compression) = self.compression {
            config = config.with_compression(compression.into());
        }
        if let Some(hash_method) = self.hash_method {
            config = config.with_hash_method(hash_method.into());
        }
        if self.atomic {
            config = config.with_atomic_publish(true);
        }

        config.validate()?;
        Ok(config)
    }
}

/// Bundle location shared by the read-side commands.
#[derive(Debug, Clone, Args)]
pub struct BundleArgs {
    /// Bundle directory
    pub bundle: PathBuf,

    /// Manifest file name inside the bundle
    #[arg(long, env = "LUMPKIT_MANIFEST_NAME", default_value = DEFAULT_MANIFEST_NAME)]
    pub manifest_name: String,
}

/// Arguments for `inspect`.
#[derive(Debug, Clone, Args)]
pub struct InspectArgs {
    /// Bundle to inspect
    #[command(flatten)]
    pub bundle: BundleArgs,

    /// List every asset, not just lump totals
    #[arg(long)]
    pub assets: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `extract`.
#[derive(Debug, Clone, Args)]
pub struct ExtractArgs {
    /// Bundle to read from
    #[command(flatten)]
    pub bundle: BundleArgs,

    /// Asset id as 16 hex digits
    pub id: String,

    /// Destination file
    pub out: PathBuf,

    /// Load policy applied to the owning lump
    #[arg(long, env = "LUMPKIT_POLICY", value_enum, default_value_t = PolicyArg::Permissive)]
    pub policy: PolicyArg,
}
