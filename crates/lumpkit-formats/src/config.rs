//! Configuration for lump building and loading

use lumpkit_hash::HashMethod;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::lump::{CompressionMethod, LumpError, LumpResult, MAX_DECOMPRESSION_SIZE};

/// Default maximum lump size (16 MiB)
pub const DEFAULT_MAX_LUMP_SIZE: usize = 16 * 1024 * 1024;

/// Configuration for [`LumpBuilder`](crate::lump::LumpBuilder)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Capacity of one lump in bytes; no asset may exceed it
    pub max_lump_size: usize,

    /// Compression applied to every lump at build time
    pub compression: CompressionMethod,

    /// Checksum recorded for every lump's uncompressed payload
    pub hash_method: HashMethod,

    /// Stage files and publish the manifest last
    pub atomic_publish: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_lump_size: DEFAULT_MAX_LUMP_SIZE,
            compression: CompressionMethod::Lz4,
            hash_method: HashMethod::XxHash32,
            atomic_publish: false,
        }
    }
}

impl BuilderConfig {
    /// Load a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> LumpResult<Self> {
        read_json(path.as_ref())
    }

    /// Set the lump capacity
    #[must_use]
    pub const fn with_max_lump_size(mut self, size: usize) -> Self {
        self.max_lump_size = size;
        self
    }

    /// Set the compression method
    #[must_use]
    pub const fn with_compression(mut self, compression: CompressionMethod) -> Self {
        self.compression = compression;
        self
    }

    /// Set the checksum method
    #[must_use]
    pub const fn with_hash_method(mut self, hash_method: HashMethod) -> Self {
        self.hash_method = hash_method;
        self
    }

    /// Enable or disable staged publication
    #[must_use]
    pub const fn with_atomic_publish(mut self, enable: bool) -> Self {
        self.atomic_publish = enable;
        self
    }

    /// Reject settings the builder cannot honor
    pub fn validate(&self) -> LumpResult<()> {
        if self.max_lump_size == 0 {
            return Err(LumpError::Config(
                "max_lump_size must be greater than zero".to_string(),
            ));
        }
        // Readers refuse to inflate anything larger
        if self.max_lump_size > MAX_DECOMPRESSION_SIZE {
            return Err(LumpError::Config(format!(
                "max_lump_size {} exceeds the {MAX_DECOMPRESSION_SIZE} byte load limit",
                self.max_lump_size
            )));
        }
        if let CompressionMethod::Unknown(tag) = self.compression {
            return Err(LumpError::UnknownMethod {
                kind: "compression",
                tag,
            });
        }
        if let HashMethod::Unknown(tag) = self.hash_method {
            return Err(LumpError::UnknownMethod { kind: "hash", tag });
        }
        Ok(())
    }
}

/// How a reader treats verification results and unknown method tags
///
/// The default is the permissive policy: lumps with no or unknown hash
/// methods are approved, unknown compression is read as raw bytes, and
/// failed checks are logged but do not stop the load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadPolicy {
    /// Compare the file size against the manifest before loading
    pub verify_length: bool,

    /// Recompute the payload checksum before loading
    pub verify_hash: bool,

    /// Drop the lump when a length or checksum check fails
    pub integrity_failures_fatal: bool,

    /// Treat unknown hash or compression tags as failures
    pub strict_methods: bool,
}

impl Default for LoadPolicy {
    fn default() -> Self {
        Self::permissive()
    }
}

impl LoadPolicy {
    /// Verify everything but only warn on failures; approve unknown methods
    pub const fn permissive() -> Self {
        Self {
            verify_length: true,
            verify_hash: true,
            integrity_failures_fatal: false,
            strict_methods: false,
        }
    }

    /// Verify everything and refuse any lump that fails or uses unknown methods
    pub const fn strict() -> Self {
        Self {
            verify_length: true,
            verify_hash: true,
            integrity_failures_fatal: true,
            strict_methods: true,
        }
    }

    /// Skip all verification; unknown methods are still handled permissively
    pub const fn trusting() -> Self {
        Self {
            verify_length: false,
            verify_hash: false,
            integrity_failures_fatal: false,
            strict_methods: false,
        }
    }

    /// Load a policy from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> LumpResult<Self> {
        read_json(path.as_ref())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> LumpResult<T> {
    let data = std::fs::read(path)?;
    serde_json::from_slice(&data).map_err(|e| {
        LumpError::Config(format!("Invalid configuration {}: {e}", path.display()))
    })
}
