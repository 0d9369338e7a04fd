//! Command-line bundler for asset lumps.
//!
//! The `lumpkit` binary is a thin wrapper around this library:
//! - `config`: command-line and environment configuration
//! - `commands`: `pack`, `inspect`, `verify` and `extract`
//!
//! # Example
//!
//! ```no_run
//! use lumpkit_bundler::config::{Cli, Command};
//! use lumpkit_bundler::commands;
//!
//! fn main() -> anyhow::Result<()> {
//!     let cli = Cli::from_args();
//!     if let Command::Verify(args) = &cli.command {
//!         let report = commands::verify(args)?;
//!         println!("{} failures", report.failures.len());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod commands;
pub mod config;

pub use commands::{InspectReport, PackSummary, VerifyReport, run};
pub use config::{Cli, Command, LogFormat};
