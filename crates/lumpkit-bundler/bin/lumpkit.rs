//! lumpkit binary entry point.
//!
//! Parses the command line, initializes logging and dispatches to the
//! lumpkit-bundler library.

use anyhow::Result;
use lumpkit_bundler::{Cli, LogFormat};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::from_args();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }

    tracing::debug!("Running {:?}", cli.command);

    lumpkit_bundler::run(cli)
}
