//! CLI for the cachesync content synchronizer.

mod commands;

use anyhow::Result;
use cachesync_core::checksum::ChecksumAlgorithm;
use cachesync_core::config;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use commands::{run_checksum, run_settings, run_sync, run_verify, BatchArgs};

/// Top-level CLI for cachesync.
#[derive(Debug, Parser)]
#[command(name = "cachesync")]
#[command(about = "cachesync: keep a local file cache in step with its remote sources", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every manifest entry whose local copy is missing or fails its checksum.
    Sync {
        /// Path to the JSON manifest.
        manifest: PathBuf,
        /// Directory the manifest's local paths are relative to (default: config `cache_root`, else cwd).
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,
        /// Number of concurrent workers (default: config `workers`, else CPU count).
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
    },

    /// Check every manifest entry against its checksum.
    Verify {
        /// Path to the JSON manifest.
        manifest: PathBuf,
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
        /// Re-download entries that fail verification.
        #[arg(long)]
        replace: bool,
    },

    /// Print the digest of a file.
    Checksum {
        /// Path to the file.
        path: PathBuf,
        /// md5, sha1, sha256 or sha512.
        #[arg(long, short, default_value = "sha256")]
        algorithm: ChecksumAlgorithm,
    },

    /// Read or write persisted settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Print the JSON value stored under KEY.
    Get { key: String },
    /// Store VALUE (parsed as JSON, else taken as a string) under KEY.
    Set { key: String, value: String },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Sync {
                manifest,
                root,
                workers,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_sync(&cfg, BatchArgs { manifest, root, workers }).await?;
            }
            CliCommand::Verify {
                manifest,
                root,
                workers,
                replace,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_verify(&cfg, BatchArgs { manifest, root, workers }, replace).await?;
            }
            CliCommand::Checksum { path, algorithm } => run_checksum(&path, algorithm)?,
            CliCommand::Settings { action } => run_settings(action)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
