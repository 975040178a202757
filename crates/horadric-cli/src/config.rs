//! Command-line configuration.
//!
//! Options can be given as arguments or through the environment:
//! - `--data-dir` / `HORADRIC_DATA_DIR`: directory archives are opened from
//! - `--archives` / `HORADRIC_ARCHIVES`: comma-separated archive files, in
//!   search order

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use horadric_formats::mpq::{ArchiveRegistry, DiskProvider, OpenOptions};
use tracing::info;

/// Arguments shared by every command
#[derive(Debug, Clone, Parser)]
#[command(
    name = "horadric",
    about = "Read files from MPQ archives and decode DCC animations",
    version
)]
pub struct Cli {
    /// Directory the archives live in
    #[arg(long, global = true, env = "HORADRIC_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Archives to search, first match wins
    #[arg(
        long,
        global = true,
        env = "HORADRIC_ARCHIVES",
        value_delimiter = ',',
        default_value = "d2data.mpq,d2exp.mpq,d2char.mpq"
    )]
    pub archives: Vec<String>,

    /// Accept archives whose block count is not a power of two
    #[arg(long, global = true)]
    pub lenient: bool,

    /// Skip sector checksum verification
    #[arg(long, global = true)]
    pub no_verify: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List the files named in an archive's listfile
    List {
        /// Archive to list, as given in `--archives`
        archive: String,

        /// Read candidate names from this file instead of the archive's (listfile)
        #[arg(long)]
        listfile: Option<PathBuf>,
    },

    /// Copy a file out of the archives
    Extract {
        /// Path of the file inside the archives
        name: String,

        /// Destination, defaults to the file name in the current directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only search this archive
        #[arg(long)]
        from: Option<String>,
    },

    /// Show an archive's header and table summary
    Inspect {
        /// Archive to inspect, as given in `--archives`
        archive: String,
    },

    /// Decode a DCC animation and summarize its directions
    Dcc {
        /// Path of the animation inside the archives
        name: String,

        /// Decode only this direction
        #[arg(short, long)]
        direction: Option<usize>,
    },
}

impl Cli {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Check the configuration before any archive is opened
    pub fn validate(&self) -> Result<()> {
        if !self.data_dir.is_dir() {
            bail!("data directory not found: {}", self.data_dir.display());
        }
        if self.archives.iter().all(|name| name.trim().is_empty()) {
            bail!("no archives configured");
        }
        Ok(())
    }

    /// Options every archive is opened with
    pub fn open_options(&self) -> OpenOptions {
        OpenOptions::new()
            .strict_block_count(!self.lenient)
            .verify_sector_checksums(!self.no_verify)
    }

    /// Open the configured archives in search order
    ///
    /// Archives that are missing from the data directory are skipped;
    /// any other failure aborts.
    pub fn open_registry(&self) -> Result<ArchiveRegistry> {
        let provider = DiskProvider::new(&self.data_dir);
        let options = self.open_options();
        let mut registry = ArchiveRegistry::new();

        for name in self.archives.iter().map(|name| name.trim()) {
            if name.is_empty() {
                continue;
            }
            if !self.data_dir.join(name).is_file() {
                info!("Archive {} not present in {}", name, self.data_dir.display());
                continue;
            }
            registry
                .open_with(&options, &provider, name, name)
                .with_context(|| format!("failed to open archive {name}"))?;
        }

        if registry.is_empty() {
            bail!("none of the configured archives exist in {}", self.data_dir.display());
        }
        info!("Opened {} archives", registry.len());
        Ok(registry)
    }
}
