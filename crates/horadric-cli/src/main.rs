//! horadric binary entry point.
//!
//! Parses arguments, initializes logging, opens the configured archives and
//! runs one command against them.

mod commands;
mod config;

use std::io;

use anyhow::Result;
use config::{Cli, Command};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::from_args();
    cli.validate()?;
    tracing::debug!(
        "Configuration: data dir {}, archives {:?}",
        cli.data_dir.display(),
        cli.archives
    );

    let mut registry = cli.open_registry()?;
    let mut stdout = io::stdout().lock();

    match &cli.command {
        Command::List { archive, listfile } => {
            commands::list(&mut registry, archive, listfile.as_deref(), &mut stdout)?;
        }
        Command::Extract { name, output, from } => {
            commands::extract(&mut registry, name, output.as_deref(), from.as_deref())?;
        }
        Command::Inspect { archive } => commands::inspect(&mut registry, archive, &mut stdout)?,
        Command::Dcc { name, direction } => {
            commands::dcc(&mut registry, name, *direction, &mut stdout)?;
        }
    }

    Ok(())
}
