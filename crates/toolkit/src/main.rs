//! # Freemius Toolkit
//!
//! Package WordPress plugin sources into a zip archive and manage the plugin
//! versions deployed to Freemius.
//!
//! The files to package are listed in the `.freemius.yml` manifest of the
//! project directory, developer credentials are read from a `.freemius`
//! dotenv file.

#![deny(missing_docs)]

use std::env::current_dir;

use clap::Parser;
use commands::{Cli, Commands, VersionCommands};
use common::{config::Config, logging};
use context::Context;

/// Plugin source code archiving utilities.
mod archiver;

/// CLI subcommands.
mod commands;

/// Per-invocation command dependencies.
mod context;

/// Tag list rendering.
mod output;

/// Plugin header parsing.
mod plugin;

/// Deployed version reconciliation.
mod reconciler;

/// CLI entrypoint.
fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    let config = Config::new(cli.config_file)?;

    logging::init(&config, cli.verbose);

    let context = Context::new(config, current_dir()?);

    match cli.command {
        Commands::Info => commands::info(),
        Commands::Ping => commands::ping(&context)?,
        Commands::Version(command) => match command {
            VersionCommands::Deploy(args) => commands::deploy(&context, args)?,
            VersionCommands::Delete(args) => commands::delete(&context, args)?,
            VersionCommands::Download(args) => commands::download(&context, args)?,
            VersionCommands::List(args) => commands::list(&context, args)?,
        },
    }

    Ok(())
}
