/// `version delete` subcommand.
mod delete;

/// `version deploy` subcommand.
mod deploy;

/// `version download` subcommand.
mod download;

/// `info` subcommand.
mod info;

/// `version list` subcommand.
mod list;

/// `ping` subcommand.
mod ping;

pub(crate) use delete::delete;
pub(crate) use deploy::deploy;
pub(crate) use download::download;
pub(crate) use info::info;
pub(crate) use list::list;
pub(crate) use ping::ping;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::Format;

/// Default amount of tags displayed by `version list`.
pub(crate) const DEFAULT_LIST_COUNT: usize = 25;

/// CLI configuration.
#[derive(Parser)]
#[command(about, version)]
pub(crate) struct Cli {
    /// Tool configuration file path.
    #[arg(short, long, env = "FS_TOOLKIT_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Selected subcommand.
    #[command(subcommand)]
    pub command: Commands,
}

/// Supported subcommands.
#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Display general information about the toolkit.
    Info,

    /// Test the connection with the Freemius API.
    Ping,

    /// Manage plugin versions.
    #[command(subcommand)]
    Version(VersionCommands),
}

/// `version` subcommands.
#[derive(Subcommand)]
pub(crate) enum VersionCommands {
    /// Deploy a new version of the plugin.
    Deploy(Deploy),

    /// Delete existing versions.
    Delete(Delete),

    /// Download a version archive.
    Download(Download),

    /// List plugin versions.
    List(List),
}

/// Tag display options shared by commands that print tags.
#[derive(Args)]
pub(crate) struct TagDisplay {
    /// Comma-separated list of fields to display.
    #[arg(long)]
    pub fields: Option<String>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Table)]
    pub format: Format,
}

/// `version deploy` subcommand configuration.
#[derive(Args)]
pub(crate) struct Deploy {
    /// Create the zip archive without deploying it to the API.
    #[arg(long)]
    pub local: bool,

    /// Add Freemius as a contributor of the plugin.
    #[arg(long)]
    pub add_freemius_contributor: bool,

    /// Update an already deployed version without asking for confirmation.
    #[arg(short, long)]
    pub force: bool,

    /// Answer yes to the update confirmation.
    #[arg(short, long)]
    pub yes: bool,

    /// Deployed version display options.
    #[command(flatten)]
    pub display: TagDisplay,
}

/// `version delete` subcommand configuration.
#[derive(Args)]
pub(crate) struct Delete {
    /// One or more identifiers of versions to delete.
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Answer yes to the confirmation message.
    #[arg(short, long)]
    pub yes: bool,
}

/// `version download` subcommand configuration.
#[derive(Args)]
pub(crate) struct Download {
    /// Identifier of the version to download.
    pub id: String,

    /// Download the premium version of the plugin.
    #[arg(long)]
    pub premium: bool,

    /// Path where to save the downloaded archive.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

/// `version list` subcommand configuration.
#[derive(Args)]
pub(crate) struct List {
    /// Amount of versions to display, from 1 to 50.
    #[arg(long, default_value_t = DEFAULT_LIST_COUNT)]
    pub count: usize,

    /// Version display options.
    #[command(flatten)]
    pub display: TagDisplay,
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Cli, Commands, VersionCommands};
    use crate::output::Format;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_deploy_flags() {
        let cli = Cli::parse_from([
            "freemius-toolkit",
            "version",
            "deploy",
            "--add-freemius-contributor",
            "--force",
            "--format=json",
            "--fields=id,version",
        ]);

        let Commands::Version(VersionCommands::Deploy(deploy)) = cli.command else {
            panic!("expected deploy command");
        };

        assert!(deploy.add_freemius_contributor);
        assert!(deploy.force);
        assert!(!deploy.local);
        assert_eq!(deploy.display.format, Format::Json);
        assert_eq!(deploy.display.fields.as_deref(), Some("id,version"));
    }

    #[test]
    fn delete_requires_ids() {
        assert!(Cli::try_parse_from(["freemius-toolkit", "version", "delete"]).is_err());
    }
}
