use std::{fs, io, path::PathBuf};

use common::{api::ApiError, config::ConfigError};
use derive_more::{Display, Error, From};

use crate::{
    commands::Download,
    context::{Context, ContextError},
};

/// `version download` subcommand errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum DownloadError {
    /// Configuration error.
    Config(ConfigError),

    /// Unable to prepare the API client.
    Context(ContextError),

    /// Remote API error.
    Api(ApiError),

    /// IO-related error.
    Io(io::Error),
}

/// Download flow entrypoint.
pub(crate) fn download(
    context: &Context,
    Download { id, premium, file }: Download,
) -> Result<(), DownloadError> {
    let manifest = context.manifest()?;
    let api = context.api()?;

    let archive = api.download_tag(&manifest.plugin_id, &id, premium)?;

    let path = file.unwrap_or_else(|| {
        context
            .project_dir()
            .join(default_file_name(&manifest.plugin_id, &id, premium))
    });

    fs::write(&path, &archive)?;

    println!(
        "Success: Version {id} has been saved to {} ({} bytes).",
        path.display(),
        archive.len()
    );

    Ok(())
}

/// Archive name used when no `--file` was provided.
fn default_file_name(plugin_id: &str, id: &str, premium: bool) -> PathBuf {
    if premium {
        PathBuf::from(format!("{plugin_id}-{id}-premium.zip"))
    } else {
        PathBuf::from(format!("{plugin_id}-{id}.zip"))
    }
}
