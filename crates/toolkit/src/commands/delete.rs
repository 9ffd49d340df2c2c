use common::{api::ApiError, config::ConfigError};
use derive_more::{Display, Error, From};
use dialoguer::Confirm;

use crate::{
    commands::Delete,
    context::{Context, ContextError},
};

/// `version delete` subcommand errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum DeleteError {
    /// Configuration error.
    Config(ConfigError),

    /// Unable to prepare the API client.
    Context(ContextError),

    /// Remote API error.
    Api(ApiError),

    /// Unable to ask the user for confirmation.
    #[display(fmt = "unable to read confirmation: {}", _0)]
    Prompt(dialoguer::Error),
}

/// Delete flow entrypoint.
pub(crate) fn delete(context: &Context, Delete { ids, yes }: Delete) -> Result<(), DeleteError> {
    let manifest = context.manifest()?;
    let api = context.api()?;

    if !yes
        && !Confirm::new()
            .with_prompt("Are you sure you want to delete this version?")
            .default(false)
            .interact()?
    {
        println!("Aborted.");
        return Ok(());
    }

    for id in ids {
        api.delete_tag(&manifest.plugin_id, &id)?;
        println!("Success: Version {id} has been successfully deleted.");
    }

    Ok(())
}
