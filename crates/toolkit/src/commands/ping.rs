use common::api::ApiError;
use derive_more::{Display, Error, From};

use crate::context::{Context, ContextError};

/// `ping` subcommand errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum PingError {
    /// Unable to prepare the API client.
    Context(ContextError),

    /// Remote API error.
    Api(ApiError),
}

/// Ping flow entrypoint.
pub(crate) fn ping(context: &Context) -> Result<(), PingError> {
    let greeting = context.api()?.ping()?;

    println!("Success: {greeting}");

    Ok(())
}
