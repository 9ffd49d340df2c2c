use common::{api::ApiError, config::ConfigError};
use derive_more::{Display, Error, From};

use crate::{
    commands::{List, TagDisplay, DEFAULT_LIST_COUNT},
    context::{Context, ContextError},
    output::{parse_fields, render_tags, OutputError},
    reconciler::LIST_PAGE_LIMIT,
};

/// `version list` subcommand errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum ListError {
    /// Configuration error.
    Config(ConfigError),

    /// Unable to prepare the API client.
    Context(ContextError),

    /// Remote API error.
    Api(ApiError),

    /// Unable to render versions.
    Output(OutputError),
}

/// List flow entrypoint.
pub(crate) fn list(
    context: &Context,
    List {
        count,
        display: TagDisplay { fields, format },
    }: List,
) -> Result<(), ListError> {
    let fields = parse_fields(fields.as_deref())?;
    let manifest = context.manifest()?;
    let api = context.api()?;

    let tags = api.list_tags(&manifest.plugin_id, page_size(count))?;

    println!("{}", render_tags(&tags, format, &fields)?);

    Ok(())
}

/// Requested counts outside of the supported range fall back to the default.
fn page_size(count: usize) -> usize {
    if (1..=LIST_PAGE_LIMIT).contains(&count) {
        count
    } else {
        DEFAULT_LIST_COUNT
    }
}
