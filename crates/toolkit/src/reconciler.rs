//! Decide whether a deployment creates a new version or updates an existing one.
//!
//! The Freemius API does not distinguish between the two: both upload a new
//! archive for the plugin. An update is a version that already exists remotely
//! and must be confirmed (or forced) before it is uploaded again.
//!
//! Only the most recent [`LIST_PAGE_LIMIT`] tags are checked. An older tag with
//! the same version is not detected.

use std::path::Path;

use common::api::{ApiError, FreemiusApi, VersionTag};
use derive_more::{Display, Error, From};

use crate::archiver::Package;

/// Maximum amount of tags returned by a single listing request.
pub(crate) const LIST_PAGE_LIMIT: usize = 50;

/// Remote tag storage used by the reconciliation.
pub(crate) trait TagRemote {
    /// List at most `count` most recent tags.
    fn list_tags(&self, count: usize) -> Result<Vec<VersionTag>, ApiError>;

    /// Upload a package as a new tag.
    fn create_tag(&self, package: &Path, add_contributor: bool) -> Result<VersionTag, ApiError>;
}

/// Tags of a single plugin.
pub(crate) struct PluginTags<'a> {
    /// API client.
    pub api: &'a FreemiusApi,

    /// Plugin identifier.
    pub plugin_id: &'a str,
}

impl TagRemote for PluginTags<'_> {
    fn list_tags(&self, count: usize) -> Result<Vec<VersionTag>, ApiError> {
        self.api.list_tags(self.plugin_id, count)
    }

    fn create_tag(&self, package: &Path, add_contributor: bool) -> Result<VersionTag, ApiError> {
        self.api.create_tag(self.plugin_id, package, add_contributor)
    }
}

/// Next step after comparing the local version with remote tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Plan {
    /// Version is not deployed yet.
    Create,

    /// Version exists, user must confirm the update.
    ConfirmUpdate,

    /// Version exists, update was forced.
    Update,
}

/// Kind of a finished deployment, used for user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Release {
    /// A new version was deployed.
    New,

    /// An existing version was deployed again.
    Update,
}

/// Terminal state of a reconciliation.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// Package uploaded.
    Deployed {
        /// Kind of the deployment.
        release: Release,

        /// Tag returned by the API.
        tag: VersionTag,
    },

    /// User declined the update, nothing was uploaded.
    Aborted,
}

/// Deployment flags.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DeployOptions {
    /// Skip the update confirmation.
    pub force: bool,

    /// Add Freemius as a plugin contributor.
    pub add_contributor: bool,
}

/// Reconciliation errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum ReconcileError {
    /// Remote API error.
    Api(ApiError),

    /// Unable to ask the user for confirmation.
    #[display(fmt = "unable to read confirmation: {}", _0)]
    Prompt(dialoguer::Error),
}

/// Compare the local version with the remote tags.
pub(crate) fn plan(local_version: &str, tags: &[VersionTag], force: bool) -> Plan {
    let exists = tags.iter().any(|tag| tag.version == local_version);

    match (exists, force) {
        (false, _) => Plan::Create,
        (true, false) => Plan::ConfirmUpdate,
        (true, true) => Plan::Update,
    }
}

/// Upload `package` as `local_version`, asking `confirm` before updating an existing version.
///
/// The package is consumed and removed from disk once the reconciliation
/// finishes, whatever its outcome.
pub(crate) fn reconcile<R, C>(
    remote: &R,
    package: Package,
    local_version: &str,
    options: DeployOptions,
    confirm: C,
) -> Result<Outcome, ReconcileError>
where
    R: TagRemote,
    C: FnOnce(&str) -> Result<bool, ReconcileError>,
{
    let tags = remote.list_tags(LIST_PAGE_LIMIT)?;

    if tags.len() >= LIST_PAGE_LIMIT {
        tracing::debug!(
            count = tags.len(),
            "tag listing is full, older versions are not checked"
        );
    }

    let release = match plan(local_version, &tags, options.force) {
        Plan::Create => Release::New,
        Plan::Update => Release::Update,
        Plan::ConfirmUpdate => {
            if !confirm(local_version)? {
                tracing::info!(version = local_version, "update declined");
                return Ok(Outcome::Aborted);
            }

            Release::Update
        }
    };

    tracing::info!(version = local_version, ?release, "uploading package");

    let tag = remote.create_tag(package.path(), options.add_contributor)?;

    Ok(Outcome::Deployed { release, tag })
}
