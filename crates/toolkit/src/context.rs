use std::path::{Path, PathBuf};

use common::{
    api::{ApiError, FreemiusApi},
    config::{Config, ConfigError, Credentials, Manifest},
};
use derive_more::{Display, Error, From};
use once_cell::unsync::OnceCell;

/// Errors raised while preparing command dependencies.
#[derive(Debug, Display, From, Error)]
pub(crate) enum ContextError {
    /// Configuration error.
    Config(ConfigError),

    /// Unable to create the API client.
    Api(ApiError),
}

/// Per-invocation command context.
///
/// Credentials, manifest and API client are loaded lazily, at most once.
pub(crate) struct Context {
    /// Tool configuration.
    config: Config,

    /// Directory containing the plugin sources and the manifest.
    project_dir: PathBuf,

    /// Loaded developer credentials.
    credentials: OnceCell<Credentials>,

    /// Loaded project manifest.
    manifest: OnceCell<Manifest>,

    /// API client.
    api: OnceCell<FreemiusApi>,
}

impl Context {
    /// Create new context for the project located in `project_dir`.
    pub(crate) fn new(config: Config, project_dir: PathBuf) -> Self {
        Self {
            config,
            project_dir,
            credentials: OnceCell::new(),
            manifest: OnceCell::new(),
            api: OnceCell::new(),
        }
    }

    /// Project directory.
    pub(crate) fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Developer credentials.
    pub(crate) fn credentials(&self) -> Result<&Credentials, ConfigError> {
        self.credentials
            .get_or_try_init(|| Credentials::load(self.config.credentials_dir.as_deref()))
    }

    /// Project manifest.
    pub(crate) fn manifest(&self) -> Result<&Manifest, ConfigError> {
        self.manifest
            .get_or_try_init(|| Manifest::load(&self.project_dir))
    }

    /// API client.
    pub(crate) fn api(&self) -> Result<&FreemiusApi, ContextError> {
        self.api.get_or_try_init(|| -> Result<_, ContextError> {
            let credentials = self.credentials()?.clone();
            Ok(FreemiusApi::new(&self.config.api.base_url, credentials)?)
        })
    }
}
