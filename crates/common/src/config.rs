use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};

use derive_more::{Display, Error, From};
use figment::{
    providers::{Env, Format, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};

#[cfg(feature = "logging")]
use tracing_subscriber::filter::LevelFilter;

/// Default tool configuration file, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "FreemiusToolkit.toml";

/// Name of the dotenv-style credentials file.
pub const CREDENTIALS_FILE: &str = ".freemius";

/// Name of the project manifest file.
pub const MANIFEST_FILE: &str = ".freemius.yml";

/// Prefix shared by all credential keys, both in the credentials file
/// and in the process environment.
pub const CREDENTIALS_PREFIX: &str = "FS__API_";

/// Directory inside the user's home that holds the fallback credentials file.
const USER_CONFIG_DIR: &str = ".wp-cli";

/// Configuration loading errors.
#[derive(Debug, Display, From, Error)]
pub enum ConfigError {
    /// Unable to load the configuration using [`figment`].
    Figment(figment::Error),

    /// Unable to parse the dotenv-style credentials file.
    #[display(fmt = "unable to parse credentials file: {}", _0)]
    Dotenv(dotenvy::Error),

    /// IO-related error.
    Io(io::Error),

    /// User's home directory cannot be determined.
    #[display(fmt = "unable to find home directory")]
    #[from(ignore)]
    HomeDirNotFound,

    /// None of the searched directories contains a credentials file.
    #[display(fmt = "unable to find the {} credentials file", CREDENTIALS_FILE)]
    #[from(ignore)]
    CredentialsNotFound,

    /// A required credential is absent or empty.
    #[display(fmt = "the credentials file does not contain the \"{}{}\" key", CREDENTIALS_PREFIX, _0)]
    #[from(ignore)]
    MissingCredential(#[error(not(source))] &'static str),

    /// Project manifest file does not exist.
    #[display(fmt = "unable to find the {} file in {}", MANIFEST_FILE, "_0.display()")]
    #[from(ignore)]
    ManifestNotFound(#[error(not(source))] PathBuf),

    /// A required manifest key is absent or empty.
    #[display(fmt = "the {} file does not contain the \"{}\" key", MANIFEST_FILE, _0)]
    #[from(ignore)]
    MissingManifestKey(#[error(not(source))] &'static str),
}

/// Logging configuration.
#[cfg(feature = "logging")]
#[derive(Deserialize)]
pub struct Logging {
    /// Log level.
    #[serde(deserialize_with = "deserialize_from_str")]
    pub level: LevelFilter,
}

#[cfg(feature = "logging")]
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::WARN,
        }
    }
}

/// Implementation of [`serde`]'s deserializer for [`FromStr`] types.
///
/// [`FromStr`]: std::str::FromStr
#[cfg(feature = "logging")]
fn deserialize_from_str<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error,
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    std::str::FromStr::from_str(&s).map_err(serde::de::Error::custom)
}

/// Remote API configuration.
#[derive(Deserialize)]
pub struct Api {
    /// Base URL of the Freemius API, without the version segment.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Production Freemius API endpoint.
pub fn default_base_url() -> String {
    String::from("https://api.freemius.com")
}

/// General tool configuration.
#[derive(Deserialize, Default)]
pub struct Config {
    /// Logging configuration.
    #[cfg(feature = "logging")]
    #[serde(default)]
    pub logging: Logging,

    /// Remote API configuration.
    #[serde(default)]
    pub api: Api,

    /// Directory searched first for the credentials file.
    #[serde(default)]
    pub credentials_dir: Option<PathBuf>,
}

impl Config {
    /// Create new config using default configuration file or environment variables.
    ///
    /// See [`Env`] for more details on how to use environment variables configuration.
    pub fn new(path: Option<PathBuf>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(
                path.unwrap_or(PathBuf::from(DEFAULT_CONFIG_FILE)),
            ))
            .merge(Env::prefixed("FS_TOOLKIT_").split("__"))
            .extract()
    }
}

/// Developer credentials used to sign API requests.
#[derive(Deserialize, Clone)]
pub struct Credentials {
    /// Developer identifier.
    #[serde(default)]
    pub dev_id: String,

    /// Developer public key.
    #[serde(default)]
    pub public_key: String,

    /// Developer secret key.
    #[serde(default)]
    pub secret_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("dev_id", &self.dev_id)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Locate the credentials file and load it.
    ///
    /// `configured_dir` is searched first, then `~/.wp-cli`.
    pub fn load(configured_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let path = Self::locate(configured_dir)?;
        tracing::debug!(path = %path.display(), "loading credentials");
        Self::from_file(&path)
    }

    /// Find the first existing credentials file among the searched directories.
    pub fn locate(configured_dir: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let mut candidates = Vec::with_capacity(2);

        if let Some(dir) = configured_dir {
            candidates.push(dir.join(CREDENTIALS_FILE));
        }

        let mut user_dir = home::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
        user_dir.push(USER_CONFIG_DIR);
        user_dir.push(CREDENTIALS_FILE);
        candidates.push(user_dir);

        candidates
            .into_iter()
            .find(|candidate| candidate.is_file())
            .ok_or(ConfigError::CredentialsNotFound)
    }

    /// Load credentials from the provided dotenv-style file.
    ///
    /// Variables already present in the process environment take precedence
    /// over the file contents.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut values = BTreeMap::new();

        for item in dotenvy::from_path_iter(path)? {
            let (key, value) = item?;

            if let Some(field) = key.strip_prefix(CREDENTIALS_PREFIX) {
                values.insert(field.to_ascii_lowercase(), value);
            }
        }

        let credentials: Credentials = Figment::new()
            .merge(Serialized::defaults(values))
            .merge(Env::prefixed(CREDENTIALS_PREFIX))
            .extract()?;

        credentials.validate()
    }

    /// Ensure that every key is present and non-empty.
    fn validate(self) -> Result<Self, ConfigError> {
        for (key, value) in [
            ("DEV_ID", &self.dev_id),
            ("PUBLIC_KEY", &self.public_key),
            ("SECRET_KEY", &self.secret_key),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingCredential(key));
            }
        }

        Ok(self)
    }
}

/// Project manifest stored in `.freemius.yml`.
#[derive(Debug, Deserialize, Serialize)]
pub struct Manifest {
    /// Freemius plugin identifier.
    #[serde(default, deserialize_with = "deserialize_plugin_id")]
    pub plugin_id: String,

    /// Ordered list of files and directories packaged into the plugin archive.
    #[serde(default)]
    pub include: Vec<String>,
}

/// Plugin identifiers are usually written as YAML integers, but strings are accepted too.
fn deserialize_plugin_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PluginId {
        Number(u64),
        Text(String),
    }

    Ok(match Option::<PluginId>::deserialize(deserializer)? {
        Some(PluginId::Number(id)) => id.to_string(),
        Some(PluginId::Text(id)) => id.trim().to_owned(),
        None => String::new(),
    })
}

impl Manifest {
    /// Load the manifest from the `.freemius.yml` file inside `project_dir`.
    ///
    /// `FREEMIUS_PLUGIN_ID` environment variable overrides the plugin identifier.
    pub fn load(project_dir: &Path) -> Result<Self, ConfigError> {
        let path = project_dir.join(MANIFEST_FILE);

        if !path.is_file() {
            return Err(ConfigError::ManifestNotFound(path));
        }

        let manifest: Manifest = Figment::new()
            .merge(Yaml::file(&path))
            .merge(Env::prefixed("FREEMIUS_").only(&["plugin_id"]))
            .extract()?;

        if manifest.plugin_id.is_empty() {
            return Err(ConfigError::MissingManifestKey("plugin_id"));
        }

        if manifest.include.is_empty() {
            return Err(ConfigError::MissingManifestKey("include"));
        }

        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use figment::Jail;

    use super::{ConfigError, Credentials, Manifest, CREDENTIALS_FILE, MANIFEST_FILE};

    #[test]
    fn manifest_with_numeric_plugin_id() {
        Jail::expect_with(|jail| {
            jail.create_file(MANIFEST_FILE, "plugin_id: 42\ninclude:\n  - src/\n  - plugin.php\n")?;

            let manifest = Manifest::load(jail.directory()).expect("unable to load manifest");

            assert_eq!(manifest.plugin_id, "42");
            assert_eq!(manifest.include, vec!["src/", "plugin.php"]);

            Ok(())
        });
    }

    #[test]
    fn manifest_plugin_id_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(MANIFEST_FILE, "plugin_id: '42'\ninclude: [src]\n")?;
            jail.set_env("FREEMIUS_PLUGIN_ID", "7");

            let manifest = Manifest::load(jail.directory()).expect("unable to load manifest");

            assert_eq!(manifest.plugin_id, "7");

            Ok(())
        });
    }

    #[test]
    fn manifest_requires_include() {
        Jail::expect_with(|jail| {
            jail.create_file(MANIFEST_FILE, "plugin_id: 42\n")?;

            assert!(matches!(
                Manifest::load(jail.directory()),
                Err(ConfigError::MissingManifestKey("include"))
            ));

            Ok(())
        });
    }

    #[test]
    fn manifest_requires_plugin_id() {
        Jail::expect_with(|jail| {
            jail.create_file(MANIFEST_FILE, "include: [src]\n")?;

            assert!(matches!(
                Manifest::load(jail.directory()),
                Err(ConfigError::MissingManifestKey("plugin_id"))
            ));

            Ok(())
        });
    }

    #[test]
    fn missing_manifest() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            Manifest::load(dir.path()),
            Err(ConfigError::ManifestNotFound(_))
        ));
    }

    #[test]
    fn credentials_from_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CREDENTIALS_FILE,
                "FS__API_DEV_ID=1234\nFS__API_PUBLIC_KEY=pk_abc\nFS__API_SECRET_KEY=sk_def\nOTHER=ignored\n",
            )?;

            let path = jail.directory().join(CREDENTIALS_FILE);
            let credentials = Credentials::from_file(&path).expect("unable to load credentials");

            assert_eq!(credentials.dev_id, "1234");
            assert_eq!(credentials.public_key, "pk_abc");
            assert_eq!(credentials.secret_key, "sk_def");

            Ok(())
        });
    }

    #[test]
    fn environment_overrides_credentials_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CREDENTIALS_FILE,
                "FS__API_DEV_ID=1234\nFS__API_PUBLIC_KEY=pk_abc\nFS__API_SECRET_KEY=sk_def\n",
            )?;
            jail.set_env("FS__API_SECRET_KEY", "sk_env");

            let path = jail.directory().join(CREDENTIALS_FILE);
            let credentials = Credentials::from_file(&path).expect("unable to load credentials");

            assert_eq!(credentials.secret_key, "sk_env");

            Ok(())
        });
    }

    #[test]
    fn credentials_require_every_key() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CREDENTIALS_FILE,
                "FS__API_DEV_ID=1234\nFS__API_PUBLIC_KEY=pk_abc\n",
            )?;

            let path = jail.directory().join(CREDENTIALS_FILE);

            assert!(matches!(
                Credentials::from_file(&path),
                Err(ConfigError::MissingCredential("SECRET_KEY"))
            ));

            Ok(())
        });
    }

    #[test]
    fn configured_directory_is_searched_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CREDENTIALS_FILE);
        fs::write(&path, "FS__API_DEV_ID=1\n").unwrap();

        assert_eq!(Credentials::locate(Some(dir.path())).unwrap(), path);
    }
}
