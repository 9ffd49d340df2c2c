//! WordPress plugin header parsing.
//!
//! The main plugin file is a `*.php` file in the project root whose leading
//! comment block declares a `Plugin Name:` header. Only the first 8 KiB of a
//! file are inspected, each header is a single line.

use std::{
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
};

use derive_more::{Display, Error, From};
use once_cell::sync::Lazy;
use regex::Regex;

/// Amount of bytes read from the beginning of a file while looking for headers.
const HEADER_READ_LIMIT: u64 = 8 * 1024;

/// `Plugin Name:` header line.
static PLUGIN_NAME_REGEX: Lazy<Regex> = Lazy::new(|| header_regex("Plugin Name"));

/// `Version:` header line.
static VERSION_REGEX: Lazy<Regex> = Lazy::new(|| header_regex("Version"));

/// Trailing comment terminators and PHP closing tags.
static COMMENT_CLOSE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:\*/|\?>).*").expect("invalid regex string"));

fn header_regex(name: &str) -> Regex {
    Regex::new(&format!(r"(?mi)^[ \t/*#@]*{}:(.*)$", regex::escape(name)))
        .expect("invalid regex string")
}

/// Plugin header errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum PluginError {
    /// IO-related error.
    Io(io::Error),

    /// No file in the project directory declares a plugin header.
    #[display(fmt = "unable to find the main plugin file in {}", "_0.display()")]
    #[from(ignore)]
    MainFileNotFound(#[error(not(source))] PathBuf),

    /// Main plugin file has no `Version:` header.
    #[display(fmt = "{} does not declare the plugin version", "_0.display()")]
    #[from(ignore)]
    MissingVersion(#[error(not(source))] PathBuf),
}

/// Read the version declared by the main plugin file inside `project_dir`.
pub(crate) fn local_version(project_dir: &Path) -> Result<String, PluginError> {
    let main_file = find_main_file(project_dir)?
        .ok_or_else(|| PluginError::MainFileNotFound(project_dir.to_path_buf()))?;

    let header = read_header(&main_file)?;

    tracing::debug!(file = %main_file.display(), "reading plugin version");

    header_field(&header, &VERSION_REGEX).ok_or(PluginError::MissingVersion(main_file))
}

/// Find the first `*.php` file, by name, that declares a plugin header.
fn find_main_file(project_dir: &Path) -> Result<Option<PathBuf>, io::Error> {
    let mut candidates = Vec::new();

    for entry in fs::read_dir(project_dir)? {
        let path = entry?.path();

        if path.is_file() && path.extension().is_some_and(|ext| ext == "php") {
            candidates.push(path);
        }
    }

    candidates.sort();

    for candidate in candidates {
        if header_field(&read_header(&candidate)?, &PLUGIN_NAME_REGEX).is_some() {
            return Ok(Some(candidate));
        }
    }

    Ok(None)
}

/// Read the leading part of a file, normalizing CR-only line endings.
fn read_header(path: &Path) -> Result<String, io::Error> {
    let mut buf = Vec::new();
    File::open(path)?
        .take(HEADER_READ_LIMIT)
        .read_to_end(&mut buf)?;

    Ok(String::from_utf8_lossy(&buf).replace('\r', "\n"))
}

/// Extract a header value, stripped of comment terminators.
///
/// Empty values are treated as absent.
fn header_field(header: &str, regex: &Regex) -> Option<String> {
    let value = regex.captures(header)?.get(1)?.as_str();
    let value = COMMENT_CLOSE_REGEX.replace(value, "");
    let value = value.trim();

    (!value.is_empty()).then(|| value.to_owned())
}
