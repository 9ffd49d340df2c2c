use std::{
    collections::HashSet,
    fs::{self, File},
    io::{self, Seek, Write},
    path::{Component, Path, PathBuf, StripPrefixError},
};

use derive_more::{Display, Error, From};
use walkdir::{DirEntry, WalkDir};
use zip::{write::FileOptions, ZipWriter};

/// Name of the package archive created inside the project directory.
pub(crate) const PACKAGE_FILE_NAME: &str = "new-version.zip";

/// Errors that may occur during the archive creation process.
#[derive(Debug, Display, From, Error)]
pub(crate) enum ArchiveError {
    /// [`zip`]-crate specific error.
    Zip(zip::result::ZipError),

    /// [`walkdir`]-crate specific error.
    WalkDir(walkdir::Error),

    /// IO error.
    Io(io::Error),

    /// Unable to strip include root prefix from path.
    StripPrefix(StripPrefixError),
}

/// Plugin package file.
///
/// The file is removed from disk when the value is dropped, so every exit path
/// of a deployment (success, remote failure, early error or abort) cleans it up.
/// Use [`Package::keep`] to retain the archive.
#[derive(Debug)]
pub(crate) struct Package {
    /// Archive location.
    path: PathBuf,

    /// Whether the file should survive the drop.
    keep: bool,
}

impl Package {
    /// Build a new package at `path` from the include list resolved against `root`.
    ///
    /// On failure, any partially written file is removed.
    pub(crate) fn build(
        root: &Path,
        include: &[String],
        path: PathBuf,
    ) -> Result<Self, ArchiveError> {
        let package = Self { path, keep: false };
        build_package(root, include, &package.path)?;
        Ok(package)
    }

    /// Archive location.
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Retain the archive on disk, returning its location.
    pub(crate) fn keep(mut self) -> PathBuf {
        self.keep = true;
        self.path.clone()
    }
}

impl Drop for Package {
    fn drop(&mut self) {
        if self.keep {
            return;
        }

        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "package removed"),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "unable to remove package")
            }
        }
    }
}

/// Archive the include list into a fresh zip file at `output`.
///
/// Any file already present at `output` is deleted first. Include entries are
/// resolved against `root` after trimming leading and trailing path separators:
///
/// * directories are walked recursively, every entry named relative to the
///   parent of the include root, so the directory name itself stays as a prefix;
/// * regular files are stored under their base name only;
/// * missing entries are skipped with a warning.
pub(crate) fn build_package(
    root: &Path,
    include: &[String],
    output: &Path,
) -> Result<(), ArchiveError> {
    match fs::remove_file(output) {
        Ok(()) => tracing::debug!(path = %output.display(), "removed stale package"),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => return Err(error.into()),
    }

    build_zip_archive(File::create(output)?, root, include, output)?;

    Ok(())
}

/// Write the include list into `file`.
///
/// `exclude` is never added to the archive, even when an include entry contains it.
pub(crate) fn build_zip_archive<W: Write + Seek>(
    file: W,
    root: &Path,
    include: &[String],
    exclude: &Path,
) -> Result<W, ArchiveError> {
    let mut archive = ArchiveWriter {
        writer: ZipWriter::new(file),
        names: HashSet::new(),
        exclude: exclude.to_path_buf(),
    };

    for source in include {
        let source = source.trim_matches(|c| c == '/' || c == '\\');

        if source.is_empty() {
            tracing::warn!("skipping empty include entry");
            continue;
        }

        let path = root.join(source);

        if path.is_dir() {
            let prefix = path.parent().unwrap_or(root);

            for entry in walk_include_directory(&path) {
                match entry {
                    Ok(entry) => archive.add_entry(&entry, prefix)?,
                    Err(error) if is_unresolvable_link(&error) => {
                        tracing::warn!(%error, "skipping unresolvable symbolic link")
                    }
                    Err(error) => return Err(error.into()),
                }
            }
        } else if path.is_file() {
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_owned);

            match name {
                Some(name) => archive.add_file(&path, name)?,
                None => tracing::warn!(
                    path = %path.display(),
                    "file contains non-unicode symbols in path"
                ),
            }
        } else {
            tracing::warn!(path = %path.display(), "include entry does not exist, skipping");
        }
    }

    Ok(archive.writer.finish()?)
}

/// Zip writer that keeps track of already added entry names.
struct ArchiveWriter<W: Write + Seek> {
    /// Underlying zip writer.
    writer: ZipWriter<W>,

    /// Names of already added entries.
    names: HashSet<String>,

    /// Package file itself, in case it lives inside an included directory.
    exclude: PathBuf,
}

impl<W: Write + Seek> ArchiveWriter<W> {
    /// Add a walked directory entry, named relative to `prefix`.
    fn add_entry(&mut self, entry: &DirEntry, prefix: &Path) -> Result<(), ArchiveError> {
        let relative = entry.path().strip_prefix(prefix)?;

        let Some(name) = archive_name(relative) else {
            tracing::warn!(
                path = %entry.path().display(),
                "file contains non-unicode symbols in path"
            );
            return Ok(());
        };

        if entry.file_type().is_dir() {
            self.add_directory(format!("{name}/"))
        } else if entry.file_type().is_file() {
            self.add_file(entry.path(), name)
        } else {
            tracing::warn!(path = %entry.path().display(), "not a regular file, skipping");
            Ok(())
        }
    }

    /// Add an empty directory entry. `name` must end with a slash.
    fn add_directory(&mut self, name: String) -> Result<(), ArchiveError> {
        if self.names.insert(name.clone()) {
            self.writer.add_directory(name, FileOptions::default())?;
        }

        Ok(())
    }

    /// Copy a file from disk into the archive under `name`.
    fn add_file(&mut self, path: &Path, name: String) -> Result<(), ArchiveError> {
        if self.exclude == path {
            tracing::debug!(path = %path.display(), "skipping the package file");
            return Ok(());
        }

        if !self.names.insert(name.clone()) {
            tracing::warn!(%name, "duplicate archive entry, skipping");
            return Ok(());
        }

        let mut file = File::open(path)?;
        self.writer.start_file(name, FileOptions::default())?;
        io::copy(&mut file, &mut self.writer)?;

        Ok(())
    }
}

/// Convert a relative path into a forward-slash separated archive name.
///
/// Returns [`None`] for paths with non-unicode components. `.` and `..`
/// components are dropped.
fn archive_name(path: &Path) -> Option<String> {
    let mut segments = Vec::new();

    for component in path.components() {
        if let Component::Normal(segment) = component {
            segments.push(segment.to_str()?);
        }
    }

    Some(segments.join("/"))
}

/// Recursively iterate over the include directory, the directory itself first.
///
/// [`WalkDir`] never yields `.` or `..` pseudo-entries. Symbolic links are
/// followed and archived under their own name, with the target contents.
fn walk_include_directory(dir: &Path) -> impl Iterator<Item = Result<DirEntry, walkdir::Error>> {
    WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
}

/// Dangling symbolic links and link loops.
fn is_unresolvable_link(error: &walkdir::Error) -> bool {
    error.loop_ancestor().is_some()
        || error
            .io_error()
            .is_some_and(|error| error.kind() == io::ErrorKind::NotFound)
}
