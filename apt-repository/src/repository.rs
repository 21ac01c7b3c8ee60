//! Index assembly and the repository update pipeline.
//!
//! A run scans the archives directory, builds one stanza per `.deb`, writes
//! `Packages` and its compressed variants, and renders `Release` from the
//! configuration file when one exists. Every output is replaced atomically.
//!
//! Only one run may operate on a repository tree at a time. Two concurrent
//! runs race on the output files and the last rename wins; nothing guards
//! against this.

use crate::compression::compress_file;
use crate::control::ControlExtractor;
use crate::hash::hash_file;
use crate::packages::{augment, PackageArchive, PackageIndex};
use crate::release::{Release, RepositoryConfig};
use crate::{
    AptRepositoryError, Compression, HashAlgorithm, Result, ARCHIVE_EXTENSION,
    DEFAULT_COMPRESSIONS, DEFAULT_HASH_ALGORITHMS,
};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Where a flat repository keeps its inputs and outputs.
///
/// All relative paths are resolved against `root`. `archives_dir` is also the
/// prefix written into every `Filename` field, so it should stay relative.
#[derive(Debug, Clone)]
pub struct RepositoryLayout {
    /// Repository root directory.
    pub root: PathBuf,
    /// Directory holding the `.deb` files.
    pub archives_dir: PathBuf,
    /// Uncompressed Packages index.
    pub packages_file: PathBuf,
    /// Compressed variants of the Packages index to produce.
    pub compressions: Vec<Compression>,
    /// Release file.
    pub release_file: PathBuf,
    /// JSON document the Release file is rendered from.
    pub config_file: PathBuf,
    /// Digests added to every stanza, in field order.
    pub hash_algorithms: Vec<HashAlgorithm>,
    /// Index archives in file name order rather than directory order.
    pub sort: bool,
}

impl Default for RepositoryLayout {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            archives_dir: PathBuf::from("debs"),
            packages_file: PathBuf::from("Packages"),
            compressions: DEFAULT_COMPRESSIONS.to_vec(),
            release_file: PathBuf::from("Release"),
            config_file: PathBuf::from("repo_config.json"),
            hash_algorithms: DEFAULT_HASH_ALGORITHMS.to_vec(),
            sort: true,
        }
    }
}

impl RepositoryLayout {
    /// Default layout rooted at `root`.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Check the layout for settings that cannot produce a usable index.
    pub fn validate(&self) -> Result<()> {
        if self.packages_file.as_os_str().is_empty() {
            return Err(AptRepositoryError::invalid_config(
                "Packages file name cannot be empty",
            ));
        }
        if self.release_file.as_os_str().is_empty() {
            return Err(AptRepositoryError::invalid_config(
                "Release file name cannot be empty",
            ));
        }
        if self.hash_algorithms.is_empty() {
            return Err(AptRepositoryError::invalid_config(
                "At least one hash algorithm must be specified",
            ));
        }
        Ok(())
    }

    /// Path of the archives directory.
    pub fn archives_path(&self) -> PathBuf {
        self.root.join(&self.archives_dir)
    }

    /// Path of the uncompressed Packages index.
    pub fn packages_path(&self) -> PathBuf {
        self.root.join(&self.packages_file)
    }

    /// Path of the Packages index compressed with `compression`.
    pub fn compressed_packages_path(&self, compression: Compression) -> PathBuf {
        let mut name = OsString::from(self.packages_path());
        name.push(compression.extension());
        PathBuf::from(name)
    }

    /// Path of the Release file.
    pub fn release_path(&self) -> PathBuf {
        self.root.join(&self.release_file)
    }

    /// Path of the repository configuration.
    pub fn config_path(&self) -> PathBuf {
        self.root.join(&self.config_file)
    }
}

/// An archive left out of the index because its control data was unreadable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedArchive {
    /// Path of the archive.
    pub path: PathBuf,
    /// Why every extraction strategy failed.
    pub reason: String,
}

/// Outcome of scanning the archives directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexBuild {
    /// The archives directory did not exist and has been created empty.
    /// Nothing else should happen this run.
    DirectoryCreated(PathBuf),
    /// The index was built.
    Built {
        /// Stanzas for every archive that could be read.
        index: PackageIndex,
        /// Archives that were left out.
        skipped: Vec<SkippedArchive>,
    },
}

/// List the `.deb` files in `dir`.
///
/// Only regular files are returned. With `sort`, entries come back ordered
/// by file name; otherwise in whatever order the directory listing yields.
pub fn list_archives(dir: &Path, sort: bool) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if !name.to_string_lossy().ends_with(ARCHIVE_EXTENSION) {
            continue;
        }
        if !entry.file_type()?.is_file() && !entry.path().is_file() {
            log::debug!("Ignoring {}: not a regular file", entry.path().display());
            continue;
        }
        archives.push(entry.path());
    }

    if sort {
        archives.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    }

    Ok(archives)
}

/// Build the Packages index for the archives in `layout`.
///
/// Archives whose control data cannot be extracted are skipped with a
/// warning. Failing to read an archive for hashing aborts the build.
pub fn build_index(layout: &RepositoryLayout, extractor: &ControlExtractor) -> Result<IndexBuild> {
    let archives_path = layout.archives_path();

    if !archives_path.exists() {
        fs::create_dir_all(&archives_path).map_err(|e| {
            AptRepositoryError::DirectoryCreation(format!("{}: {}", archives_path.display(), e))
        })?;
        log::info!(
            "Created {} directory. Place your .deb files there.",
            archives_path.display()
        );
        return Ok(IndexBuild::DirectoryCreated(archives_path));
    }

    let mut index = PackageIndex::new();
    let mut skipped = Vec::new();

    for path in list_archives(&archives_path, layout.sort)? {
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::info!("Processing {}...", display_name);

        let mut archive = PackageArchive::from_path(&path)?;
        let control = match extractor.extract(&path) {
            Ok(control) => control,
            Err(e) => {
                log::warn!("Skipping {}: {}", display_name, e);
                let reason = match e {
                    AptRepositoryError::Extraction { reason, .. } => reason,
                    e => e.to_string(),
                };
                skipped.push(SkippedArchive { path, reason });
                continue;
            }
        };

        let (hashed_size, hashes) = hash_file(&archive.path, &layout.hash_algorithms)?;
        if hashed_size != archive.size {
            log::warn!(
                "{} changed size while being indexed ({} -> {} bytes)",
                display_name,
                archive.size,
                hashed_size
            );
            // Size must describe the bytes the digests were computed over.
            archive.size = hashed_size;
        }

        let stanza = augment(
            &control,
            &archive,
            &layout.archives_dir,
            &hashes,
            &layout.hash_algorithms,
        );
        log::debug!(
            "Indexed {} {}",
            stanza.field("Package").unwrap_or("<unknown>"),
            stanza.field("Version").unwrap_or("<unknown>")
        );
        index.push(stanza);
    }

    Ok(IndexBuild::Built { index, skipped })
}

/// Create the temporary file in `dir` that an output is staged in before it
/// is renamed into place.
///
/// Outputs get mode 0644 less the umask instead of the 0600 temporary files
/// default to.
pub(crate) fn output_tempfile(dir: &Path) -> std::io::Result<tempfile::NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o644));
    }
    builder.tempfile_in(dir)
}

/// Write `data` to `path` via a temporary file in the same directory, so
/// readers never observe a partially written file.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = output_tempfile(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Serialize `index` to `path`.
pub fn write_index(index: &PackageIndex, path: &Path) -> Result<()> {
    write_atomic(path, index.to_string().as_bytes())
}

/// What a call to [`update_repository`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// The archives directory had to be created; no outputs were written.
    pub bootstrapped: bool,
    /// Archives included in the index, in index order.
    pub indexed: Vec<PathBuf>,
    /// Archives left out of the index.
    pub skipped: Vec<SkippedArchive>,
    /// Output files written, in the order they were written.
    pub written: Vec<PathBuf>,
    /// The Release document, if a configuration file was present.
    pub release: Option<Release>,
}

/// Regenerate `Packages`, its compressed variants and `Release`.
///
/// The configuration is loaded before anything is written, so a malformed
/// configuration leaves every existing output untouched.
pub fn update_repository(
    layout: &RepositoryLayout,
    extractor: &ControlExtractor,
) -> Result<UpdateSummary> {
    layout.validate()?;

    let mut summary = UpdateSummary::default();

    // Checked first: a missing archives directory means nothing else runs.
    if !layout.archives_path().exists() {
        build_index(layout, extractor)?;
        summary.bootstrapped = true;
        return Ok(summary);
    }

    let config_path = layout.config_path();
    let config = RepositoryConfig::load(&config_path)?;
    if config.is_none() {
        log::info!(
            "No configuration at {}, leaving Release untouched",
            config_path.display()
        );
    }

    let (index, skipped) = match build_index(layout, extractor)? {
        IndexBuild::Built { index, skipped } => (index, skipped),
        IndexBuild::DirectoryCreated(_) => {
            summary.bootstrapped = true;
            return Ok(summary);
        }
    };
    summary.skipped = skipped;
    summary.indexed = index
        .stanzas()
        .iter()
        .filter_map(|s| s.field("Filename"))
        .map(PathBuf::from)
        .collect();

    let packages_path = layout.packages_path();
    write_index(&index, &packages_path)?;
    summary.written.push(packages_path.clone());

    for &compression in &layout.compressions {
        if compression == Compression::None {
            continue;
        }
        let compressed_path = layout.compressed_packages_path(compression);
        compress_file(&packages_path, &compressed_path, compression)?;
        summary.written.push(compressed_path);
    }

    if let Some(config) = config {
        let release_path = layout.release_path();
        let release = crate::release::write_release(&config, &release_path)?;
        summary.written.push(release_path);
        summary.release = Some(release);
    }

    Ok(summary)
}
