//! Packages index stanzas for APT repositories.

use crate::hash::{HashAlgorithm, HashSet};
use crate::Result;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A `.deb` file in the archives directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageArchive {
    /// Path used to read the archive.
    pub path: PathBuf,
    /// Bare file name, e.g. `foo_1.0_all.deb`.
    pub file_name: String,
    /// Size of the archive in bytes.
    pub size: u64,
}

impl PackageArchive {
    /// Stat `path` and record its size.
    pub fn from_path<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let size = std::fs::metadata(&path)?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path,
            file_name,
            size,
        })
    }

    /// Value of the `Filename` field: the archive's path relative to the
    /// repository root, always with `/` separators.
    pub fn repository_path(&self, archives_dir: &Path) -> String {
        let mut value = String::new();
        for component in archives_dir.components() {
            match component {
                Component::RootDir if value.ends_with('/') => {}
                Component::RootDir => value.push('/'),
                c => {
                    value.push_str(&c.as_os_str().to_string_lossy());
                    value.push('/');
                }
            }
        }
        value.push_str(&self.file_name);
        value
    }
}

/// The index entry for one package: extracted control text followed by the
/// fields the repository adds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlStanza {
    control: String,
    fields: Vec<(String, String)>,
}

impl ControlStanza {
    /// Build a stanza from raw control text, trimming it and dropping any
    /// blank lines so the stanza stays a single paragraph.
    pub fn new(raw_control: &str) -> Self {
        let trimmed = raw_control.trim();
        let control = if trimmed.lines().any(|l| l.trim().is_empty()) {
            log::warn!("Dropping blank lines inside control paragraph");
            trimmed
                .lines()
                .filter(|l| !l.trim().is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            trimmed.to_string()
        };
        Self {
            control,
            fields: Vec::new(),
        }
    }

    /// Append a field after the control text.
    pub fn push_field<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.fields.push((key.into(), value.into()));
    }

    /// The control text as extracted (trimmed).
    pub fn control(&self) -> &str {
        &self.control
    }

    /// Fields appended by the repository, in order.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Look up the first value of `name`, case-insensitively, in either the
    /// control text or the appended fields.
    ///
    /// Only single-line values are returned whole; continuation lines are
    /// ignored.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.control
            .lines()
            .filter(|l| !l.starts_with(' ') && !l.starts_with('\t'))
            .filter_map(|l| l.split_once(':'))
            .chain(self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
    }
}

impl fmt::Display for ControlStanza {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.control)?;
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 || !self.control.is_empty() {
                f.write_str("\n")?;
            }
            write!(f, "{}: {}", key, value)?;
        }
        Ok(())
    }
}

/// Append `Filename`, `Size` and one digest field per algorithm, in that
/// order, to the control text of `archive`.
///
/// The control text is not validated; whatever the extractor returned is
/// carried through after trimming.
pub fn augment(
    raw_control: &str,
    archive: &PackageArchive,
    archives_dir: &Path,
    hashes: &HashSet,
    algorithms: &[HashAlgorithm],
) -> ControlStanza {
    let mut stanza = ControlStanza::new(raw_control);
    stanza.push_field("Filename", archive.repository_path(archives_dir));
    stanza.push_field("Size", archive.size.to_string());
    for algorithm in algorithms {
        if let Some(hash) = hashes.get(algorithm) {
            stanza.push_field(algorithm.field_name(), hash);
        }
    }
    stanza
}

/// The aggregate Packages index built during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageIndex {
    stanzas: Vec<ControlStanza>,
}

impl PackageIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stanza to the end of the index.
    pub fn push(&mut self, stanza: ControlStanza) {
        self.stanzas.push(stanza);
    }

    /// Get all stanzas.
    pub fn stanzas(&self) -> &[ControlStanza] {
        &self.stanzas
    }

    /// Get the number of stanzas.
    pub fn len(&self) -> usize {
        self.stanzas.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.stanzas.is_empty()
    }
}

impl fmt::Display for PackageIndex {
    /// Stanzas separated by one blank line, with a single trailing newline.
    /// An empty index renders as an empty string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stanza) in self.stanzas.iter().enumerate() {
            if i > 0 {
                f.write_str("\n\n")?;
            }
            write!(f, "{}", stanza)?;
        }
        if !self.stanzas.is_empty() {
            f.write_str("\n")?;
        }
        Ok(())
    }
}
