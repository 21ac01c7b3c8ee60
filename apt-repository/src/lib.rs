//! # APT Repository Library
//!
//! Builds the metadata of a flat APT repository, the layout used by
//! Cydia/Sileo-style clients: a directory of `.deb` files, a `Packages`
//! index listing every package with its size and checksums, compressed
//! copies of that index, and a `Release` file rendered from a JSON
//! configuration document.
//!
//! ## Example
//!
//! ```no_run
//! use apt_repository::{update_repository, ControlExtractor, RepositoryLayout};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = RepositoryLayout::new("/srv/repo");
//! let summary = update_repository(&layout, &ControlExtractor::default())?;
//! println!("indexed {} packages", summary.indexed.len());
//! # Ok(())
//! # }
//! ```

pub mod compression;
pub mod control;
pub mod error;
pub mod hash;
pub mod packages;
pub mod release;
pub mod repository;

pub use compression::{compress_file, Compression};
pub use control::{ControlExtractor, ControlMember, ControlProvider, DpkgDeb};
pub use error::{AptRepositoryError, ExtractionError, Result};
pub use hash::{digest_file, HashAlgorithm, HashSet};
pub use packages::{augment, ControlStanza, PackageArchive, PackageIndex};
pub use release::{write_release, Release, RepositoryConfig};
pub use repository::{
    build_index, list_archives, update_repository, write_index, IndexBuild, RepositoryLayout,
    SkippedArchive, UpdateSummary,
};

/// File name suffix of package archives.
pub const ARCHIVE_EXTENSION: &str = ".deb";

/// Compressed index formats produced by default.
pub const DEFAULT_COMPRESSIONS: &[Compression] = &[Compression::Bzip2];

/// Digests added to every Packages stanza by default.
pub const DEFAULT_HASH_ALGORITHMS: &[HashAlgorithm] = &[
    HashAlgorithm::Md5,
    HashAlgorithm::Sha1,
    HashAlgorithm::Sha256,
];
