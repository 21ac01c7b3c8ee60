//! Command-line front end for generating flat APT repository metadata.

use apt_repository::AptRepositoryError;

pub mod logging;

/// Exit status for a run that finished, possibly with skipped archives.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit status for failures not covered by a more specific code.
pub const EXIT_FAILURE: u8 = 1;
/// Exit status when the repository configuration is unusable.
pub const EXIT_CONFIG: u8 = 2;
/// Exit status when reading inputs or writing outputs failed.
pub const EXIT_IO: u8 = 3;
/// Exit status for internal errors.
pub const EXIT_INTERNAL: u8 = 4;

/// Map a fatal error to the process exit status.
pub fn exit_code(error: &AptRepositoryError) -> u8 {
    match error {
        AptRepositoryError::InvalidConfiguration(_) => EXIT_CONFIG,
        AptRepositoryError::Io(_)
        | AptRepositoryError::Compression(_)
        | AptRepositoryError::DirectoryCreation(_) => EXIT_IO,
        AptRepositoryError::UnsupportedAlgorithm(_) => EXIT_INTERNAL,
        AptRepositoryError::Extraction { .. } => EXIT_FAILURE,
    }
}
