//! Error types for the APT repository library.

use std::path::PathBuf;

/// Result type for APT repository operations.
pub type Result<T> = std::result::Result<T, AptRepositoryError>;

/// Errors that can occur when building repository metadata.
#[derive(Debug, thiserror::Error)]
pub enum AptRepositoryError {
    /// I/O error occurred during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A digest algorithm name was not recognised.
    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Every control extraction strategy failed for an archive.
    #[error("Failed to extract control data from {}: {reason}", archive.display())]
    Extraction { archive: PathBuf, reason: String },

    /// Compression error.
    #[error("Compression error: {0}")]
    Compression(String),

    /// Invalid repository configuration.
    #[error("Invalid repository configuration: {0}")]
    InvalidConfiguration(String),

    /// Directory creation failed.
    #[error("Failed to create directory: {0}")]
    DirectoryCreation(String),
}

impl AptRepositoryError {
    /// Create a new invalid configuration error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a new extraction error for an archive.
    pub fn extraction<P: Into<PathBuf>, S: Into<String>>(archive: P, reason: S) -> Self {
        Self::Extraction {
            archive: archive.into(),
            reason: reason.into(),
        }
    }
}

/// Failure of a single control extraction strategy.
///
/// These are recovered by trying the next strategy in the chain; only when
/// all of them fail does the caller see an [`AptRepositoryError::Extraction`].
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The helper program could not be started.
    #[error("failed to run {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The helper program exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    Status {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    /// The strategy succeeded but produced no control text.
    #[error("no control data produced")]
    EmptyOutput,

    /// The archive lacks the expected member.
    #[error("missing member {0}")]
    MissingMember(String),

    /// The control member uses a compression we cannot read.
    #[error("unsupported control member {0}")]
    UnsupportedMember(String),

    /// Control text was not valid UTF-8.
    #[error("control data is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),

    /// Reading the archive failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
