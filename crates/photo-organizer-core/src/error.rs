use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Custom error types for the photo-organizer library
#[derive(Error, Debug)]
pub enum Error {
    /// Source directory is missing or not a directory
    #[error("Source directory not found: {0}")]
    SourceNotFound(PathBuf),

    /// Archive root could not be created or accessed
    #[error("Cannot initialize archive at {path}: {source}")]
    ArchiveInit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Archive path exists but is something other than a directory
    #[error("Archive path is not a directory: {0}")]
    ArchiveNotDirectory(PathBuf),

    /// Persisted index snapshot exists but cannot be parsed
    #[error("Corrupt archive index at {path}: {reason}")]
    IndexCorrupt { path: PathBuf, reason: String },

    /// A file could not be read for fingerprinting
    #[error("Failed to hash {path}: {source}")]
    Hash {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file could not be copied into the archive
    #[error("Failed to copy {source_path} to {destination}: {source}")]
    Copy {
        source_path: PathBuf,
        destination: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O operation error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory traversal error
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl Error {
    /// Whether the error concerns a single file and the run may continue
    pub fn is_per_file(&self) -> bool {
        matches!(self, Self::Hash { .. } | Self::Copy { .. } | Self::Walk(_))
    }
}
