use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors detected before any work starts.
///
/// Per-file and per-directory failures never surface here; they are recorded
/// as data in the run report.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("source folder is not set")]
    MissingSource,

    #[error("destination folder is not set")]
    MissingDestination,

    #[error("source folder does not exist: {0}")]
    SourceNotFound(PathBuf),

    #[error("destination folder does not exist: {0}")]
    DestinationNotFound(PathBuf),

    #[error("source is not a directory: {0}")]
    SourceNotDirectory(PathBuf),

    #[error("destination is not a directory: {0}")]
    DestinationNotDirectory(PathBuf),

    #[error("unknown operating mode '{0}' (expected backup, report-structure or images)")]
    UnknownMode(String),

    #[error("failed to list site folders under {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
