//! Errors from locating and creating the data directory.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    /// Neither `READCAST_DATA_DIR` nor a platform data directory is available.
    #[error("No data directory: set READCAST_DATA_DIR")]
    NoDataDir,

    /// `READCAST_DATA_DIR` or `--data-dir` was set to an empty string.
    #[error("The data directory path is empty")]
    EmptyDataDir,

    #[error("{} is a file, expected a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("Cannot create {}: {reason}", path.display())]
    CreateFailed { path: PathBuf, reason: String },
}
