//! Storage error types.

use std::path::PathBuf;
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Path escapes the storage root: {0}")]
    OutsideRoot(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
