//! Error types for the local files provider

use bridge_traits::error::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

/// Local files provider errors
#[derive(Error, Debug)]
pub enum LocalFilesError {
    /// Music folder is missing or not a directory
    #[error("Music folder not available: {}", path.display())]
    FolderUnavailable { path: PathBuf },

    /// Playlist id does not name a playlist file
    #[error("Invalid playlist id: {0}")]
    InvalidPlaylist(String),

    /// Playlist file does not exist
    #[error("Playlist not found: {0}")]
    PlaylistNotFound(String),

    /// Blocking scan task failed
    #[error("Scan task failed: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for local files operations
pub type Result<T> = std::result::Result<T, LocalFilesError>;

impl From<LocalFilesError> for BridgeError {
    fn from(error: LocalFilesError) -> Self {
        match error {
            LocalFilesError::FolderUnavailable { .. } => BridgeError::NotAvailable(error.to_string()),
            LocalFilesError::Io(e) => BridgeError::Io(e),
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
