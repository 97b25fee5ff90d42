use bridge_traits::error::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Provider error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Provider not registered: {0}")]
    ProviderNotFound(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Sync queue closed")]
    QueueClosed,

    #[error("Sync queue full, dropped request: {0}")]
    QueueFull(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
