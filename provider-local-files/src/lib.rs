//! # Local Files Provider
//!
//! Exposes a folder of audio files and M3U playlists as a
//! [`MusicProvider`](core_library::MusicProvider).
//!
//! ## Example
//!
//! ```ignore
//! use provider_local_files::{LocalFilesConfig, LocalFilesProvider};
//! use std::sync::Arc;
//!
//! let provider = LocalFilesProvider::new(LocalFilesConfig::new("/home/me/Music"));
//! registry.register(Arc::new(provider));
//! ```

pub mod error;
pub mod m3u;
pub mod provider;
pub mod scanner;

pub use error::{LocalFilesError, Result};
pub use provider::{LocalFilesConfig, LocalFilesProvider, DEFAULT_PROVIDER_ID};
pub use scanner::ScannedTrack;
