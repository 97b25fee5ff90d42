//! Workspace façade crate.
//!
//! Re-exports the service crate behind features so host applications can
//! depend on `medialib-workspace` alone:
//!
//! - `service` (default): [`core_service`]
//! - `local-files`: the local folder provider, also reachable through
//!   `core_service::LocalFilesProvider`

#[cfg(feature = "service")]
pub use core_service::*;

#[cfg(feature = "local-files")]
pub use provider_local_files;
