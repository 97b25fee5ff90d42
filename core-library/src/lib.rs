//! # Library Management Module
//!
//! Owns the canonical media library and the contracts the sync engine uses
//! to reach it.
//!
//! ## Overview
//!
//! This module manages:
//! - Domain models: media types, items, provider references
//! - SQLite schema, migrations and connection pooling
//! - The [`LibraryStore`](store::LibraryStore) for records and membership
//! - A SQLite-backed [`KeyValueCache`](bridge_traits::KeyValueCache)
//! - The [`MusicProvider`](provider::MusicProvider) contract and registry
//! - The [`MediaResolver`](resolver::MediaResolver) match/lookup collaborator

pub mod cache;
pub mod db;
pub mod error;
pub mod models;
pub mod provider;
pub mod resolver;
pub mod store;

pub use cache::SqliteKeyValueCache;
pub use error::{LibraryError, Result};
pub use models::{MediaItem, MediaType, OrderBy, Origin, PlaylistField, ProviderRef, LIBRARY_PROVIDER_ID};
pub use provider::{listing_from_vec, CatalogListing, MusicProvider, ProviderKind, ProviderRegistry};
pub use resolver::{LibraryResolver, MediaResolver};
pub use store::{LibraryStore, SqliteLibraryStore};
