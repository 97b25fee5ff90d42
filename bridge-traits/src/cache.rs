//! Key/Value Cache Abstraction
//!
//! A short-lived, string-keyed store of JSON values. The sync engine uses it
//! to remember the identifier set observed at the end of the previous run for
//! each `(media type, provider)` pair; anything durable belongs in the
//! library store instead.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::Result;

/// Key/value cache trait
///
/// Implementations must treat expired entries as absent. Values are opaque
/// JSON documents; typed access goes through [`get_or_default`] and [`put`].
///
/// # Example
///
/// ```ignore
/// use bridge_traits::cache::{get_or_default, put, KeyValueCache};
///
/// async fn remember(cache: &dyn KeyValueCache, ids: Vec<String>) -> Result<()> {
///     let previous: Vec<String> = get_or_default(cache, "library_tracks_p1", Vec::new()).await?;
///     put(cache, "library_tracks_p1", &ids, None).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Retrieve a value, `None` when missing or expired
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store a value, replacing any previous one
    ///
    /// `ttl` of `None` keeps the entry until it is overwritten or deleted.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()>;

    /// Remove a value
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Read a typed value, falling back to `default` when the key is absent.
///
/// A stored value that no longer deserializes into `T` is an error rather
/// than a silent default: callers that diff against the result must not
/// mistake a corrupt entry for an empty one.
pub async fn get_or_default<T>(cache: &dyn KeyValueCache, key: &str, default: T) -> Result<T>
where
    T: DeserializeOwned,
{
    match cache.get(key).await? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(default),
    }
}

/// Serialize and store a typed value.
pub async fn put<T>(
    cache: &dyn KeyValueCache,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(value)?;
    cache.set(key, value, ttl).await
}
