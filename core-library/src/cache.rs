//! SQLite-backed [`KeyValueCache`]
//!
//! Values are stored as JSON text next to an optional expiry timestamp
//! (milliseconds). Expired rows read as absent and are deleted lazily.

use async_trait::async_trait;
use bridge_traits::cache::KeyValueCache;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::time::{Clock, SystemClock};
use serde_json::Value;
use sqlx::{query, query_as, SqlitePool};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

pub struct SqliteKeyValueCache {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteKeyValueCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Remove every expired entry, returning how many were dropped.
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = query("DELETE FROM cache WHERE expires_at IS NOT NULL AND expires_at <= ?")
            .bind(self.clock.unix_timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected())
    }
}

fn db_error(e: sqlx::Error) -> BridgeError {
    BridgeError::DatabaseError(e.to_string())
}

#[async_trait]
impl KeyValueCache for SqliteKeyValueCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let row = query_as::<_, (String, Option<i64>)>(
            "SELECT value, expires_at FROM cache WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let Some((raw, expires_at)) = row else {
            return Ok(None);
        };

        if expires_at.is_some_and(|at| at <= self.clock.unix_timestamp_millis()) {
            trace!(key, "Cache entry expired");
            self.delete(key).await?;
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|ttl| {
            self.clock
                .unix_timestamp_millis()
                .saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
        });

        query("INSERT OR REPLACE INTO cache (key, value, expires_at) VALUES (?, ?, ?)")
            .bind(key)
            .bind(serde_json::to_string(&value)?)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        query("DELETE FROM cache WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(())
    }
}
