//! Library store trait and SQLite implementation
//!
//! The store owns canonical media records, their provider mappings and the
//! library membership rows. Membership is keyed by `(item, media type,
//! provider)`: removing an item from one provider's library never touches
//! the record itself or its membership under other providers.

use crate::error::{LibraryError, Result};
use crate::models::{MediaItem, MediaType, OrderBy, Origin, PlaylistField, ProviderRef};
use async_trait::async_trait;
use sqlx::{query, query_as, FromRow, SqlitePool};
use std::str::FromStr;
use tracing::{debug, instrument};

/// Durable storage for library records and membership.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Fetch a record by library id.
    async fn get_item(&self, media_type: MediaType, item_id: &str) -> Result<Option<MediaItem>>;

    /// Find the record owning a provider reference.
    async fn find_by_provider_ref(
        &self,
        media_type: MediaType,
        provider: &str,
        provider_item_id: &str,
    ) -> Result<Option<MediaItem>>;

    /// Insert a new library record. `item.origin` must be [`Origin::Library`].
    async fn insert_item(&self, item: &MediaItem) -> Result<()>;

    /// Overwrite a record and replace its provider mappings.
    async fn update_item(&self, item: &MediaItem) -> Result<()>;

    /// Mark the item as a library member for `provider`. Idempotent.
    async fn add_to_library(&self, item_id: &str, media_type: MediaType, provider: &str)
        -> Result<()>;

    /// Drop the membership of the item for `provider`. Missing rows are ignored.
    async fn remove_from_library(
        &self,
        item_id: &str,
        media_type: MediaType,
        provider: &str,
    ) -> Result<()>;

    /// Update a single playlist column.
    async fn update_playlist(&self, item_id: &str, field: PlaylistField) -> Result<()>;

    /// All library members of a media type, under any provider.
    async fn list_library(&self, media_type: MediaType, order_by: OrderBy) -> Result<Vec<MediaItem>>;

    /// Ids of items that are library members for `provider`.
    async fn library_ids(&self, media_type: MediaType, provider: &str) -> Result<Vec<String>>;

    /// First library member of a media type with exactly this name.
    async fn find_library_item_by_name(
        &self,
        media_type: MediaType,
        name: &str,
    ) -> Result<Option<MediaItem>>;
}

#[derive(Debug, FromRow)]
struct MediaItemRow {
    id: String,
    media_type: String,
    name: String,
    artist: Option<String>,
    album: Option<String>,
    available: bool,
    is_editable: bool,
    checksum: Option<String>,
    owner: Option<String>,
}

#[derive(Debug, FromRow)]
struct ProviderMappingRow {
    provider: String,
    provider_item_id: String,
    quality: i32,
}

impl MediaItemRow {
    fn into_item(self, provider_refs: Vec<ProviderRef>) -> Result<MediaItem> {
        let media_type =
            MediaType::from_str(&self.media_type).map_err(|message| LibraryError::InvalidInput {
                field: "media_type".to_string(),
                message,
            })?;

        Ok(MediaItem {
            item_id: self.id,
            media_type,
            name: self.name,
            origin: Origin::Library,
            available: self.available,
            provider_refs,
            is_editable: self.is_editable,
            checksum: self.checksum,
            owner: self.owner,
            artist: self.artist,
            album: self.album,
        })
    }
}

const SELECT_ITEM: &str = "SELECT m.id, m.media_type, m.name, m.artist, m.album, m.available, \
                           m.is_editable, m.checksum, m.owner FROM media_items m";

fn sort_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn validate(item: &MediaItem) -> Result<()> {
    if !item.origin.is_library() {
        return Err(LibraryError::InvalidInput {
            field: "origin".to_string(),
            message: format!("only library records can be stored, got {:?}", item.origin),
        });
    }
    if item.item_id.trim().is_empty() {
        return Err(LibraryError::InvalidInput {
            field: "item_id".to_string(),
            message: "cannot be empty".to_string(),
        });
    }
    Ok(())
}

/// SQLite implementation of [`LibraryStore`]
#[derive(Clone)]
pub struct SqliteLibraryStore {
    pool: SqlitePool,
}

impl SqliteLibraryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn load_refs(&self, item_id: &str) -> Result<Vec<ProviderRef>> {
        let rows = query_as::<_, ProviderMappingRow>(
            "SELECT provider, provider_item_id, quality FROM provider_mappings \
             WHERE item_id = ? ORDER BY provider ASC, quality DESC, provider_item_id ASC",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ProviderRef::new(row.provider, row.provider_item_id, row.quality))
            .collect())
    }

    async fn hydrate(&self, row: MediaItemRow) -> Result<MediaItem> {
        let refs = self.load_refs(&row.id).await?;
        row.into_item(refs)
    }

    async fn hydrate_all(&self, rows: Vec<MediaItemRow>) -> Result<Vec<MediaItem>> {
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(self.hydrate(row).await?);
        }
        Ok(items)
    }

    async fn write_mappings(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        item: &MediaItem,
    ) -> Result<()> {
        query("DELETE FROM provider_mappings WHERE item_id = ?")
            .bind(&item.item_id)
            .execute(&mut **tx)
            .await?;

        for provider_ref in &item.provider_refs {
            // a reference moves to the record that claims it last
            query(
                "INSERT OR REPLACE INTO provider_mappings \
                 (item_id, media_type, provider, provider_item_id, quality) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&item.item_id)
            .bind(item.media_type.as_str())
            .bind(&provider_ref.provider)
            .bind(&provider_ref.item_id)
            .bind(provider_ref.quality)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl LibraryStore for SqliteLibraryStore {
    async fn get_item(&self, media_type: MediaType, item_id: &str) -> Result<Option<MediaItem>> {
        let row = query_as::<_, MediaItemRow>(&format!(
            "{} WHERE m.id = ? AND m.media_type = ?",
            SELECT_ITEM
        ))
        .bind(item_id)
        .bind(media_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_provider_ref(
        &self,
        media_type: MediaType,
        provider: &str,
        provider_item_id: &str,
    ) -> Result<Option<MediaItem>> {
        let row = query_as::<_, MediaItemRow>(&format!(
            "{} JOIN provider_mappings p ON p.item_id = m.id \
             WHERE p.media_type = ? AND p.provider = ? AND p.provider_item_id = ?",
            SELECT_ITEM
        ))
        .bind(media_type.as_str())
        .bind(provider)
        .bind(provider_item_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, item), fields(item_id = %item.item_id, media_type = %item.media_type))]
    async fn insert_item(&self, item: &MediaItem) -> Result<()> {
        validate(item)?;
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;
        query(
            r#"
            INSERT INTO media_items (
                id, media_type, name, sort_name, artist, album, available,
                is_editable, checksum, owner, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.item_id)
        .bind(item.media_type.as_str())
        .bind(&item.name)
        .bind(sort_name(&item.name))
        .bind(&item.artist)
        .bind(&item.album)
        .bind(item.available)
        .bind(item.is_editable)
        .bind(&item.checksum)
        .bind(&item.owner)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        Self::write_mappings(&mut tx, item).await?;
        tx.commit().await?;

        debug!("Inserted library record");
        Ok(())
    }

    #[instrument(skip(self, item), fields(item_id = %item.item_id, media_type = %item.media_type))]
    async fn update_item(&self, item: &MediaItem) -> Result<()> {
        validate(item)?;

        let mut tx = self.pool.begin().await?;
        let result = query(
            r#"
            UPDATE media_items
            SET name = ?, sort_name = ?, artist = ?, album = ?, available = ?,
                is_editable = ?, checksum = ?, owner = ?, updated_at = ?
            WHERE id = ? AND media_type = ?
            "#,
        )
        .bind(&item.name)
        .bind(sort_name(&item.name))
        .bind(&item.artist)
        .bind(&item.album)
        .bind(item.available)
        .bind(item.is_editable)
        .bind(&item.checksum)
        .bind(&item.owner)
        .bind(chrono::Utc::now().timestamp())
        .bind(&item.item_id)
        .bind(item.media_type.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: item.media_type.to_string(),
                id: item.item_id.clone(),
            });
        }

        Self::write_mappings(&mut tx, item).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn add_to_library(
        &self,
        item_id: &str,
        media_type: MediaType,
        provider: &str,
    ) -> Result<()> {
        query(
            "INSERT OR IGNORE INTO library_items (item_id, media_type, provider, added_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(item_id)
        .bind(media_type.as_str())
        .bind(provider)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_from_library(
        &self,
        item_id: &str,
        media_type: MediaType,
        provider: &str,
    ) -> Result<()> {
        query("DELETE FROM library_items WHERE item_id = ? AND media_type = ? AND provider = ?")
            .bind(item_id)
            .bind(media_type.as_str())
            .bind(provider)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_playlist(&self, item_id: &str, field: PlaylistField) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let result = match field {
            PlaylistField::Checksum(checksum) => {
                query(
                    "UPDATE media_items SET checksum = ?, updated_at = ? \
                     WHERE id = ? AND media_type = 'playlist'",
                )
                .bind(checksum)
                .bind(now)
                .bind(item_id)
                .execute(&self.pool)
                .await?
            }
            PlaylistField::Name(name) => {
                query(
                    "UPDATE media_items SET name = ?, sort_name = ?, updated_at = ? \
                     WHERE id = ? AND media_type = 'playlist'",
                )
                .bind(&name)
                .bind(sort_name(&name))
                .bind(now)
                .bind(item_id)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "playlist".to_string(),
                id: item_id.to_string(),
            });
        }

        Ok(())
    }

    async fn list_library(&self, media_type: MediaType, order_by: OrderBy) -> Result<Vec<MediaItem>> {
        let order_clause = match order_by {
            OrderBy::Name => "m.sort_name ASC, m.id ASC",
            OrderBy::DateAdded => "first_added ASC, m.id ASC",
            OrderBy::LastModified => "m.updated_at DESC, m.id ASC",
        };

        let rows = query_as::<_, MediaItemRow>(&format!(
            "SELECT m.id, m.media_type, m.name, m.artist, m.album, m.available, \
                    m.is_editable, m.checksum, m.owner, MIN(l.added_at) AS first_added \
             FROM media_items m JOIN library_items l ON l.item_id = m.id \
             WHERE m.media_type = ? \
             GROUP BY m.id \
             ORDER BY {}",
            order_clause
        ))
        .bind(media_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        self.hydrate_all(rows).await
    }

    async fn library_ids(&self, media_type: MediaType, provider: &str) -> Result<Vec<String>> {
        let ids = query_as::<_, (String,)>(
            "SELECT item_id FROM library_items WHERE media_type = ? AND provider = ? \
             ORDER BY added_at ASC, item_id ASC",
        )
        .bind(media_type.as_str())
        .bind(provider)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(id,)| id)
        .collect();

        Ok(ids)
    }

    async fn find_library_item_by_name(
        &self,
        media_type: MediaType,
        name: &str,
    ) -> Result<Option<MediaItem>> {
        let row = query_as::<_, MediaItemRow>(&format!(
            "{} WHERE m.media_type = ? AND m.name = ? \
             AND EXISTS (SELECT 1 FROM library_items l WHERE l.item_id = m.id) \
             ORDER BY m.created_at ASC LIMIT 1",
            SELECT_ITEM
        ))
        .bind(media_type.as_str())
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }
}
