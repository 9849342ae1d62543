//! Listing and checkpoint persistence

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use libsql::{Row, Value};
use serde::Serialize;

use super::Database;
use crate::error::{Error, Result};
use crate::models::{Cursor, LocalRecord, PropertyCategory};
use crate::util::unix_timestamp_now;

/// Write side of the replicated listing store.
pub trait ListingStore: Send + Sync {
    /// Insert or replace a listing keyed on its id. Always marks it active.
    fn upsert_listing(&self, record: &LocalRecord) -> impl Future<Output = Result<()>> + Send;

    /// Replace the media URL list for a listing.
    fn upsert_media(
        &self,
        listing_id: &str,
        urls: &[String],
    ) -> impl Future<Output = Result<()>> + Send;

    fn delete_media(&self, listing_id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Ids of every listing currently marked active.
    fn active_listing_ids(&self) -> impl Future<Output = Result<HashSet<String>>> + Send;

    /// Flip the given listings to inactive in one statement.
    ///
    /// Returns how many rows actually changed.
    fn mark_inactive(&self, ids: &[String]) -> impl Future<Output = Result<u64>> + Send;
}

/// Durable replication position.
pub trait CursorStore: Send + Sync {
    /// The stored cursor, or `None` when nothing has been replicated yet.
    fn load_cursor(&self) -> impl Future<Output = Result<Option<Cursor>>> + Send;

    /// Persist `cursor` unless the stored one is already at or past it.
    ///
    /// Returns whether the checkpoint moved.
    fn save_cursor(&self, cursor: &Cursor) -> impl Future<Output = Result<bool>> + Send;
}

/// Row counts by lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ListingCounts {
    pub active: u64,
    pub inactive: u64,
}

/// libSQL implementation of [`ListingStore`] and [`CursorStore`].
#[derive(Debug, Clone)]
pub struct LibSqlListingStore {
    db: Arc<Database>,
}

impl LibSqlListingStore {
    pub const fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn get_listing(&self, id: &str) -> Result<Option<LocalRecord>> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT mls_number, address, city, province, postal_code, price, bedrooms,
                        bathrooms, property_type, last_timestamp, last_key, is_active
                 FROM properties WHERE mls_number = ?",
                [id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_listing(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn media_urls(&self, id: &str) -> Result<Option<Vec<String>>> {
        let mut rows = self
            .db
            .connection()
            .query("SELECT image_urls FROM media WHERE mls_number = ?", [id])
            .await?;

        match rows.next().await? {
            Some(row) => {
                let raw: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    pub async fn listing_counts(&self) -> Result<ListingCounts> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT COALESCE(SUM(is_active = 1), 0), COALESCE(SUM(is_active = 0), 0) FROM properties",
                (),
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(ListingCounts::default());
        };
        Ok(ListingCounts {
            active: u64::try_from(row.get::<i64>(0)?).unwrap_or_default(),
            inactive: u64::try_from(row.get::<i64>(1)?).unwrap_or_default(),
        })
    }

    async fn checkpoint(&self) -> Result<Option<Cursor>> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT last_timestamp, last_key FROM replication_checkpoint WHERE id = 1",
                (),
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Cursor::new(
                row.get::<String>(0)?,
                row.get::<String>(1)?,
            ))),
            None => Ok(None),
        }
    }

    /// Highest `(last_timestamp, last_key)` across stored listings.
    ///
    /// Compared in Rust so that timestamps with differing fractional
    /// precision still order by instant.
    async fn data_derived_cursor(&self) -> Result<Option<Cursor>> {
        let mut rows = self
            .db
            .connection()
            .query("SELECT last_timestamp, last_key FROM properties", ())
            .await?;

        let mut latest: Option<Cursor> = None;
        while let Some(row) = rows.next().await? {
            let cursor = Cursor::new(row.get::<String>(0)?, row.get::<String>(1)?);
            if latest.as_ref().is_none_or(|current| cursor > *current) {
                latest = Some(cursor);
            }
        }
        Ok(latest)
    }

    fn parse_listing(row: &Row) -> Result<LocalRecord> {
        let property_type: String = row.get(8)?;
        Ok(LocalRecord {
            id: row.get(0)?,
            address: text_column(row, 1)?,
            city: text_column(row, 2)?,
            province: text_column(row, 3)?,
            postal_code: text_column(row, 4)?,
            price: row.get(5)?,
            bedrooms: integer_column(row, 6)?,
            bathrooms: integer_column(row, 7)?,
            property_type: PropertyCategory::from_label(&property_type),
            last_timestamp: row.get(9)?,
            last_key: row.get(10)?,
            is_active: row.get::<i64>(11)? != 0,
        })
    }
}

impl ListingStore for LibSqlListingStore {
    async fn upsert_listing(&self, record: &LocalRecord) -> Result<()> {
        let params = vec![
            Value::Text(record.id.clone()),
            optional_text(record.address.as_deref()),
            optional_text(record.city.as_deref()),
            optional_text(record.province.as_deref()),
            optional_text(record.postal_code.as_deref()),
            Value::Real(record.price),
            optional_integer(record.bedrooms),
            optional_integer(record.bathrooms),
            Value::Text(record.property_type.as_str().to_string()),
            Value::Text(record.last_timestamp.clone()),
            Value::Text(record.last_key.clone()),
        ];

        self.db
            .connection()
            .execute(
                "INSERT INTO properties (
                    mls_number, address, city, province, postal_code, price, bedrooms,
                    bathrooms, property_type, last_timestamp, last_key, is_active
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 1)
                 ON CONFLICT(mls_number) DO UPDATE SET
                    address = excluded.address,
                    city = excluded.city,
                    province = excluded.province,
                    postal_code = excluded.postal_code,
                    price = excluded.price,
                    bedrooms = excluded.bedrooms,
                    bathrooms = excluded.bathrooms,
                    property_type = excluded.property_type,
                    last_timestamp = excluded.last_timestamp,
                    last_key = excluded.last_key,
                    is_active = 1",
                libsql::params_from_iter(params),
            )
            .await?;
        Ok(())
    }

    async fn upsert_media(&self, listing_id: &str, urls: &[String]) -> Result<()> {
        let encoded = serde_json::to_string(urls)?;
        self.db
            .connection()
            .execute(
                "INSERT INTO media (mls_number, image_urls) VALUES (?1, ?2)
                 ON CONFLICT(mls_number) DO UPDATE SET image_urls = excluded.image_urls",
                [listing_id, encoded.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn delete_media(&self, listing_id: &str) -> Result<()> {
        self.db
            .connection()
            .execute("DELETE FROM media WHERE mls_number = ?", [listing_id])
            .await?;
        Ok(())
    }

    async fn active_listing_ids(&self) -> Result<HashSet<String>> {
        let mut rows = self
            .db
            .connection()
            .query("SELECT mls_number FROM properties WHERE is_active = 1", ())
            .await?;

        let mut ids = HashSet::new();
        while let Some(row) = rows.next().await? {
            ids.insert(row.get::<String>(0)?);
        }
        Ok(ids)
    }

    async fn mark_inactive(&self, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let encoded = serde_json::to_string(ids)?;
        let changed = self
            .db
            .connection()
            .execute(
                "UPDATE properties SET is_active = 0
                 WHERE is_active = 1
                   AND mls_number IN (SELECT value FROM json_each(?1))",
                [encoded.as_str()],
            )
            .await?;
        Ok(changed)
    }
}

impl CursorStore for LibSqlListingStore {
    async fn load_cursor(&self) -> Result<Option<Cursor>> {
        if let Some(cursor) = self.checkpoint().await? {
            return Ok(Some(cursor));
        }

        let derived = self.data_derived_cursor().await?;
        if let Some(cursor) = &derived {
            tracing::info!(cursor = %cursor, "No checkpoint stored, resuming from newest listing");
        }
        Ok(derived)
    }

    async fn save_cursor(&self, cursor: &Cursor) -> Result<bool> {
        if let Some(current) = self.checkpoint().await? {
            if current >= *cursor {
                tracing::debug!(
                    current = %current,
                    requested = %cursor,
                    "Checkpoint already at or past requested cursor"
                );
                return Ok(false);
            }
        }

        let params = vec![
            Value::Text(cursor.timestamp.clone()),
            Value::Text(cursor.key.clone()),
            Value::Integer(unix_timestamp_now()),
        ];
        self.db
            .connection()
            .execute(
                "INSERT INTO replication_checkpoint (id, last_timestamp, last_key, updated_at)
                 VALUES (1, ?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                    last_timestamp = excluded.last_timestamp,
                    last_key = excluded.last_key,
                    updated_at = excluded.updated_at",
                libsql::params_from_iter(params),
            )
            .await?;
        Ok(true)
    }
}

fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

fn optional_integer(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

fn text_column(row: &Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text)),
        other => Err(Error::Database(format!(
            "expected text in column {idx}, found {other:?}"
        ))),
    }
}

fn integer_column(row: &Row, idx: i32) -> Result<Option<i64>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Integer(number) => Ok(Some(number)),
        other => Err(Error::Database(format!(
            "expected integer in column {idx}, found {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    async fn setup() -> LibSqlListingStore {
        let db = Database::open_in_memory().await.unwrap();
        LibSqlListingStore::new(Arc::new(db))
    }

    fn listing(id: &str, timestamp: &str) -> LocalRecord {
        LocalRecord {
            id: id.to_string(),
            address: Some("12 Maple Ave".to_string()),
            city: Some("Toronto".to_string()),
            province: Some("ON".to_string()),
            postal_code: None,
            price: 899_000.0,
            bedrooms: Some(3),
            bathrooms: None,
            property_type: PropertyCategory::Townhouse,
            last_timestamp: timestamp.to_string(),
            last_key: id.to_string(),
            is_active: true,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_listing_round_trips() {
        let store = setup().await;
        let record = listing("W1", "2024-05-01T10:00:00Z");

        store.upsert_listing(&record).await.unwrap();

        assert_eq!(store.get_listing("W1").await.unwrap(), Some(record));
        assert_eq!(store.get_listing("missing").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_listing_is_idempotent() {
        let store = setup().await;
        let record = listing("W1", "2024-05-01T10:00:00Z");

        store.upsert_listing(&record).await.unwrap();
        store.upsert_listing(&record).await.unwrap();

        assert_eq!(
            store.listing_counts().await.unwrap(),
            ListingCounts {
                active: 1,
                inactive: 0
            }
        );
        assert_eq!(store.get_listing("W1").await.unwrap(), Some(record));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_reactivates_listing() {
        let store = setup().await;
        store
            .upsert_listing(&listing("W1", "2024-05-01T10:00:00Z"))
            .await
            .unwrap();
        store.mark_inactive(&["W1".to_string()]).await.unwrap();
        assert!(!store.get_listing("W1").await.unwrap().unwrap().is_active);

        store
            .upsert_listing(&listing("W1", "2024-05-02T10:00:00Z"))
            .await
            .unwrap();
        assert!(store.get_listing("W1").await.unwrap().unwrap().is_active);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_media_is_replaced_and_deleted() {
        let store = setup().await;
        let first = vec!["https://img.test/a.jpg".to_string()];
        let second = vec![
            "https://img.test/b.jpg".to_string(),
            "https://img.test/c.jpg".to_string(),
        ];

        store.upsert_media("W1", &first).await.unwrap();
        store.upsert_media("W1", &second).await.unwrap();
        assert_eq!(store.media_urls("W1").await.unwrap(), Some(second));

        store.delete_media("W1").await.unwrap();
        assert_eq!(store.media_urls("W1").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mark_inactive_counts_only_changed_rows() {
        let store = setup().await;
        for id in ["A", "B", "C"] {
            store
                .upsert_listing(&listing(id, "2024-05-01T10:00:00Z"))
                .await
                .unwrap();
        }

        let ids = vec!["A".to_string(), "D".to_string()];
        assert_eq!(store.mark_inactive(&ids).await.unwrap(), 1);
        assert_eq!(store.mark_inactive(&ids).await.unwrap(), 0);
        assert_eq!(store.mark_inactive(&[]).await.unwrap(), 0);

        let active = store.active_listing_ids().await.unwrap();
        assert_eq!(
            active,
            HashSet::from(["B".to_string(), "C".to_string()])
        );
        assert!(store.get_listing("D").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_load_cursor_empty_store() {
        let store = setup().await;
        assert_eq!(store.load_cursor().await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_load_cursor_falls_back_to_newest_listing() {
        let store = setup().await;
        store
            .upsert_listing(&listing("B", "2024-05-01T10:00:00Z"))
            .await
            .unwrap();
        store
            .upsert_listing(&listing("A", "2024-05-01T10:00:00.500Z"))
            .await
            .unwrap();
        store
            .upsert_listing(&listing("C", "2024-05-01T10:00:00Z"))
            .await
            .unwrap();

        assert_eq!(
            store.load_cursor().await.unwrap(),
            Some(Cursor::new("2024-05-01T10:00:00.500Z", "A"))
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_checkpoint_takes_precedence_over_data() {
        let store = setup().await;
        store
            .upsert_listing(&listing("Z", "2024-06-01T00:00:00Z"))
            .await
            .unwrap();
        let checkpoint = Cursor::new("2024-05-01T00:00:00Z", "M");

        assert!(store.save_cursor(&checkpoint).await.unwrap());
        assert_eq!(store.load_cursor().await.unwrap(), Some(checkpoint));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_save_cursor_never_moves_backwards() {
        let store = setup().await;
        let later = Cursor::new("2024-05-02T00:00:00Z", "B");
        let earlier = Cursor::new("2024-05-01T00:00:00Z", "Z");

        assert!(store.save_cursor(&later).await.unwrap());
        assert!(!store.save_cursor(&earlier).await.unwrap());
        assert!(!store.save_cursor(&later).await.unwrap());
        assert_eq!(store.load_cursor().await.unwrap(), Some(later.clone()));

        let tie_break = Cursor::new("2024-05-02T00:00:00Z", "C");
        assert!(store.save_cursor(&tie_break).await.unwrap());
        assert_eq!(store.load_cursor().await.unwrap(), Some(tie_break));
    }
}
