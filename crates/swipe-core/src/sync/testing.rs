//! In-process fakes for driving the pipeline in tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::db::{CursorStore, Database, LibSqlListingStore, ListingStore};
use crate::error::{Error, Result};
use crate::feed::{FeedError, FeedResult, ListingFeed};
use crate::models::{Cursor, LocalRecord, MalformedRow, MediaItem, PageEntry, UpstreamRecord};

#[derive(Default)]
pub struct FakeFeed {
    pub records: Vec<UpstreamRecord>,
    /// Unparseable rows served alongside `records`; rows with no position
    /// are included in every page.
    pub malformed: Vec<MalformedRow>,
    pub media: HashMap<String, Vec<MediaItem>>,
    pub broken_media: HashSet<String>,
    pub active_keys: Vec<String>,
    pub fail_count: bool,
    pub fail_active_keys: bool,
    /// Fail the n-th (1-based) page request.
    pub fail_page: Option<usize>,
    pub media_latency: Duration,
    pub page_requests: Mutex<Vec<Cursor>>,
    pub active_key_requests: Mutex<Vec<usize>>,
    pub in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl FakeFeed {
    pub fn with_records(records: Vec<UpstreamRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn page_request_count(&self) -> usize {
        self.page_requests.lock().unwrap().len()
    }

    fn entries_after(&self, cursor: &Cursor) -> Vec<PageEntry> {
        let mut entries: Vec<PageEntry> = self
            .records
            .iter()
            .cloned()
            .map(PageEntry::from)
            .chain(self.malformed.iter().cloned().map(PageEntry::Malformed))
            .filter(|entry| {
                entry
                    .cursor()
                    .is_none_or(|position| cursor.precedes(&position.timestamp, &position.key))
            })
            .collect();
        entries.sort_by_key(PageEntry::cursor);
        entries
    }

    fn unavailable(operation: &'static str) -> FeedError {
        FeedError::Status {
            operation,
            status: 503,
            body: "unavailable".to_string(),
        }
    }
}

impl ListingFeed for FakeFeed {
    async fn count_pending(&self, cursor: &Cursor) -> FeedResult<u64> {
        if self.fail_count {
            return Err(Self::unavailable("Count fetch"));
        }
        Ok(self.entries_after(cursor).len() as u64)
    }

    async fn fetch_page(&self, cursor: &Cursor, page_size: usize) -> FeedResult<Vec<PageEntry>> {
        let request = {
            let mut requests = self.page_requests.lock().unwrap();
            requests.push(cursor.clone());
            requests.len()
        };
        if self.fail_page == Some(request) {
            return Err(Self::unavailable("Batch fetch"));
        }

        let mut page = self.entries_after(cursor);
        page.truncate(page_size);
        Ok(page)
    }

    async fn fetch_media(&self, listing_key: &str) -> FeedResult<Vec<MediaItem>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.media_latency.is_zero() {
            tokio::time::sleep(self.media_latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.broken_media.contains(listing_key) {
            return Err(Self::unavailable("Media fetch"));
        }
        Ok(self.media.get(listing_key).cloned().unwrap_or_default())
    }

    async fn fetch_active_key_page(&self, skip: usize, top: usize) -> FeedResult<Vec<String>> {
        self.active_key_requests.lock().unwrap().push(skip);
        if self.fail_active_keys {
            return Err(Self::unavailable("Active key fetch"));
        }
        let mut keys = self.active_keys.clone();
        keys.sort();
        Ok(keys.into_iter().skip(skip).take(top).collect())
    }
}

/// Real in-memory store with injectable failures.
pub struct FlakyStore {
    pub inner: LibSqlListingStore,
    pub failing_ids: Mutex<HashSet<String>>,
    pub fail_cursor_load: bool,
    pub fail_cursor_save: bool,
    pub fail_active_read: bool,
}

impl FlakyStore {
    pub async fn new() -> Self {
        let db = Database::open_in_memory().await.unwrap();
        Self {
            inner: LibSqlListingStore::new(Arc::new(db)),
            failing_ids: Mutex::new(HashSet::new()),
            fail_cursor_load: false,
            fail_cursor_save: false,
            fail_active_read: false,
        }
    }

    pub fn fail_writes_for(&self, id: &str) {
        self.failing_ids.lock().unwrap().insert(id.to_string());
    }

    pub fn heal(&self) {
        self.failing_ids.lock().unwrap().clear();
    }

    fn injected(what: &str) -> Error {
        Error::Database(format!("injected {what} failure"))
    }
}

impl ListingStore for FlakyStore {
    async fn upsert_listing(&self, record: &LocalRecord) -> Result<()> {
        if self.failing_ids.lock().unwrap().contains(&record.id) {
            return Err(Self::injected("write"));
        }
        self.inner.upsert_listing(record).await
    }

    async fn upsert_media(&self, listing_id: &str, urls: &[String]) -> Result<()> {
        self.inner.upsert_media(listing_id, urls).await
    }

    async fn delete_media(&self, listing_id: &str) -> Result<()> {
        self.inner.delete_media(listing_id).await
    }

    async fn active_listing_ids(&self) -> Result<HashSet<String>> {
        if self.fail_active_read {
            return Err(Self::injected("read"));
        }
        self.inner.active_listing_ids().await
    }

    async fn mark_inactive(&self, ids: &[String]) -> Result<u64> {
        self.inner.mark_inactive(ids).await
    }
}

impl CursorStore for FlakyStore {
    async fn load_cursor(&self) -> Result<Option<Cursor>> {
        if self.fail_cursor_load {
            return Err(Self::injected("cursor read"));
        }
        self.inner.load_cursor().await
    }

    async fn save_cursor(&self, cursor: &Cursor) -> Result<bool> {
        if self.fail_cursor_save {
            return Err(Self::injected("cursor write"));
        }
        self.inner.save_cursor(cursor).await
    }
}

/// `count` sequential listings one second apart, keyed `L000`, `L001`, ...
pub fn listings(count: usize) -> Vec<UpstreamRecord> {
    (0..count)
        .map(|index| {
            let mut record = UpstreamRecord::new(
                format!("L{index:03}"),
                format!("2024-05-01T10:{:02}:{:02}Z", index / 60, index % 60),
                500_000.0,
            );
            record.property_sub_type = Some("Detached".to_string());
            record
        })
        .collect()
}

/// A malformed row at `(timestamp, key)`.
pub fn malformed_row(key: &str, timestamp: &str) -> MalformedRow {
    MalformedRow {
        listing_key: Some(key.to_string()),
        modification_timestamp: Some(timestamp.to_string()),
        reason: "invalid type: integer `5`, expected a string".to_string(),
    }
}
