//! Reconciliation of the local active set against upstream

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;

use super::elapsed_ms;
use crate::db::ListingStore;
use crate::error::Result;
use crate::feed::ListingFeed;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub run_id: Uuid,
    pub upstream_active: usize,
    pub local_active: usize,
    pub deactivated: u64,
    pub elapsed_ms: u64,
}

/// Marks listings inactive once upstream stops returning them.
///
/// Independent of the replication cursor; every run is a full scan.
pub struct Sweeper<F, S> {
    feed: Arc<F>,
    store: Arc<S>,
    batch_size: usize,
}

impl<F, S> Sweeper<F, S>
where
    F: ListingFeed,
    S: ListingStore,
{
    pub const fn new(feed: Arc<F>, store: Arc<S>, batch_size: usize) -> Self {
        Self {
            feed,
            store,
            batch_size,
        }
    }

    /// Any read failure aborts before a single listing is touched.
    pub async fn run(&self) -> Result<SweepReport> {
        let run_id = Uuid::now_v7();
        let started = Instant::now();
        tracing::info!(run_id = %run_id, batch_size = self.batch_size, "Starting reconciliation sweep");

        let upstream = self.feed.fetch_all_active_keys(self.batch_size).await?;
        let local = self.store.active_listing_ids().await?;
        let missing = missing_ids(&local, &upstream);

        let deactivated = if missing.is_empty() {
            0
        } else {
            self.store.mark_inactive(&missing).await?
        };

        let report = SweepReport {
            run_id,
            upstream_active: upstream.len(),
            local_active: local.len(),
            deactivated,
            elapsed_ms: elapsed_ms(started),
        };
        tracing::info!(
            run_id = %run_id,
            upstream_active = report.upstream_active,
            local_active = report.local_active,
            deactivated = report.deactivated,
            "Reconciliation finished"
        );
        Ok(report)
    }
}

/// Locally active ids absent upstream, sorted.
pub fn missing_ids(local: &HashSet<String>, upstream: &HashSet<String>) -> Vec<String> {
    let mut missing: Vec<String> = local.difference(upstream).cloned().collect();
    missing.sort();
    missing
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{LocalRecord, PropertyCategory};
    use crate::sync::testing::{FakeFeed, FlakyStore};

    fn ids(values: &[&str]) -> HashSet<String> {
        values.iter().map(|value| (*value).to_string()).collect()
    }

    async fn seeded_store(values: &[&str]) -> Arc<FlakyStore> {
        let store = FlakyStore::new().await;
        for id in values {
            let record = LocalRecord {
                id: (*id).to_string(),
                address: None,
                city: None,
                province: None,
                postal_code: None,
                price: 100_000.0,
                bedrooms: None,
                bathrooms: None,
                property_type: PropertyCategory::Condo,
                last_timestamp: "2024-05-01T00:00:00Z".to_string(),
                last_key: (*id).to_string(),
                is_active: true,
            };
            store.inner.upsert_listing(&record).await.unwrap();
        }
        Arc::new(store)
    }

    fn feed_with_keys(values: &[&str]) -> Arc<FakeFeed> {
        Arc::new(FakeFeed {
            active_keys: values.iter().map(|value| (*value).to_string()).collect(),
            ..FakeFeed::default()
        })
    }

    #[test]
    fn missing_ids_is_local_minus_upstream() {
        assert_eq!(
            missing_ids(&ids(&["A", "B", "C"]), &ids(&["B", "C", "D"])),
            vec!["A".to_string()]
        );
        assert!(missing_ids(&ids(&["A"]), &ids(&["A", "B"])).is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deactivates_only_missing_listings() {
        let store = seeded_store(&["A", "B", "C"]).await;
        let feed = feed_with_keys(&["B", "C", "D"]);

        let report = Sweeper::new(feed, Arc::clone(&store), 2).run().await.unwrap();

        assert_eq!(report.upstream_active, 3);
        assert_eq!(report.local_active, 3);
        assert_eq!(report.deactivated, 1);
        assert_eq!(
            store.inner.active_listing_ids().await.unwrap(),
            ids(&["B", "C"])
        );
        assert!(!store.inner.get_listing("A").await.unwrap().unwrap().is_active);
        assert!(store.inner.get_listing("D").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_op_when_sets_match() {
        let store = seeded_store(&["A", "B"]).await;
        let feed = feed_with_keys(&["A", "B"]);

        let report = Sweeper::new(feed, Arc::clone(&store), 1000).run().await.unwrap();

        assert_eq!(report.deactivated, 0);
        assert_eq!(store.inner.active_listing_ids().await.unwrap(), ids(&["A", "B"]));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn exact_multiple_of_batch_ends_on_empty_page() {
        let store = seeded_store(&["A", "B", "C", "D", "E"]).await;
        let feed = feed_with_keys(&["A", "B", "C", "D"]);

        let report = Sweeper::new(Arc::clone(&feed), Arc::clone(&store), 2)
            .run()
            .await
            .unwrap();

        assert_eq!(*feed.active_key_requests.lock().unwrap(), vec![0, 2, 4]);
        assert_eq!(report.upstream_active, 4);
        assert_eq!(report.deactivated, 1);
        assert_eq!(
            store.inner.active_listing_ids().await.unwrap(),
            ids(&["A", "B", "C", "D"])
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upstream_failure_aborts_without_changes() {
        let store = seeded_store(&["A", "B"]).await;
        let feed = Arc::new(FakeFeed {
            fail_active_keys: true,
            ..FakeFeed::default()
        });

        let err = Sweeper::new(feed, Arc::clone(&store), 1000).run().await.unwrap_err();

        assert!(err.is_upstream());
        assert_eq!(store.inner.active_listing_ids().await.unwrap(), ids(&["A", "B"]));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn local_read_failure_aborts() {
        let mut store = FlakyStore::new().await;
        store.fail_active_read = true;
        let feed = feed_with_keys(&["A"]);

        let result = Sweeper::new(feed, Arc::new(store), 1000).run().await;

        assert!(matches!(result, Err(crate::Error::Database(_))));
    }
}
