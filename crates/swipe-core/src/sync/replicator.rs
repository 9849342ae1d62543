//! Incremental replication driver

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::task::JoinSet;
use uuid::Uuid;

use super::{elapsed_ms, read_cursor, AdmissionGate};
use crate::config::{CursorPolicy, ReplicationConfig};
use crate::db::{CursorStore, ListingStore};
use crate::error::{Error, Result};
use crate::feed::{FeedError, ListingFeed};
use crate::media::resolve_media;
use crate::models::{Cursor, PageEntry, UpstreamRecord};
use crate::transform::transform;

/// Totals for one replication cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicationReport {
    pub run_id: Uuid,
    pub started_from: Cursor,
    pub final_cursor: Cursor,
    /// Upstream's pending count at the start, if it could be read.
    pub pending: Option<u64>,
    pub pages: u64,
    pub fetched: u64,
    pub persisted: u64,
    pub discarded: u64,
    pub write_failures: u64,
    pub media_failures: u64,
    /// Set when a failed write held the cursor back and paging stopped.
    pub stopped_early: bool,
    pub peak_in_flight: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordOutcome {
    Persisted { media_failed: bool },
    Discarded,
    WriteFailed,
}

impl RecordOutcome {
    const fn is_settled(self) -> bool {
        !matches!(self, Self::WriteFailed)
    }
}

/// Pulls changed listings from a feed into a store, one page at a time.
pub struct Replicator<F, S> {
    feed: Arc<F>,
    store: Arc<S>,
    config: ReplicationConfig,
}

impl<F, S> Replicator<F, S>
where
    F: ListingFeed + 'static,
    S: ListingStore + CursorStore + 'static,
{
    pub const fn new(feed: Arc<F>, store: Arc<S>, config: ReplicationConfig) -> Self {
        Self {
            feed,
            store,
            config,
        }
    }

    /// Run one replication cycle from the stored cursor.
    ///
    /// Page fetch failures abort the cycle; everything already checkpointed
    /// stays checkpointed.
    pub async fn run(&self) -> Result<ReplicationReport> {
        let run_id = Uuid::now_v7();
        let started = Instant::now();
        let page_size = self.config.page_size.max(1);
        let policy = self.config.cursor_policy;

        let started_from = read_cursor(self.store.as_ref()).await;
        let gate = AdmissionGate::new(self.config.concurrency_limit);
        tracing::info!(
            run_id = %run_id,
            cursor = %started_from,
            full_replay = started_from.is_epoch(),
            page_size,
            concurrency = gate.limit(),
            policy = policy.label(),
            "Starting replication"
        );

        let pending = match self.feed.count_pending(&started_from).await {
            Ok(pending) => Some(pending),
            Err(error) if self.config.count_is_advisory => {
                tracing::warn!(run_id = %run_id, error = %error, "Pending count unavailable, continuing");
                None
            }
            Err(error) => {
                tracing::error!(run_id = %run_id, error = %error, "Pending count failed");
                return Err(error.into());
            }
        };
        tracing::info!(run_id = %run_id, pending = ?pending, "Pending listings");

        let mut report = ReplicationReport {
            run_id,
            started_from: started_from.clone(),
            final_cursor: started_from.clone(),
            pending,
            pages: 0,
            fetched: 0,
            persisted: 0,
            discarded: 0,
            write_failures: 0,
            media_failures: 0,
            stopped_early: false,
            peak_in_flight: 0,
            elapsed_ms: 0,
        };
        let mut cursor = started_from;

        loop {
            let page = match self.feed.fetch_page(&cursor, page_size).await {
                Ok(page) => page,
                Err(error) => {
                    tracing::error!(
                        run_id = %run_id,
                        cursor = %cursor,
                        error = %error,
                        "Page fetch failed, aborting cycle"
                    );
                    return Err(error.into());
                }
            };
            if page.is_empty() {
                break;
            }

            report.pages += 1;
            report.fetched += page.len() as u64;

            let outcomes = self.process_page(&gate, &page).await?;
            for outcome in &outcomes {
                match outcome {
                    RecordOutcome::Persisted { media_failed } => {
                        report.persisted += 1;
                        if *media_failed {
                            report.media_failures += 1;
                        }
                    }
                    RecordOutcome::Discarded => report.discarded += 1,
                    RecordOutcome::WriteFailed => report.write_failures += 1,
                }
            }

            let held_back = outcomes.iter().any(|outcome| !outcome.is_settled());
            let moved = match next_cursor(&page, &outcomes, policy) {
                Some(next) if next != cursor => {
                    cursor = next;
                    self.checkpoint(run_id, &cursor).await;
                    true
                }
                _ => false,
            };

            let processed = report.persisted + report.discarded + report.write_failures;
            match pending {
                Some(total) => tracing::info!(
                    run_id = %run_id,
                    page = report.pages,
                    processed,
                    pending = total,
                    "Processed {processed}/{total}"
                ),
                None => tracing::info!(
                    run_id = %run_id,
                    page = report.pages,
                    processed,
                    "Processed {processed}"
                ),
            }

            if held_back && policy == CursorPolicy::DurablePrefix {
                tracing::warn!(
                    run_id = %run_id,
                    cursor = %cursor,
                    "Write failures in page, stopping until next cycle"
                );
                report.stopped_early = true;
                break;
            }
            if page.len() < page_size {
                break;
            }
            if !moved {
                tracing::error!(
                    run_id = %run_id,
                    cursor = %cursor,
                    page = report.pages,
                    "Full page did not move the cursor, aborting cycle"
                );
                return Err(Error::Feed(FeedError::InvalidPayload(format!(
                    "page of {} rows after {cursor} did not advance the cursor",
                    page.len()
                ))));
            }
        }

        report.final_cursor = cursor;
        report.peak_in_flight = gate.peak();
        report.elapsed_ms = elapsed_ms(started);
        tracing::info!(
            run_id = %run_id,
            pages = report.pages,
            persisted = report.persisted,
            discarded = report.discarded,
            write_failures = report.write_failures,
            media_failures = report.media_failures,
            cursor = %report.final_cursor,
            elapsed_ms = report.elapsed_ms,
            "Replication finished"
        );
        Ok(report)
    }

    /// Run every record of `page` through its own pipeline, at most
    /// `concurrency_limit` at a time. Outcomes come back in page order.
    async fn process_page(
        &self,
        gate: &AdmissionGate,
        page: &[PageEntry],
    ) -> Result<Vec<RecordOutcome>> {
        let mut pipelines = JoinSet::new();
        let mut outcomes = vec![None; page.len()];

        for (index, entry) in page.iter().enumerate() {
            let record = match entry {
                PageEntry::Listing(record) => record,
                PageEntry::Malformed(row) => {
                    tracing::warn!(
                        listing_key = row.listing_key.as_deref().unwrap_or("<missing>"),
                        reason = %row.reason,
                        "Discarding unreadable listing"
                    );
                    outcomes[index] = Some(RecordOutcome::Discarded);
                    continue;
                }
            };
            let admission = gate.admit().await?;
            let feed = Arc::clone(&self.feed);
            let store = Arc::clone(&self.store);
            let record = record.clone();

            pipelines.spawn(async move {
                let _admission = admission;
                let outcome = replicate_record(feed.as_ref(), store.as_ref(), &record).await;
                (index, outcome)
            });
        }

        while let Some(joined) = pipelines.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(error) => tracing::error!(error = %error, "Record pipeline aborted"),
            }
        }

        Ok(outcomes
            .into_iter()
            .map(|outcome| outcome.unwrap_or(RecordOutcome::WriteFailed))
            .collect())
    }

    async fn checkpoint(&self, run_id: Uuid, cursor: &Cursor) {
        match self.store.save_cursor(cursor).await {
            Ok(true) => tracing::debug!(run_id = %run_id, cursor = %cursor, "Checkpoint advanced"),
            Ok(false) => {}
            Err(error) => tracing::warn!(
                run_id = %run_id,
                cursor = %cursor,
                error = %error,
                "Failed to save checkpoint, next cycle will replay"
            ),
        }
    }
}

/// Transform, fetch media for, and persist a single listing.
async fn replicate_record<F, S>(feed: &F, store: &S, record: &UpstreamRecord) -> RecordOutcome
where
    F: ListingFeed,
    S: ListingStore,
{
    let Some(listing) = transform(record) else {
        return RecordOutcome::Discarded;
    };

    let media = match feed.fetch_media(&listing.id).await {
        Ok(items) => Some(resolve_media(&items)),
        Err(error) => {
            tracing::warn!(
                listing_key = %listing.id,
                error = %error,
                "Media fetch failed, keeping existing media"
            );
            None
        }
    };

    if let Err(error) = store.upsert_listing(&listing).await {
        tracing::error!(listing_key = %listing.id, error = %error, "Failed to persist listing");
        return RecordOutcome::WriteFailed;
    }

    let media_write = match &media {
        Some(urls) if urls.is_empty() => store.delete_media(&listing.id).await,
        Some(urls) => store.upsert_media(&listing.id, urls).await,
        None => Ok(()),
    };
    if let Err(error) = media_write {
        tracing::error!(listing_key = %listing.id, error = %error, "Failed to persist media");
        return RecordOutcome::WriteFailed;
    }

    RecordOutcome::Persisted {
        media_failed: media.is_none(),
    }
}

/// Where the cursor may move after a page, if anywhere.
///
/// Upstream's page order is authoritative, so this is the last positioned row
/// of the advanced slice rather than the largest cursor in it.
fn next_cursor(
    page: &[PageEntry],
    outcomes: &[RecordOutcome],
    policy: CursorPolicy,
) -> Option<Cursor> {
    let advanced = match policy {
        CursorPolicy::LastRecord => page,
        CursorPolicy::DurablePrefix => {
            let settled = outcomes
                .iter()
                .take_while(|outcome| outcome.is_settled())
                .count();
            &page[..settled]
        }
    };
    advanced.iter().rev().find_map(PageEntry::cursor)
}
