use std::path::Path;
use std::sync::Arc;

use swipe_core::config::{CursorPolicy, ReplicationConfig};
use swipe_core::feed::ODataFeedClient;
use swipe_core::sync::{ReplicationReport, Replicator};

use crate::commands::common::{load_settings, open_store, print_json};
use crate::error::CliError;

/// Command-line overrides on top of the environment settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplicateOverrides {
    pub page_size: Option<usize>,
    pub concurrency: Option<usize>,
    pub cursor_policy: Option<CursorPolicy>,
}

impl ReplicateOverrides {
    pub fn apply(self, config: &mut ReplicationConfig) -> Result<(), CliError> {
        if let Some(page_size) = self.page_size {
            if !(1..=5_000).contains(&page_size) {
                return Err(CliError::OutOfRange("--page-size", 1, 5_000));
            }
            config.page_size = page_size;
        }
        if let Some(concurrency) = self.concurrency {
            if !(1..=256).contains(&concurrency) {
                return Err(CliError::OutOfRange("--concurrency", 1, 256));
            }
            config.concurrency_limit = concurrency;
        }
        if let Some(policy) = self.cursor_policy {
            config.cursor_policy = policy;
        }
        Ok(())
    }
}

pub async fn run_replicate(
    db_path: &Path,
    overrides: ReplicateOverrides,
    as_json: bool,
) -> Result<(), CliError> {
    let mut settings = load_settings(db_path)?;
    overrides.apply(&mut settings.replication)?;

    let store = open_store(&settings.store).await?;
    let feed = Arc::new(ODataFeedClient::new(&settings.feed).map_err(swipe_core::Error::from)?);
    let report = Replicator::new(feed, Arc::clone(&store), settings.replication)
        .run()
        .await?;
    store.database().sync().await?;

    if as_json {
        return print_json(&report);
    }
    for line in format_replication_report(&report) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_replication_report(report: &ReplicationReport) -> Vec<String> {
    let pending = report
        .pending
        .map_or_else(|| "unknown".to_string(), |pending| pending.to_string());
    let mut lines = vec![
        format!("Run {}", report.run_id),
        format!("Cursor: {} -> {}", report.started_from, report.final_cursor),
        format!(
            "Pages: {}  fetched: {}  pending at start: {pending}",
            report.pages, report.fetched
        ),
        format!(
            "Persisted: {}  discarded: {}  write failures: {}  media failures: {}",
            report.persisted, report.discarded, report.write_failures, report.media_failures
        ),
        format!(
            "Peak in flight: {}  elapsed: {} ms",
            report.peak_in_flight, report.elapsed_ms
        ),
    ];
    if report.stopped_early {
        lines.push("Stopped early: a write failed; the next run retries from the cursor.".to_string());
    }
    lines
}
