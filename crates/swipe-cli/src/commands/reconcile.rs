use std::path::Path;
use std::sync::Arc;

use swipe_core::feed::ODataFeedClient;
use swipe_core::sync::{SweepReport, Sweeper};

use crate::commands::common::{load_settings, open_store, print_json};
use crate::error::CliError;

pub async fn run_reconcile(db_path: &Path, as_json: bool) -> Result<(), CliError> {
    let settings = load_settings(db_path)?;

    let store = open_store(&settings.store).await?;
    let feed = Arc::new(ODataFeedClient::new(&settings.feed).map_err(swipe_core::Error::from)?);
    let report = Sweeper::new(feed, Arc::clone(&store), settings.replication.sweep_batch_size)
        .run()
        .await?;
    store.database().sync().await?;

    if as_json {
        return print_json(&report);
    }
    println!("{}", format_sweep_report(&report));
    Ok(())
}

pub fn format_sweep_report(report: &SweepReport) -> String {
    format!(
        "Run {}: upstream active {}, local active {}, deactivated {} ({} ms)",
        report.run_id,
        report.upstream_active,
        report.local_active,
        report.deactivated,
        report.elapsed_ms
    )
}
