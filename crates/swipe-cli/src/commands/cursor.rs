use std::path::Path;

use serde::Serialize;
use swipe_core::db::{CursorStore, LibSqlListingStore, ListingCounts};
use swipe_core::sync::read_cursor;
use swipe_core::Cursor;

use crate::commands::common::{load_store_config, open_store, print_json};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct CursorStatus {
    pub cursor: Cursor,
    pub persisted: bool,
    pub listings: ListingCounts,
}

pub async fn run_cursor(db_path: &Path, as_json: bool) -> Result<(), CliError> {
    let store = open_store(&load_store_config(db_path)?).await?;
    let status = cursor_status(&store).await?;

    if as_json {
        return print_json(&status);
    }
    for line in format_cursor_status(&status) {
        println!("{line}");
    }
    Ok(())
}

pub async fn cursor_status(store: &LibSqlListingStore) -> Result<CursorStatus, CliError> {
    let persisted = store.load_cursor().await?.is_some();
    Ok(CursorStatus {
        cursor: read_cursor(store).await,
        persisted,
        listings: store.listing_counts().await?,
    })
}

pub fn format_cursor_status(status: &CursorStatus) -> Vec<String> {
    let cursor = if status.persisted {
        status.cursor.to_string()
    } else {
        format!("{} (nothing replicated yet)", status.cursor)
    };
    vec![
        format!("Cursor: {cursor}"),
        format!(
            "Listings: {} active, {} inactive",
            status.listings.active, status.listings.inactive
        ),
    ]
}
