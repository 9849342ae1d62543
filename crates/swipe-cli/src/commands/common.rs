use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use swipe_core::config::{optional_trimmed, Settings, StoreConfig};
use swipe_core::db::{Database, LibSqlListingStore};

use crate::error::CliError;

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    resolve_db_path_with(cli_db_path, |name| env::var(name).ok())
}

pub fn resolve_db_path_with(
    cli_db_path: Option<PathBuf>,
    lookup: impl Fn(&str) -> Option<String>,
) -> PathBuf {
    cli_db_path
        .or_else(|| optional_trimmed(lookup, "SWIPE_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir().map_or_else(
        || PathBuf::from("swipe.db"),
        |dir| dir.join("swipe").join("swipe.db"),
    )
}

/// Full pipeline settings from the environment, stored at `db_path`.
pub fn load_settings(db_path: &Path) -> Result<Settings, CliError> {
    let values: HashMap<String, String> = env::vars().collect();
    let mut settings = Settings::from_lookup(|name| values.get(name).cloned())?;
    settings.store.path = db_path.to_path_buf();
    Ok(settings)
}

/// Store settings only; does not require feed credentials.
pub fn load_store_config(db_path: &Path) -> Result<StoreConfig, CliError> {
    let values: HashMap<String, String> = env::vars().collect();
    let mut store = StoreConfig::from_lookup(|name| values.get(name).cloned())?;
    store.path = db_path.to_path_buf();
    Ok(store)
}

pub async fn open_store(config: &StoreConfig) -> Result<Arc<LibSqlListingStore>, CliError> {
    let database = Database::open_with(config).await?;
    database.sync().await?;
    Ok(Arc::new(LibSqlListingStore::new(Arc::new(database))))
}

pub fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
