//! Database connection management

use crate::config::{RemoteReplica, StoreConfig};
use crate::error::Result;
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;

use super::schema;

/// Database wrapper for libSQL connections
pub struct Database {
    db: LibSqlDatabase,
    conn: Connection,
    remote: Option<RemoteReplica>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Database")
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Open whichever database `config` describes.
    pub async fn open_with(config: &StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        match &config.remote {
            Some(remote) => {
                tracing::info!(url = %remote.url, "Opening listings store as Turso replica");
                Self::open_with_sync(&config.path, remote.clone()).await
            }
            None => {
                tracing::info!(path = %config.path.display(), "Opening local listings store");
                Self::open(&config.path).await
            }
        }
    }

    /// Open a local-only database at the given path, creating it if it doesn't exist
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        let conn = db.connect()?;

        let database = Self {
            db,
            conn,
            remote: None,
        };
        database.configure().await?;
        schema::ensure(&database.conn).await?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        let conn = db.connect()?;

        let database = Self {
            db,
            conn,
            remote: None,
        };
        database.configure().await?;
        schema::ensure(&database.conn).await?;
        Ok(database)
    }

    /// Open a local replica of a remote Turso database.
    ///
    /// Writes go to the remote; reads are served from the local file after
    /// each sync.
    pub async fn open_with_sync(local_path: impl AsRef<Path>, remote: RemoteReplica) -> Result<Self> {
        let path_str = local_path.as_ref().to_string_lossy().to_string();

        if remote.url.trim().is_empty() || remote.auth_token.trim().is_empty() {
            return Err(crate::error::Error::InvalidInput(
                "Remote replica URL and auth token are required".into(),
            ));
        }

        let db = Builder::new_remote_replica(
            &path_str,
            remote.url.clone(),
            remote.auth_token.clone(),
        )
        .build()
        .await?;
        let conn = db.connect()?;

        let database = Self {
            db,
            conn,
            remote: Some(remote),
        };

        // Pull the remote schema before ensuring it locally
        tracing::debug!("Performing initial sync...");
        database.sync().await?;

        database.configure().await?;
        schema::ensure(&database.conn).await?;

        Ok(database)
    }

    async fn configure(&self) -> Result<()> {
        // Remote replicas reject some pragmas
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA busy_timeout = 5000;", ())
            .await
            .ok();
        Ok(())
    }

    /// Sync with the remote database (if configured)
    pub async fn sync(&self) -> Result<()> {
        if self.remote.is_some() {
            self.db.sync().await?;
            tracing::debug!("Database synced with remote");
        }
        Ok(())
    }

    pub const fn is_sync_enabled(&self) -> bool {
        self.remote.is_some()
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}
