//! Table definitions for the listings store

use crate::error::Result;
use libsql::Connection;

/// Create any missing tables and indexes.
///
/// Every statement is idempotent, so this runs on each open.
pub async fn ensure(conn: &Connection) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        "CREATE TABLE IF NOT EXISTS properties (
            mls_number TEXT PRIMARY KEY,
            address TEXT,
            city TEXT,
            province TEXT,
            postal_code TEXT,
            price REAL NOT NULL,
            bedrooms INTEGER,
            bathrooms INTEGER,
            property_type TEXT NOT NULL,
            last_timestamp TEXT NOT NULL,
            last_key TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        )",
        "CREATE INDEX IF NOT EXISTS idx_properties_active ON properties(is_active)",
        "CREATE INDEX IF NOT EXISTS idx_properties_cursor ON properties(last_timestamp DESC, last_key DESC)",
        "CREATE INDEX IF NOT EXISTS idx_properties_type ON properties(property_type)",
        "CREATE TABLE IF NOT EXISTS media (
            mls_number TEXT PRIMARY KEY,
            image_urls TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS replication_checkpoint (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            last_timestamp TEXT NOT NULL,
            last_key TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::debug!("Listings schema ensured");
    Ok(())
}
