// Database layer — SQLite storage for entities, interactions, snapshots,
// notifications and moments.
//
// We use rusqlite with the "bundled" feature so there's no system SQLite
// dependency. The database file lives wherever BANDPULSE_DB_PATH points
// (defaults to ./bandpulse.db).

pub mod models;
pub mod queries;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteDatabase;
pub use traits::Database;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

/// Open (or create) the database and run migrations.
///
/// This is the main entry point, called by `bandpulse init` and by any
/// command that needs database access.
pub fn initialize(db_path: &str) -> Result<Connection> {
    // Create parent directories if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for database: {}", db_path))?;
        }
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    // WAL lets readers proceed while a sweep is writing
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    schema::create_tables(&conn)?;

    Ok(conn)
}

/// Open an existing database (fails if it doesn't exist yet).
///
/// Migrations still run so an older file picks up new indexes.
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        anyhow::bail!(
            "Database not found at {}. Run `bandpulse init` first.",
            db_path
        );
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    schema::create_tables(&conn)?;

    Ok(conn)
}

/// Create the database if needed and wrap it for shared async use.
pub fn initialize_sqlite(db_path: &str) -> Result<Arc<SqliteDatabase>> {
    Ok(Arc::new(SqliteDatabase::new(initialize(db_path)?)))
}

/// Open an existing database and wrap it for shared async use.
pub fn open_sqlite(db_path: &str) -> Result<Arc<SqliteDatabase>> {
    Ok(Arc::new(SqliteDatabase::new(open(db_path)?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_database_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.db");
        let err = open(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("bandpulse init"));
    }

    #[tokio::test]
    async fn test_initialize_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pulse.db");
        let path = path.to_str().unwrap();

        let db = initialize_sqlite(path).unwrap();
        assert_eq!(db.table_count().await.unwrap(), 8);
        drop(db);

        let reopened = open_sqlite(path).unwrap();
        assert_eq!(reopened.table_count().await.unwrap(), 8);
    }
}
