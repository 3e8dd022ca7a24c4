// Database schema — tables for owners, entities, interactions, snapshots,
// the notification outbox, moments and rate state.
//
// Version 1 is the base layout below. Later changes are numbered migrations
// recorded in `schema_version`, so reopening an old file only applies what
// it is missing.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Bring a connection up to the current schema. Runs on every open.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Tracks schema version for future migrations
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Users who own bands / events / QR codes and receive pushes
        CREATE TABLE IF NOT EXISTS owners (
            owner_id INTEGER PRIMARY KEY,
            push_opt_in INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL            -- RFC 3339, millisecond precision
        );

        -- Measured entities
        CREATE TABLE IF NOT EXISTS entities (
            entity_type TEXT NOT NULL,          -- band / event / qr
            entity_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            owner_id INTEGER REFERENCES owners(owner_id),
            PRIMARY KEY (entity_type, entity_id)
        );

        -- Raw interaction rows (immutable once written)
        CREATE TABLE IF NOT EXISTS interactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,                 -- page_view / link_click / media_play / scan
            entity_type TEXT NOT NULL,
            entity_id INTEGER NOT NULL,
            occurred_at TEXT NOT NULL,
            city TEXT,
            region TEXT,
            country TEXT,
            device TEXT,
            referrer TEXT,
            platform TEXT,                      -- link platform or media provider
            target TEXT                         -- link URL or media id
        );

        -- Last computed pulse per entity and range
        CREATE TABLE IF NOT EXISTS pulse_snapshots (
            entity_type TEXT NOT NULL,
            entity_id INTEGER NOT NULL,
            range_key TEXT NOT NULL,            -- 24h / 7d / 30d
            pulse_score REAL NOT NULL,
            momentum_state TEXT NOT NULL,
            total_activity INTEGER NOT NULL,
            growth_pct REAL NOT NULL,
            last_momentum_change_at TEXT,
            last_surge_push_at TEXT,
            surge_push_sent INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (entity_type, entity_id, range_key)
        );

        -- Outbox read by the notification subsystem
        CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id INTEGER NOT NULL,
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        -- Shareable moments
        CREATE TABLE IF NOT EXISTS fan_moments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_type TEXT NOT NULL,
            entity_id INTEGER NOT NULL,
            visitor_id TEXT,                    -- set for fan-initiated moments
            action_type TEXT NOT NULL,          -- AUTO / RECAP / fan action
            moment_type TEXT NOT NULL,
            share_copy TEXT NOT NULL,
            context TEXT NOT NULL,              -- JSON MomentContext
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );

        -- Rate-limit state and other small key/value facts
        CREATE TABLE IF NOT EXISTS rate_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Range scans by entity and time
        CREATE INDEX IF NOT EXISTS idx_interactions_entity_time
            ON interactions(entity_type, entity_id, occurred_at);

        -- Active-moment lookups
        CREATE INDEX IF NOT EXISTS idx_moments_entity_expiry
            ON fan_moments(entity_type, entity_id, expires_at);
        ",
    )
    .context("Failed to create database tables")?;

    // Base layout is version 1
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    // Migration v2: index snapshots by state so status and sweeps can list
    // surging entities without a table scan.
    run_migration(conn, 2, |c| {
        c.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_snapshots_state
                ON pulse_snapshots(momentum_state, range_key);",
        )
    })?;

    // Migration v3: per-owner notification history.
    run_migration(conn, 3, |c| {
        c.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_notifications_owner
                ON notifications(owner_id, created_at);",
        )
    })?;

    Ok(())
}

/// Apply migration `version` unless `schema_version` already lists it.
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// User tables in the file, printed by `bandpulse init`.
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        // Second call is a no-op
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }

    #[test]
    fn test_table_count() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        let count = table_count(&conn).unwrap();
        // schema_version, owners, entities, interactions, pulse_snapshots,
        // notifications, fan_moments, rate_state = 8 tables
        assert_eq!(count, 8i64);
    }

    #[test]
    fn test_snapshot_key_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        let insert = "INSERT INTO pulse_snapshots
            (entity_type, entity_id, range_key, pulse_score, momentum_state,
             total_activity, growth_pct, updated_at)
            VALUES ('band', 1, '24h', 0, 'steady', 0, 0, '2026-05-01T00:00:00.000Z')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        // Run create_tables three times; each migration should only run once
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();

        let versions: Vec<i64> = conn
            .prepare("SELECT version FROM schema_version ORDER BY version")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }
}
