// Database queries — CRUD operations for all tables.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.

use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

use super::models::{
    parse_db_timestamp, to_db_timestamp, Entity, EntityRef, EntityType, FanMoment, MomentType,
    MomentumState, Notification, OwnerProfile, PulseSnapshot,
};
use crate::signals::interaction::{InteractionCommon, InteractionKind, InteractionRecord};
use crate::signals::range::TimeWindow;

// --- Row conversion helpers ---

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn parse_col<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_error(idx, e))
}

fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_db_timestamp(&raw).ok_or_else(|| conversion_error(idx, format!("bad timestamp '{raw}'")))
}

fn opt_ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(raw) => parse_db_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| conversion_error(idx, format!("bad timestamp '{raw}'"))),
        None => Ok(None),
    }
}

fn entity_cols(row: &Row<'_>, type_idx: usize) -> rusqlite::Result<EntityRef> {
    Ok(EntityRef::new(
        parse_col::<EntityType>(row, type_idx)?,
        row.get(type_idx + 1)?,
    ))
}

// --- Owners and entities ---

/// Save or update an owner.
pub fn upsert_owner(conn: &Connection, owner: &OwnerProfile) -> Result<()> {
    conn.execute(
        "INSERT INTO owners (owner_id, push_opt_in, created_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(owner_id) DO UPDATE SET push_opt_in = ?2, created_at = ?3",
        params![
            owner.owner_id,
            owner.push_opt_in,
            to_db_timestamp(&owner.created_at)
        ],
    )?;
    Ok(())
}

pub fn get_owner(conn: &Connection, owner_id: i64) -> Result<Option<OwnerProfile>> {
    let owner = conn
        .query_row(
            "SELECT owner_id, push_opt_in, created_at FROM owners WHERE owner_id = ?1",
            params![owner_id],
            |row| {
                Ok(OwnerProfile {
                    owner_id: row.get(0)?,
                    push_opt_in: row.get(1)?,
                    created_at: ts_col(row, 2)?,
                })
            },
        )
        .optional()?;
    Ok(owner)
}

/// Save or update an entity.
pub fn upsert_entity(conn: &Connection, entity: &Entity) -> Result<()> {
    conn.execute(
        "INSERT INTO entities (entity_type, entity_id, name, owner_id)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(entity_type, entity_id) DO UPDATE SET name = ?3, owner_id = ?4",
        params![
            entity.entity.entity_type.as_str(),
            entity.entity.entity_id,
            entity.name,
            entity.owner_id,
        ],
    )?;
    Ok(())
}

fn entity_from_row(row: &Row<'_>) -> rusqlite::Result<Entity> {
    Ok(Entity {
        entity: entity_cols(row, 0)?,
        name: row.get(2)?,
        owner_id: row.get(3)?,
    })
}

pub fn get_entity(conn: &Connection, entity: &EntityRef) -> Result<Option<Entity>> {
    let found = conn
        .query_row(
            "SELECT entity_type, entity_id, name, owner_id FROM entities
             WHERE entity_type = ?1 AND entity_id = ?2",
            params![entity.entity_type.as_str(), entity.entity_id],
            entity_from_row,
        )
        .optional()?;
    Ok(found)
}

/// All registered entities, optionally of one type, ordered by type then id.
pub fn list_entities(conn: &Connection, entity_type: Option<EntityType>) -> Result<Vec<Entity>> {
    let mut stmt = conn.prepare(
        "SELECT entity_type, entity_id, name, owner_id FROM entities
         WHERE ?1 IS NULL OR entity_type = ?1
         ORDER BY entity_type, entity_id",
    )?;
    let rows = stmt.query_map(params![entity_type.map(|t| t.as_str())], entity_from_row)?;

    let mut entities = Vec::new();
    for row in rows {
        entities.push(row?);
    }
    Ok(entities)
}

// --- Interactions ---

/// Insert interaction rows in one transaction. Returns the number inserted.
pub fn insert_interactions(conn: &Connection, records: &[InteractionRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    write_interactions(&tx, records)?;
    tx.commit().context("Failed to commit interaction batch")?;
    Ok(records.len())
}

/// Owners, entities and interactions in one transaction: either all of them
/// land or none do.
pub fn import_batch(
    conn: &Connection,
    owners: &[OwnerProfile],
    entities: &[Entity],
    records: &[InteractionRecord],
) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    for owner in owners {
        upsert_owner(&tx, owner)
            .with_context(|| format!("Failed to import owner {}", owner.owner_id))?;
    }
    for entity in entities {
        upsert_entity(&tx, entity).with_context(|| format!("Failed to import {}", entity.entity))?;
    }
    write_interactions(&tx, records).context("Failed to import interactions")?;
    tx.commit().context("Failed to commit import")?;
    Ok(records.len())
}

fn write_interactions(conn: &Connection, records: &[InteractionRecord]) -> Result<()> {
    {
        let mut stmt = conn.prepare(
            "INSERT INTO interactions
                (kind, entity_type, entity_id, occurred_at, city, region, country,
                 device, referrer, platform, target)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;
        for record in records {
            let c = record.common();
            let (platform, target) = match record {
                InteractionRecord::LinkClick { platform, url, .. } => (platform, url),
                InteractionRecord::MediaPlay {
                    provider, media_id, ..
                } => (provider, media_id),
                _ => (&None, &None),
            };
            stmt.execute(params![
                record.kind().as_str(),
                c.entity_type.as_str(),
                c.entity_id,
                to_db_timestamp(&c.occurred_at),
                c.city,
                c.region,
                c.country,
                c.device,
                c.referrer,
                platform,
                target,
            ])?;
        }
    }
    Ok(())
}

fn interaction_from_row(row: &Row<'_>) -> rusqlite::Result<InteractionRecord> {
    let kind_raw: String = row.get(0)?;
    let kind = InteractionKind::parse(&kind_raw)
        .ok_or_else(|| conversion_error(0, format!("unknown interaction kind '{kind_raw}'")))?;
    let entity = entity_cols(row, 1)?;

    let common = InteractionCommon {
        entity_type: entity.entity_type,
        entity_id: entity.entity_id,
        occurred_at: ts_col(row, 3)?,
        city: row.get(4)?,
        region: row.get(5)?,
        country: row.get(6)?,
        device: row.get(7)?,
        referrer: row.get(8)?,
    };
    let platform: Option<String> = row.get(9)?;
    let target: Option<String> = row.get(10)?;

    Ok(match kind {
        InteractionKind::PageView => InteractionRecord::PageView { common },
        InteractionKind::LinkClick => InteractionRecord::LinkClick {
            common,
            platform,
            url: target,
        },
        InteractionKind::MediaPlay => InteractionRecord::MediaPlay {
            common,
            provider: platform,
            media_id: target,
        },
        InteractionKind::Scan => InteractionRecord::Scan { common },
    })
}

/// Interactions for an entity inside a window, oldest first. When more than
/// `limit` rows match, the newest `limit` are kept.
pub fn fetch_interactions(
    conn: &Connection,
    entity: &EntityRef,
    window: &TimeWindow,
    limit: usize,
) -> Result<Vec<InteractionRecord>> {
    let mut stmt = conn.prepare(
        "SELECT kind, entity_type, entity_id, occurred_at, city, region, country,
                device, referrer, platform, target
         FROM interactions
         WHERE entity_type = ?1 AND entity_id = ?2
           AND occurred_at >= ?3 AND occurred_at < ?4
         ORDER BY occurred_at DESC, id DESC
         LIMIT ?5",
    )?;
    let rows = stmt.query_map(
        params![
            entity.entity_type.as_str(),
            entity.entity_id,
            to_db_timestamp(&window.start),
            to_db_timestamp(&window.end),
            limit as i64,
        ],
        interaction_from_row,
    )?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    records.reverse();
    Ok(records)
}

pub fn count_interactions(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM interactions", [], |row| row.get(0))?;
    Ok(count)
}

// --- Rate state ---

/// Get a rate-state value by key (e.g., "auto_moment:band:42").
pub fn get_rate_state(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT value FROM rate_state WHERE key = ?1")?;
    let result = stmt.query_row(params![key], |row| row.get(0)).optional()?;
    Ok(result)
}

/// Set a rate-state value (upsert).
pub fn set_rate_state(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO rate_state (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

/// Atomically bump a numeric counter and return its new value.
pub fn increment_rate_counter(conn: &Connection, key: &str) -> Result<i64> {
    let value = conn.query_row(
        "INSERT INTO rate_state (key, value, updated_at)
         VALUES (?1, '1', datetime('now'))
         ON CONFLICT(key) DO UPDATE SET
            value = CAST(CAST(value AS INTEGER) + 1 AS TEXT),
            updated_at = datetime('now')
         RETURNING CAST(value AS INTEGER)",
        params![key],
        |row| row.get(0),
    )?;
    Ok(value)
}

// --- Pulse snapshots ---

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<PulseSnapshot> {
    Ok(PulseSnapshot {
        entity: entity_cols(row, 0)?,
        range_key: row.get(2)?,
        pulse_score: row.get(3)?,
        momentum_state: parse_col::<MomentumState>(row, 4)?,
        total_activity: row.get(5)?,
        growth_pct: row.get(6)?,
        last_momentum_change_at: opt_ts_col(row, 7)?,
        last_surge_push_at: opt_ts_col(row, 8)?,
        surge_push_sent: row.get(9)?,
        updated_at: ts_col(row, 10)?,
    })
}

const SNAPSHOT_COLUMNS: &str = "entity_type, entity_id, range_key, pulse_score, momentum_state,
    total_activity, growth_pct, last_momentum_change_at, last_surge_push_at,
    surge_push_sent, updated_at";

pub fn get_snapshot(
    conn: &Connection,
    entity: &EntityRef,
    range_key: &str,
) -> Result<Option<PulseSnapshot>> {
    let sql = format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM pulse_snapshots
         WHERE entity_type = ?1 AND entity_id = ?2 AND range_key = ?3"
    );
    let snapshot = conn
        .query_row(
            &sql,
            params![entity.entity_type.as_str(), entity.entity_id, range_key],
            snapshot_from_row,
        )
        .optional()?;
    Ok(snapshot)
}

/// Save or update a snapshot. One row per (entity, range).
pub fn upsert_snapshot(conn: &Connection, s: &PulseSnapshot) -> Result<()> {
    conn.execute(
        "INSERT INTO pulse_snapshots (entity_type, entity_id, range_key, pulse_score,
            momentum_state, total_activity, growth_pct, last_momentum_change_at,
            last_surge_push_at, surge_push_sent, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(entity_type, entity_id, range_key) DO UPDATE SET
            pulse_score = ?4,
            momentum_state = ?5,
            total_activity = ?6,
            growth_pct = ?7,
            last_momentum_change_at = ?8,
            last_surge_push_at = ?9,
            surge_push_sent = ?10,
            updated_at = ?11",
        params![
            s.entity.entity_type.as_str(),
            s.entity.entity_id,
            s.range_key,
            s.pulse_score,
            s.momentum_state.as_str(),
            s.total_activity,
            s.growth_pct,
            s.last_momentum_change_at.as_ref().map(to_db_timestamp),
            s.last_surge_push_at.as_ref().map(to_db_timestamp),
            s.surge_push_sent,
            to_db_timestamp(&s.updated_at),
        ],
    )?;
    Ok(())
}

/// Write the post-push snapshot and queue the notification atomically.
///
/// Compare-and-set on `surge_push_sent`: if a concurrent evaluation already
/// marked this surge as pushed, only the score fields are refreshed and no
/// notification is inserted. Returns the new notification id when one was
/// created.
pub fn commit_surge_push(
    conn: &Connection,
    snapshot: &PulseSnapshot,
    notification: &Notification,
) -> Result<Option<i64>> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let already_sent: Option<bool> = tx
        .query_row(
            "SELECT surge_push_sent FROM pulse_snapshots
             WHERE entity_type = ?1 AND entity_id = ?2 AND range_key = ?3",
            params![
                snapshot.entity.entity_type.as_str(),
                snapshot.entity.entity_id,
                snapshot.range_key
            ],
            |row| row.get(0),
        )
        .optional()?;

    if already_sent == Some(true) {
        tx.execute(
            "UPDATE pulse_snapshots SET
                pulse_score = ?4, momentum_state = ?5, total_activity = ?6,
                growth_pct = ?7, updated_at = ?8
             WHERE entity_type = ?1 AND entity_id = ?2 AND range_key = ?3",
            params![
                snapshot.entity.entity_type.as_str(),
                snapshot.entity.entity_id,
                snapshot.range_key,
                snapshot.pulse_score,
                snapshot.momentum_state.as_str(),
                snapshot.total_activity,
                snapshot.growth_pct,
                to_db_timestamp(&snapshot.updated_at),
            ],
        )?;
        tx.commit()?;
        return Ok(None);
    }

    upsert_snapshot(&tx, snapshot)?;
    tx.execute(
        "INSERT INTO notifications
            (owner_id, entity_type, entity_id, kind, title, body, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            notification.owner_id,
            notification.entity.entity_type.as_str(),
            notification.entity.entity_id,
            notification.kind,
            notification.title,
            notification.body,
            to_db_timestamp(&notification.created_at),
        ],
    )?;
    let id = tx.last_insert_rowid();
    tx.commit().context("Failed to commit surge push")?;
    Ok(Some(id))
}

/// Snapshot counts per momentum state for one range.
pub fn count_snapshots_by_state(conn: &Connection, range_key: &str) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT momentum_state, COUNT(*) FROM pulse_snapshots
         WHERE range_key = ?1
         GROUP BY momentum_state
         ORDER BY momentum_state",
    )?;
    let rows = stmt.query_map(params![range_key], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut counts = Vec::new();
    for row in rows {
        counts.push(row?);
    }
    Ok(counts)
}

// --- Notifications ---

/// Most recent notifications first.
pub fn get_recent_notifications(conn: &Connection, limit: u32) -> Result<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT id, owner_id, entity_type, entity_id, kind, title, body, created_at
         FROM notifications
         ORDER BY created_at DESC, id DESC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(Notification {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            entity: entity_cols(row, 2)?,
            kind: row.get(4)?,
            title: row.get(5)?,
            body: row.get(6)?,
            created_at: ts_col(row, 7)?,
        })
    })?;

    let mut notifications = Vec::new();
    for row in rows {
        notifications.push(row?);
    }
    Ok(notifications)
}

// --- Fan moments ---

/// Record a new moment and return its ID.
pub fn insert_moment(conn: &Connection, moment: &FanMoment) -> Result<i64> {
    let context_json = serde_json::to_string(&moment.context)?;
    conn.execute(
        "INSERT INTO fan_moments (entity_type, entity_id, visitor_id, action_type,
            moment_type, share_copy, context, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            moment.entity.entity_type.as_str(),
            moment.entity.entity_id,
            moment.visitor_id,
            moment.action_type,
            moment.moment_type.as_str(),
            moment.share_copy,
            context_json,
            to_db_timestamp(&moment.created_at),
            to_db_timestamp(&moment.expires_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

const MOMENT_COLUMNS: &str = "id, entity_type, entity_id, visitor_id, action_type, moment_type,
    share_copy, context, created_at, expires_at";

fn moment_from_row(row: &Row<'_>) -> rusqlite::Result<FanMoment> {
    let context_json: String = row.get(7)?;
    Ok(FanMoment {
        id: row.get(0)?,
        entity: entity_cols(row, 1)?,
        visitor_id: row.get(3)?,
        action_type: row.get(4)?,
        moment_type: parse_col::<MomentType>(row, 5)?,
        share_copy: row.get(6)?,
        context: serde_json::from_str(&context_json)
            .map_err(|e| conversion_error(7, format!("bad moment context: {e}")))?,
        created_at: ts_col(row, 8)?,
        expires_at: ts_col(row, 9)?,
    })
}

/// Newest unexpired moment for an entity with the given action type.
pub fn get_active_moment(
    conn: &Connection,
    entity: &EntityRef,
    action_type: &str,
    now: &DateTime<Utc>,
) -> Result<Option<FanMoment>> {
    let sql = format!(
        "SELECT {MOMENT_COLUMNS} FROM fan_moments
         WHERE entity_type = ?1 AND entity_id = ?2 AND action_type = ?3
           AND visitor_id IS NULL AND expires_at > ?4
         ORDER BY created_at DESC, id DESC
         LIMIT 1"
    );
    let moment = conn
        .query_row(
            &sql,
            params![
                entity.entity_type.as_str(),
                entity.entity_id,
                action_type,
                to_db_timestamp(now)
            ],
            moment_from_row,
        )
        .optional()?;
    Ok(moment)
}

/// Newest unexpired moment a visitor created for an entity.
pub fn get_active_visitor_moment(
    conn: &Connection,
    entity: &EntityRef,
    visitor_id: &str,
    now: &DateTime<Utc>,
) -> Result<Option<FanMoment>> {
    let sql = format!(
        "SELECT {MOMENT_COLUMNS} FROM fan_moments
         WHERE entity_type = ?1 AND entity_id = ?2 AND visitor_id = ?3
           AND expires_at > ?4
         ORDER BY created_at DESC, id DESC
         LIMIT 1"
    );
    let moment = conn
        .query_row(
            &sql,
            params![
                entity.entity_type.as_str(),
                entity.entity_id,
                visitor_id,
                to_db_timestamp(now)
            ],
            moment_from_row,
        )
        .optional()?;
    Ok(moment)
}

/// All unexpired moments, optionally for one entity, newest first.
pub fn get_active_moments(
    conn: &Connection,
    entity: Option<&EntityRef>,
    now: &DateTime<Utc>,
) -> Result<Vec<FanMoment>> {
    let sql = format!(
        "SELECT {MOMENT_COLUMNS} FROM fan_moments
         WHERE expires_at > ?1
           AND (?2 IS NULL OR (entity_type = ?2 AND entity_id = ?3))
         ORDER BY created_at DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![
            to_db_timestamp(now),
            entity.map(|e| e.entity_type.as_str()),
            entity.map(|e| e.entity_id),
        ],
        moment_from_row,
    )?;

    let mut moments = Vec::new();
    for row in rows {
        moments.push(row?);
    }
    Ok(moments)
}

/// Delete expired moments. Returns how many were removed.
pub fn prune_expired_moments(conn: &Connection, now: &DateTime<Utc>) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM fan_moments WHERE expires_at <= ?1",
        params![to_db_timestamp(now)],
    )?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::create_tables;
    use chrono::{Duration, TimeZone};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 20, 0, 0).unwrap()
    }

    fn snapshot(state: MomentumState, sent: bool) -> PulseSnapshot {
        PulseSnapshot {
            entity: EntityRef::band(1),
            range_key: "24h".to_string(),
            pulse_score: 42.5,
            momentum_state: state,
            total_activity: 30,
            growth_pct: 200.0,
            last_momentum_change_at: Some(now()),
            last_surge_push_at: None,
            surge_push_sent: sent,
            updated_at: now(),
        }
    }

    fn notification() -> Notification {
        Notification {
            id: 0,
            owner_id: 9,
            entity: EntityRef::band(1),
            kind: "surge".to_string(),
            title: "The Lanterns is surging".to_string(),
            body: "Activity is up 200%".to_string(),
            created_at: now(),
        }
    }

    #[test]
    fn test_rate_state_roundtrip() {
        let conn = test_conn();
        assert_eq!(get_rate_state(&conn, "k").unwrap(), None);
        set_rate_state(&conn, "k", "v1").unwrap();
        set_rate_state(&conn, "k", "v2").unwrap();
        assert_eq!(get_rate_state(&conn, "k").unwrap(), Some("v2".to_string()));
    }

    #[test]
    fn test_increment_rate_counter() {
        let conn = test_conn();
        assert_eq!(increment_rate_counter(&conn, "c").unwrap(), 1);
        assert_eq!(increment_rate_counter(&conn, "c").unwrap(), 2);
        assert_eq!(increment_rate_counter(&conn, "other").unwrap(), 1);
    }

    #[test]
    fn test_snapshot_upsert_keeps_one_row() {
        let conn = test_conn();
        upsert_snapshot(&conn, &snapshot(MomentumState::Warming, false)).unwrap();
        upsert_snapshot(&conn, &snapshot(MomentumState::Surging, true)).unwrap();
        let s = get_snapshot(&conn, &EntityRef::band(1), "24h").unwrap().unwrap();
        assert_eq!(s.momentum_state, MomentumState::Surging);
        assert!(s.surge_push_sent);
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM pulse_snapshots", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_commit_surge_push_is_compare_and_set() {
        let conn = test_conn();
        let first = commit_surge_push(&conn, &snapshot(MomentumState::Surging, true), &notification())
            .unwrap();
        assert!(first.is_some());
        let second =
            commit_surge_push(&conn, &snapshot(MomentumState::Surging, true), &notification())
                .unwrap();
        assert!(second.is_none());
        assert_eq!(get_recent_notifications(&conn, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_interactions_roundtrip_and_window() {
        let conn = test_conn();
        let band = EntityRef::band(1);
        let records = vec![
            InteractionRecord::link_click(
                InteractionCommon::new(band, now() - Duration::minutes(10)).with_city("Austin"),
                "spotify",
                Some("https://open.spotify.com/x"),
            ),
            InteractionRecord::media_play(
                InteractionCommon::new(band, now() - Duration::minutes(5)),
                "youtube",
                Some("abc"),
            ),
            InteractionRecord::page_view(InteractionCommon::new(band, now())),
            InteractionRecord::page_view(InteractionCommon::new(
                EntityRef::band(2),
                now() - Duration::minutes(1),
            )),
        ];
        assert_eq!(insert_interactions(&conn, &records).unwrap(), 4);

        let window = TimeWindow::ending_at(now(), Duration::hours(1));
        let fetched = fetch_interactions(&conn, &band, &window, 100).unwrap();
        assert_eq!(fetched, records[..2].to_vec());

        // A truncated fetch keeps the most recent rows
        let limited = fetch_interactions(&conn, &band, &window, 1).unwrap();
        assert_eq!(limited, records[1..2].to_vec());
        assert_eq!(count_interactions(&conn).unwrap(), 4);
    }

    #[test]
    fn test_active_moment_lookup_respects_expiry() {
        let conn = test_conn();
        let moment = FanMoment {
            id: 0,
            entity: EntityRef::band(1),
            visitor_id: None,
            action_type: "AUTO".to_string(),
            moment_type: MomentType::CityHeat,
            share_copy: "Austin is lighting up".to_string(),
            context: serde_json::json!({"city": "Austin"}),
            created_at: now(),
            expires_at: now() + Duration::hours(24),
        };
        let id = insert_moment(&conn, &moment).unwrap();
        let active = get_active_moment(&conn, &EntityRef::band(1), "AUTO", &now())
            .unwrap()
            .unwrap();
        assert_eq!(active.id, id);
        assert_eq!(active.context["city"], "Austin");

        let later = now() + Duration::hours(25);
        assert!(get_active_moment(&conn, &EntityRef::band(1), "AUTO", &later)
            .unwrap()
            .is_none());
        assert_eq!(prune_expired_moments(&conn, &later).unwrap(), 1);
        assert!(get_active_moments(&conn, None, &now()).unwrap().is_empty());
    }

    #[test]
    fn test_import_batch_rolls_back_on_failure() {
        let conn = test_conn();
        let owner = OwnerProfile {
            owner_id: 9,
            push_opt_in: true,
            created_at: now(),
        };
        let band = Entity {
            entity: EntityRef::band(1),
            name: "The Lanterns".to_string(),
            owner_id: Some(9),
        };
        let views = vec![InteractionRecord::page_view(InteractionCommon::new(
            EntityRef::band(1),
            now(),
        ))];
        conn.execute_batch("DROP TABLE interactions").unwrap();

        assert!(import_batch(&conn, &[owner], &[band], &views).is_err());
        assert!(get_owner(&conn, 9).unwrap().is_none());
        assert!(get_entity(&conn, &EntityRef::band(1)).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_moment_context_is_an_error() {
        let conn = test_conn();
        let moment = FanMoment {
            id: 0,
            entity: EntityRef::band(1),
            visitor_id: None,
            action_type: "AUTO".to_string(),
            moment_type: MomentType::PulseSurge,
            share_copy: "The Lanterns is surging".to_string(),
            context: serde_json::json!({"window_count": 12}),
            created_at: now(),
            expires_at: now() + Duration::hours(24),
        };
        let id = insert_moment(&conn, &moment).unwrap();
        conn.execute(
            "UPDATE fan_moments SET context = '{not json' WHERE id = ?1",
            params![id],
        )
        .unwrap();

        let err = get_active_moment(&conn, &EntityRef::band(1), "AUTO", &now()).unwrap_err();
        assert!(format!("{err:#}").contains("bad moment context"), "{err:#}");
    }

    #[test]
    fn test_list_entities_filters_by_type() {
        let conn = test_conn();
        for (t, id) in [(EntityType::Band, 1), (EntityType::Qr, 5), (EntityType::Band, 2)] {
            upsert_entity(
                &conn,
                &Entity {
                    entity: EntityRef::new(t, id),
                    name: format!("{t} {id}"),
                    owner_id: None,
                },
            )
            .unwrap();
        }
        assert_eq!(list_entities(&conn, None).unwrap().len(), 3);
        let bands = list_entities(&conn, Some(EntityType::Band)).unwrap();
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[0].entity.entity_id, 1);
    }
}
