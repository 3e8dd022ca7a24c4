// SqliteDatabase — rusqlite backend implementing the Database trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Send.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// The lock is never held across .await points.
//
// The same struct also serves as the interaction source for the engine, so a
// single database file holds both the raw interactions and the derived state.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{
    Entity, EntityRef, EntityType, FanMoment, Notification, OwnerProfile, PulseSnapshot,
};
use super::queries;
use super::traits::Database;
use crate::signals::interaction::InteractionRecord;
use crate::signals::range::TimeWindow;
use crate::signals::traits::InteractionSource;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Fresh in-memory database with the schema applied.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::create_tables(&conn)?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn upsert_owner(&self, owner: &OwnerProfile) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::upsert_owner(&conn, owner)
    }

    async fn get_owner(&self, owner_id: i64) -> Result<Option<OwnerProfile>> {
        let conn = self.conn.lock().await;
        queries::get_owner(&conn, owner_id)
    }

    async fn upsert_entity(&self, entity: &Entity) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::upsert_entity(&conn, entity)
    }

    async fn get_entity(&self, entity: &EntityRef) -> Result<Option<Entity>> {
        let conn = self.conn.lock().await;
        queries::get_entity(&conn, entity)
    }

    async fn list_entities(&self, entity_type: Option<EntityType>) -> Result<Vec<Entity>> {
        let conn = self.conn.lock().await;
        queries::list_entities(&conn, entity_type)
    }

    async fn insert_interactions(&self, records: &[InteractionRecord]) -> Result<usize> {
        let conn = self.conn.lock().await;
        queries::insert_interactions(&conn, records)
    }

    async fn import_batch(
        &self,
        owners: &[OwnerProfile],
        entities: &[Entity],
        records: &[InteractionRecord],
    ) -> Result<usize> {
        let conn = self.conn.lock().await;
        queries::import_batch(&conn, owners, entities, records)
    }

    async fn count_interactions(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        queries::count_interactions(&conn)
    }

    async fn get_rate_state(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        queries::get_rate_state(&conn, key)
    }

    async fn set_rate_state(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::set_rate_state(&conn, key, value)
    }

    async fn increment_rate_counter(&self, key: &str) -> Result<i64> {
        let conn = self.conn.lock().await;
        queries::increment_rate_counter(&conn, key)
    }

    async fn get_snapshot(
        &self,
        entity: &EntityRef,
        range_key: &str,
    ) -> Result<Option<PulseSnapshot>> {
        let conn = self.conn.lock().await;
        queries::get_snapshot(&conn, entity, range_key)
    }

    async fn upsert_snapshot(&self, snapshot: &PulseSnapshot) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::upsert_snapshot(&conn, snapshot)
    }

    async fn commit_surge_push(
        &self,
        snapshot: &PulseSnapshot,
        notification: &Notification,
    ) -> Result<Option<i64>> {
        let conn = self.conn.lock().await;
        queries::commit_surge_push(&conn, snapshot, notification)
    }

    async fn count_snapshots_by_state(&self, range_key: &str) -> Result<Vec<(String, i64)>> {
        let conn = self.conn.lock().await;
        queries::count_snapshots_by_state(&conn, range_key)
    }

    async fn get_recent_notifications(&self, limit: u32) -> Result<Vec<Notification>> {
        let conn = self.conn.lock().await;
        queries::get_recent_notifications(&conn, limit)
    }

    async fn insert_moment(&self, moment: &FanMoment) -> Result<i64> {
        let conn = self.conn.lock().await;
        queries::insert_moment(&conn, moment)
    }

    async fn get_active_moment(
        &self,
        entity: &EntityRef,
        action_type: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<FanMoment>> {
        let conn = self.conn.lock().await;
        queries::get_active_moment(&conn, entity, action_type, &now)
    }

    async fn get_active_visitor_moment(
        &self,
        entity: &EntityRef,
        visitor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<FanMoment>> {
        let conn = self.conn.lock().await;
        queries::get_active_visitor_moment(&conn, entity, visitor_id, &now)
    }

    async fn get_active_moments(
        &self,
        entity: Option<&EntityRef>,
        now: DateTime<Utc>,
    ) -> Result<Vec<FanMoment>> {
        let conn = self.conn.lock().await;
        queries::get_active_moments(&conn, entity, &now)
    }

    async fn prune_expired_moments(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock().await;
        queries::prune_expired_moments(&conn, &now)
    }
}

#[async_trait]
impl InteractionSource for SqliteDatabase {
    async fn fetch_interactions(
        &self,
        entity: &EntityRef,
        window: &TimeWindow,
        limit: usize,
    ) -> Result<Vec<InteractionRecord>> {
        let conn = self.conn.lock().await;
        queries::fetch_interactions(&conn, entity, window, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::interaction::InteractionCommon;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 20, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_trait_table_count() {
        let db = SqliteDatabase::in_memory().unwrap();
        assert_eq!(db.table_count().await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_trait_rate_state_roundtrip() {
        let db = SqliteDatabase::in_memory().unwrap();
        assert_eq!(db.get_rate_state("auto_moment:band:1").await.unwrap(), None);
        db.set_rate_state("auto_moment:band:1", "2026-05-01T20:00:00.000Z")
            .await
            .unwrap();
        assert_eq!(
            db.get_rate_state("auto_moment:band:1").await.unwrap(),
            Some("2026-05-01T20:00:00.000Z".to_string())
        );
    }

    #[tokio::test]
    async fn test_trait_entity_and_owner() {
        let db = SqliteDatabase::in_memory().unwrap();
        let owner = OwnerProfile {
            owner_id: 7,
            push_opt_in: true,
            created_at: now() - Duration::days(30),
        };
        db.upsert_owner(&owner).await.unwrap();
        db.upsert_entity(&Entity {
            entity: EntityRef::band(1),
            name: "The Lanterns".to_string(),
            owner_id: Some(7),
        })
        .await
        .unwrap();

        let entity = db.get_entity(&EntityRef::band(1)).await.unwrap().unwrap();
        assert_eq!(entity.name, "The Lanterns");
        assert_eq!(db.get_owner(7).await.unwrap(), Some(owner));
        assert!(db.get_entity(&EntityRef::band(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_interaction_source_reads_inserted_rows() {
        let db = SqliteDatabase::in_memory().unwrap();
        let band = EntityRef::band(1);
        let records: Vec<InteractionRecord> = (0..3)
            .map(|i| {
                InteractionRecord::scan(InteractionCommon::new(
                    band,
                    now() - Duration::minutes(i),
                ))
            })
            .collect();
        db.insert_interactions(&records).await.unwrap();

        let window = TimeWindow::new(now() - Duration::hours(1), now() + Duration::seconds(1));
        let fetched = db.fetch_interactions(&band, &window, 10).await.unwrap();
        assert_eq!(fetched.len(), 3);
        assert!(fetched[0].occurred_at() <= fetched[2].occurred_at());
    }
}
