//! Shared test helpers.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use bandpulse::config::EngineConfig;
use bandpulse::db::models::{
    Entity, EntityRef, EntityType, FanMoment, Notification, OwnerProfile, PulseSnapshot,
};
use bandpulse::db::{Database, SqliteDatabase};
use bandpulse::signals::interaction::{InteractionCommon, InteractionRecord};
use bandpulse::signals::range::TimeWindow;
use bandpulse::signals::traits::InteractionSource;
use bandpulse::PulseEngine;

pub const BAND_ID: i64 = 1;
pub const OWNER_ID: i64 = 9;

/// Fixed evaluation clock: Friday night, show time.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 21, 0, 0).unwrap()
}

pub fn band() -> EntityRef {
    EntityRef::band(BAND_ID)
}

/// In-memory store with one band owned by an opted-in, month-old account.
pub async fn seeded_store() -> Arc<SqliteDatabase> {
    let store = Arc::new(SqliteDatabase::in_memory().unwrap());
    store
        .upsert_owner(&OwnerProfile {
            owner_id: OWNER_ID,
            push_opt_in: true,
            created_at: now() - Duration::days(30),
        })
        .await
        .unwrap();
    store
        .upsert_entity(&Entity {
            entity: band(),
            name: "The Lanterns".to_string(),
            owner_id: Some(OWNER_ID),
        })
        .await
        .unwrap();
    store
}

pub fn engine_for(store: &Arc<SqliteDatabase>) -> PulseEngine {
    PulseEngine::new(store.clone(), store.clone(), EngineConfig::default())
}

/// `n` page views for the band spread over the minutes before `end`.
pub fn views_before(end: DateTime<Utc>, n: usize, city: Option<&str>) -> Vec<InteractionRecord> {
    (0..n)
        .map(|i| {
            let ts = end - Duration::seconds(30 + i as i64 * 60);
            let mut common = InteractionCommon::new(band(), ts);
            common.city = city.map(str::to_string);
            InteractionRecord::page_view(common)
        })
        .collect()
}

pub async fn add(store: &Arc<SqliteDatabase>, records: Vec<InteractionRecord>) {
    store.insert_interactions(&records).await.unwrap();
}

/// Interaction source that always fails.
pub struct DownSource;

#[async_trait]
impl InteractionSource for DownSource {
    async fn fetch_interactions(
        &self,
        _entity: &EntityRef,
        _window: &TimeWindow,
        _limit: usize,
    ) -> Result<Vec<InteractionRecord>> {
        bail!("connection refused")
    }
}

/// Reads from a real store, failing every fetch while `down` is set.
pub struct SwitchableSource {
    pub inner: Arc<SqliteDatabase>,
    pub down: AtomicBool,
}

impl SwitchableSource {
    pub fn new(inner: Arc<SqliteDatabase>) -> Self {
        Self {
            inner,
            down: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl InteractionSource for SwitchableSource {
    async fn fetch_interactions(
        &self,
        entity: &EntityRef,
        window: &TimeWindow,
        limit: usize,
    ) -> Result<Vec<InteractionRecord>> {
        if self.down.load(Ordering::SeqCst) {
            bail!("connection refused");
        }
        self.inner.fetch_interactions(entity, window, limit).await
    }
}

/// Reads from a real store but fails any window ending at or before `cutoff`,
/// like a read replica missing older partitions.
pub struct StaleHistory {
    pub inner: Arc<SqliteDatabase>,
    pub cutoff: DateTime<Utc>,
}

#[async_trait]
impl InteractionSource for StaleHistory {
    async fn fetch_interactions(
        &self,
        entity: &EntityRef,
        window: &TimeWindow,
        limit: usize,
    ) -> Result<Vec<InteractionRecord>> {
        if window.end <= self.cutoff {
            bail!("partition unavailable");
        }
        self.inner.fetch_interactions(entity, window, limit).await
    }
}

/// Wraps a real store and fails every snapshot / notification write while
/// `fail_writes` is set.
pub struct FlakySnapshots {
    pub inner: Arc<SqliteDatabase>,
    pub fail_writes: AtomicBool,
}

impl FlakySnapshots {
    pub fn new(inner: Arc<SqliteDatabase>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(true),
        }
    }

    fn check(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("disk I/O error");
        }
        Ok(())
    }
}

#[async_trait]
impl Database for FlakySnapshots {
    async fn table_count(&self) -> Result<i64> {
        self.inner.table_count().await
    }
    async fn upsert_owner(&self, owner: &OwnerProfile) -> Result<()> {
        self.inner.upsert_owner(owner).await
    }
    async fn get_owner(&self, owner_id: i64) -> Result<Option<OwnerProfile>> {
        self.inner.get_owner(owner_id).await
    }
    async fn upsert_entity(&self, entity: &Entity) -> Result<()> {
        self.inner.upsert_entity(entity).await
    }
    async fn get_entity(&self, entity: &EntityRef) -> Result<Option<Entity>> {
        self.inner.get_entity(entity).await
    }
    async fn list_entities(&self, entity_type: Option<EntityType>) -> Result<Vec<Entity>> {
        self.inner.list_entities(entity_type).await
    }
    async fn insert_interactions(&self, records: &[InteractionRecord]) -> Result<usize> {
        self.inner.insert_interactions(records).await
    }
    async fn import_batch(
        &self,
        owners: &[OwnerProfile],
        entities: &[Entity],
        records: &[InteractionRecord],
    ) -> Result<usize> {
        self.inner.import_batch(owners, entities, records).await
    }
    async fn count_interactions(&self) -> Result<i64> {
        self.inner.count_interactions().await
    }
    async fn get_rate_state(&self, key: &str) -> Result<Option<String>> {
        self.inner.get_rate_state(key).await
    }
    async fn set_rate_state(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set_rate_state(key, value).await
    }
    async fn increment_rate_counter(&self, key: &str) -> Result<i64> {
        self.inner.increment_rate_counter(key).await
    }
    async fn get_snapshot(
        &self,
        entity: &EntityRef,
        range_key: &str,
    ) -> Result<Option<PulseSnapshot>> {
        self.inner.get_snapshot(entity, range_key).await
    }
    async fn upsert_snapshot(&self, snapshot: &PulseSnapshot) -> Result<()> {
        self.check()?;
        self.inner.upsert_snapshot(snapshot).await
    }
    async fn commit_surge_push(
        &self,
        snapshot: &PulseSnapshot,
        notification: &Notification,
    ) -> Result<Option<i64>> {
        self.check()?;
        self.inner.commit_surge_push(snapshot, notification).await
    }
    async fn count_snapshots_by_state(&self, range_key: &str) -> Result<Vec<(String, i64)>> {
        self.inner.count_snapshots_by_state(range_key).await
    }
    async fn get_recent_notifications(&self, limit: u32) -> Result<Vec<Notification>> {
        self.inner.get_recent_notifications(limit).await
    }
    async fn insert_moment(&self, moment: &FanMoment) -> Result<i64> {
        self.inner.insert_moment(moment).await
    }
    async fn get_active_moment(
        &self,
        entity: &EntityRef,
        action_type: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<FanMoment>> {
        self.inner.get_active_moment(entity, action_type, now).await
    }
    async fn get_active_visitor_moment(
        &self,
        entity: &EntityRef,
        visitor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<FanMoment>> {
        self.inner
            .get_active_visitor_moment(entity, visitor_id, now)
            .await
    }
    async fn get_active_moments(
        &self,
        entity: Option<&EntityRef>,
        now: DateTime<Utc>,
    ) -> Result<Vec<FanMoment>> {
        self.inner.get_active_moments(entity, now).await
    }
    async fn prune_expired_moments(&self, now: DateTime<Utc>) -> Result<usize> {
        self.inner.prune_expired_moments(now).await
    }
}
