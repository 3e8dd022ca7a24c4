// Database trait — backend-agnostic async interface for all DB operations.
//
// Implementors: SqliteDatabase (wraps rusqlite). Tests wrap it to inject
// failures. All methods are async so a native async backend could sit
// behind the same interface later.
//
// The trait mirrors the queries.rs function signatures, so callers hold an
// `Arc<dyn Database>` and never touch a Connection directly.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{
    Entity, EntityRef, EntityType, FanMoment, Notification, OwnerProfile, PulseSnapshot,
};
use crate::signals::interaction::InteractionRecord;

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- Owners and entities ---

    async fn upsert_owner(&self, owner: &OwnerProfile) -> Result<()>;

    async fn get_owner(&self, owner_id: i64) -> Result<Option<OwnerProfile>>;

    async fn upsert_entity(&self, entity: &Entity) -> Result<()>;

    async fn get_entity(&self, entity: &EntityRef) -> Result<Option<Entity>>;

    /// All registered entities, optionally restricted to one type.
    async fn list_entities(&self, entity_type: Option<EntityType>) -> Result<Vec<Entity>>;

    // --- Interactions ---

    /// Bulk insert raw interactions. Returns the number written.
    async fn insert_interactions(&self, records: &[InteractionRecord]) -> Result<usize>;

    /// Write owners, entities and interactions atomically. Returns the
    /// number of interactions written.
    async fn import_batch(
        &self,
        owners: &[OwnerProfile],
        entities: &[Entity],
        records: &[InteractionRecord],
    ) -> Result<usize>;

    async fn count_interactions(&self) -> Result<i64>;

    // --- Rate state ---

    /// Get a rate-state value by key (e.g., "auto_moment:band:42").
    async fn get_rate_state(&self, key: &str) -> Result<Option<String>>;

    /// Set a rate-state value (upsert).
    async fn set_rate_state(&self, key: &str, value: &str) -> Result<()>;

    /// Increment a counter key and return the new count.
    async fn increment_rate_counter(&self, key: &str) -> Result<i64>;

    // --- Pulse snapshots ---

    async fn get_snapshot(&self, entity: &EntityRef, range_key: &str)
        -> Result<Option<PulseSnapshot>>;

    async fn upsert_snapshot(&self, snapshot: &PulseSnapshot) -> Result<()>;

    /// Persist a pushed snapshot and its notification in one transaction.
    /// Returns None when another evaluation already sent this surge.
    async fn commit_surge_push(
        &self,
        snapshot: &PulseSnapshot,
        notification: &Notification,
    ) -> Result<Option<i64>>;

    /// (momentum_state, count) pairs for one range.
    async fn count_snapshots_by_state(&self, range_key: &str) -> Result<Vec<(String, i64)>>;

    // --- Notifications ---

    async fn get_recent_notifications(&self, limit: u32) -> Result<Vec<Notification>>;

    // --- Fan moments ---

    /// Record a new moment and return its ID.
    async fn insert_moment(&self, moment: &FanMoment) -> Result<i64>;

    /// Newest unexpired system moment (no visitor) with this action type.
    async fn get_active_moment(
        &self,
        entity: &EntityRef,
        action_type: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<FanMoment>>;

    /// Newest unexpired moment this visitor created for the entity.
    async fn get_active_visitor_moment(
        &self,
        entity: &EntityRef,
        visitor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<FanMoment>>;

    async fn get_active_moments(
        &self,
        entity: Option<&EntityRef>,
        now: DateTime<Utc>,
    ) -> Result<Vec<FanMoment>>;

    /// Delete expired moments, returning how many were removed.
    async fn prune_expired_moments(&self, now: DateTime<Utc>) -> Result<usize>;
}
