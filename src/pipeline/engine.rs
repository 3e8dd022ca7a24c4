// PulseEngine — the shared handle every pipeline step runs against.
//
// Holds the snapshot / moment store, the bounded interaction fetcher, the
// tunables, and the per-entity lock table. Construct one per process and
// share it; all methods take &self.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::locks::EntityLocks;
use crate::config::EngineConfig;
use crate::db::models::{to_db_timestamp, parse_db_timestamp, Entity, EntityRef, EntityType};
use crate::db::Database;
use crate::error::{EngineResult, PulseError};
use crate::moments::triggers::TriggerAnalyzer;
use crate::signals::fetcher::SignalFetcher;
use crate::signals::normalizer::{normalize_pair, NormalizedSignals};
use crate::signals::range::RangeKey;
use crate::signals::traits::InteractionSource;

pub struct PulseEngine {
    pub(crate) db: Arc<dyn Database>,
    pub(crate) fetcher: SignalFetcher,
    pub(crate) config: EngineConfig,
    pub(crate) locks: EntityLocks,
    pub(crate) analyzers: Vec<Box<dyn TriggerAnalyzer>>,
}

impl PulseEngine {
    pub fn new(
        db: Arc<dyn Database>,
        source: Arc<dyn InteractionSource>,
        config: EngineConfig,
    ) -> Self {
        let fetcher = SignalFetcher::new(source, config.fetch_limit);
        let analyzers = config.auto_moment.analyzers();
        Self {
            db,
            fetcher,
            config,
            locks: EntityLocks::new(),
            analyzers,
        }
    }

    /// Replace the auto-moment analyzer chain (priority order).
    pub fn with_analyzers(mut self, analyzers: Vec<Box<dyn TriggerAnalyzer>>) -> Self {
        self.analyzers = analyzers;
        self
    }

    pub fn db(&self) -> &Arc<dyn Database> {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Look up a registered entity.
    pub(crate) async fn load_entity(&self, entity: &EntityRef) -> EngineResult<Entity> {
        self.db
            .get_entity(entity)
            .await
            .map_err(PulseError::Persistence)?
            .ok_or_else(|| PulseError::NotFound(format!("{entity} is not registered")))
    }

    /// Fetch and normalize both windows of a range. Fetch failures zero the
    /// affected window and mark the result degraded.
    pub(crate) async fn fetch_signals(
        &self,
        entity: &EntityRef,
        range: RangeKey,
        now: DateTime<Utc>,
    ) -> NormalizedSignals {
        let current_window = range.current_window(now);
        let previous_window = range.previous_window(now);

        let ((current, current_degraded), (previous, previous_degraded)) = futures::join!(
            self.fetcher.fetch_or_empty(entity, &current_window),
            self.fetcher.fetch_or_empty(entity, &previous_window),
        );

        let mut signals = normalize_pair(
            range,
            &current,
            &current_window,
            &previous,
            &previous_window,
        );
        signals.degraded = current_degraded || previous_degraded;
        signals
    }

    /// Whether a rate-state timestamp key is still inside its cooldown.
    pub(crate) async fn in_cooldown(
        &self,
        key: &str,
        cooldown: chrono::Duration,
        now: DateTime<Utc>,
    ) -> EngineResult<bool> {
        let last = self
            .db
            .get_rate_state(key)
            .await
            .map_err(PulseError::Persistence)?;

        Ok(match last.as_deref().map(|raw| (raw, parse_db_timestamp(raw))) {
            Some((_, Some(last))) => now - last < cooldown,
            Some((raw, None)) => {
                warn!(key, value = raw, "Unreadable rate-state timestamp, ignoring it");
                false
            }
            None => false,
        })
    }

    pub(crate) async fn mark_rate_state(&self, key: &str, now: DateTime<Utc>) -> EngineResult<()> {
        self.db
            .set_rate_state(key, &to_db_timestamp(&now))
            .await
            .map_err(PulseError::Persistence)
    }
}

/// Validate raw entity input before anything is fetched.
pub fn parse_entity_ref(entity_type: &str, entity_id: &str) -> EngineResult<EntityRef> {
    let entity_type: EntityType = entity_type.parse().map_err(PulseError::InvalidInput)?;
    let entity_id = parse_entity_id(entity_id)?;
    Ok(EntityRef::new(entity_type, entity_id))
}

/// Entity ids are positive integers.
pub fn parse_entity_id(raw: &str) -> EngineResult<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PulseError::invalid("entity id is required"));
    }
    match trimmed.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(PulseError::invalid(format!(
            "entity id must be a positive integer, got '{trimmed}'"
        ))),
    }
}

pub fn parse_range(raw: &str) -> EngineResult<RangeKey> {
    raw.parse().map_err(PulseError::InvalidInput)
}
