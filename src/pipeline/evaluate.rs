// Pulse evaluation pipeline: fetch → normalize → score → surge check → persist.
//
// Input validation happens before any fetch. Once the entity is known the
// pulse is always returned. A broken interaction store yields zeroed,
// degraded signals and the snapshot is not touched. A broken snapshot store
// yields a pulse with no persisted state and no notification.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use super::engine::{parse_entity_ref, parse_range, PulseEngine};
use crate::db::models::{Entity, EntityRef, MomentumState, OwnerProfile, PulseSnapshot};
use crate::error::EngineResult;
use crate::scoring::pulse::{score_signals, Pulse};
use crate::scoring::surge::{
    build_notification, evaluate_surge, next_snapshot, previous_state, SkipReason, SurgeDecision,
};
use crate::signals::normalizer::NormalizedSignals;
use crate::signals::range::RangeKey;

/// What happened on the surge side of an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurgeEvaluation {
    pub previous_state: MomentumState,
    pub decision: SurgeDecision,
    /// Outbox row id when a push was queued.
    pub notification_id: Option<i64>,
    /// False when the snapshot could not be read or written.
    pub persisted: bool,
}

impl SurgeEvaluation {
    fn unavailable(previous_state: MomentumState) -> Self {
        Self {
            previous_state,
            decision: SurgeDecision::Skip(SkipReason::SnapshotUnavailable),
            notification_id: None,
            persisted: false,
        }
    }
}

/// Full result of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub entity: Entity,
    pub signals: NormalizedSignals,
    pub pulse: Pulse,
    pub surge: SurgeEvaluation,
}

impl PulseEngine {
    /// Evaluate an entity from raw request input.
    pub async fn evaluate(
        &self,
        entity_type: &str,
        entity_id: &str,
        range: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Evaluation> {
        let entity = parse_entity_ref(entity_type, entity_id)?;
        let range = parse_range(range)?;
        self.evaluate_entity(&entity, range, now).await
    }

    /// Evaluate an already-validated entity reference.
    pub async fn evaluate_entity(
        &self,
        entity: &EntityRef,
        range: RangeKey,
        now: DateTime<Utc>,
    ) -> EngineResult<Evaluation> {
        let entity = self.load_entity(entity).await?;
        let signals = self.fetch_signals(&entity.entity, range, now).await;
        let pulse = score_signals(&signals, &self.config.weights, &self.config.thresholds);

        // Snapshot read-modify-write is the critical section.
        let _guard = self
            .locks
            .acquire(&format!("snapshot:{}:{}", entity.entity.key(), range))
            .await;
        let surge = self.apply_surge(&entity, &signals, &pulse, now).await;

        info!(
            entity = %entity.entity,
            range = %range,
            score = pulse.pulse_score,
            state = %pulse.momentum_state,
            growth = pulse.growth_pct,
            degraded = signals.degraded,
            "Pulse evaluated"
        );

        Ok(Evaluation {
            entity,
            signals,
            pulse,
            surge,
        })
    }

    async fn apply_surge(
        &self,
        entity: &Entity,
        signals: &NormalizedSignals,
        pulse: &Pulse,
        now: DateTime<Utc>,
    ) -> SurgeEvaluation {
        let range = signals.range;
        let previous = match self.db.get_snapshot(&entity.entity, range.as_str()).await {
            Ok(previous) => previous,
            Err(e) => {
                error!(entity = %entity.entity, error = %e, "Failed to read pulse snapshot");
                return SurgeEvaluation::unavailable(MomentumState::Steady);
            }
        };
        let prev_state = previous_state(previous.as_ref());

        // Zeroed signals would look like a drop to steady and re-arm the push.
        if signals.degraded {
            warn!(entity = %entity.entity, "Signals degraded, leaving snapshot untouched");
            return SurgeEvaluation {
                previous_state: prev_state,
                decision: SurgeDecision::Skip(SkipReason::SignalsDegraded),
                notification_id: None,
                persisted: false,
            };
        }

        let owner = match self.load_owner(entity).await {
            Ok(owner) => owner,
            Err(e) => {
                // Leave the snapshot untouched so the transition is retried.
                error!(entity = %entity.entity, error = %e, "Failed to read entity owner");
                return SurgeEvaluation::unavailable(prev_state);
            }
        };

        let decision = evaluate_surge(
            previous.as_ref(),
            pulse.momentum_state,
            owner.as_ref(),
            now,
            &self.config.surge,
        );
        let snapshot = next_snapshot(previous.as_ref(), entity, range, pulse, decision, now);

        match (decision, owner.as_ref()) {
            (SurgeDecision::Push, Some(owner)) => {
                self.commit_push(entity, signals, pulse, owner, &snapshot, prev_state, now)
                    .await
            }
            _ => match self.db.upsert_snapshot(&snapshot).await {
                Ok(()) => SurgeEvaluation {
                    previous_state: prev_state,
                    decision,
                    notification_id: None,
                    persisted: true,
                },
                Err(e) => {
                    error!(entity = %entity.entity, error = %e, "Failed to write pulse snapshot");
                    SurgeEvaluation {
                        previous_state: prev_state,
                        decision,
                        notification_id: None,
                        persisted: false,
                    }
                }
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn commit_push(
        &self,
        entity: &Entity,
        signals: &NormalizedSignals,
        pulse: &Pulse,
        owner: &OwnerProfile,
        snapshot: &PulseSnapshot,
        prev_state: MomentumState,
        now: DateTime<Utc>,
    ) -> SurgeEvaluation {
        let notification = build_notification(owner, entity, signals, pulse, now);
        match self.db.commit_surge_push(snapshot, &notification).await {
            Ok(Some(id)) => {
                info!(
                    entity = %entity.entity,
                    owner = owner.owner_id,
                    notification_id = id,
                    "Surge push queued"
                );
                SurgeEvaluation {
                    previous_state: prev_state,
                    decision: SurgeDecision::Push,
                    notification_id: Some(id),
                    persisted: true,
                }
            }
            Ok(None) => SurgeEvaluation {
                previous_state: prev_state,
                decision: SurgeDecision::Skip(SkipReason::AlreadySent),
                notification_id: None,
                persisted: true,
            },
            Err(e) => {
                error!(entity = %entity.entity, error = %e, "Failed to commit surge push");
                SurgeEvaluation::unavailable(prev_state)
            }
        }
    }

    async fn load_owner(&self, entity: &Entity) -> anyhow::Result<Option<OwnerProfile>> {
        match entity.owner_id {
            Some(owner_id) => self.db.get_owner(owner_id).await,
            None => Ok(None),
        }
    }
}
