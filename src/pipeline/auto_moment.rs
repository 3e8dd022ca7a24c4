// Auto-moment pipeline: rate checks → window fetch → analyzers → mint.
//
// Rate limits are checked before any interaction is fetched, so a band in
// cooldown costs two small key lookups. If either window can't be fetched
// nothing is evaluated or written. A dry run goes through every step
// except the two writes (the moment row and the cooldown stamp).

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::engine::{parse_entity_id, PulseEngine};
use crate::db::models::{EntityRef, FanMoment, MomentType, ACTION_AUTO};
use crate::error::{EngineResult, PulseError};
use crate::moments::context::MomentContext;
use crate::moments::copy::share_copy;
use crate::moments::triggers::{first_trigger, WindowStats};
use crate::signals::range::TimeWindow;

/// Why no moment was minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentSkip {
    /// A moment of this kind was minted inside the cooldown.
    CoolingDown,
    /// An unexpired moment of this kind already exists.
    ActiveMoment,
    /// Nothing in the data cleared a trigger.
    NoTrigger,
    /// A window could not be fetched, so there is nothing to compare.
    Degraded,
}

/// Result of an auto-moment or recap evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MomentOutcome {
    pub entity: EntityRef,
    pub triggered: bool,
    pub moment_type: Option<MomentType>,
    pub context: Option<MomentContext>,
    /// The stored moment; None on dry runs and skips.
    pub created: Option<FanMoment>,
    pub skipped: Option<MomentSkip>,
}

impl MomentOutcome {
    pub(crate) fn skipped(entity: EntityRef, reason: MomentSkip) -> Self {
        Self {
            entity,
            triggered: false,
            moment_type: None,
            context: None,
            created: None,
            skipped: Some(reason),
        }
    }
}

/// Rate-state key for an entity's auto-moment cooldown.
pub fn auto_moment_key(entity: &EntityRef) -> String {
    format!("auto_moment:{}", entity.key())
}

impl PulseEngine {
    /// Evaluate real-time triggers for a band from raw request input.
    pub async fn evaluate_auto_moment(
        &self,
        band_id: &str,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> EngineResult<MomentOutcome> {
        let band = EntityRef::band(parse_entity_id(band_id)?);
        self.auto_moment_for(&band, dry_run, now).await
    }

    pub async fn auto_moment_for(
        &self,
        entity: &EntityRef,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> EngineResult<MomentOutcome> {
        let cfg = &self.config.auto_moment;
        let registered = self.load_entity(entity).await?;

        let _guard = self
            .locks
            .acquire(&format!("moments:{}", entity.key()))
            .await;

        let key = auto_moment_key(entity);
        if self.in_cooldown(&key, cfg.cooldown, now).await? {
            debug!(entity = %entity, "Auto moment cooling down");
            return Ok(MomentOutcome::skipped(*entity, MomentSkip::CoolingDown));
        }
        let active = self
            .db
            .get_active_moment(entity, ACTION_AUTO, now)
            .await
            .map_err(PulseError::Persistence)?;
        if active.is_some() {
            debug!(entity = %entity, "Auto moment already active");
            return Ok(MomentOutcome::skipped(*entity, MomentSkip::ActiveMoment));
        }

        let window = TimeWindow::ending_at(now, cfg.window);
        let baseline = TimeWindow::ending_at(now - cfg.baseline_offset, cfg.window);
        let ((window_rows, window_degraded), (baseline_rows, baseline_degraded)) = futures::join!(
            self.fetcher.fetch_or_empty(entity, &window),
            self.fetcher.fetch_or_empty(entity, &baseline),
        );
        // A zeroed baseline would read as a 10x spike.
        if window_degraded || baseline_degraded {
            warn!(entity = %entity, "Skipping auto moment, interaction store unavailable");
            return Ok(MomentOutcome::skipped(*entity, MomentSkip::Degraded));
        }

        let stats = WindowStats::compute(
            &window_rows,
            baseline_rows.len() as u64,
            cfg.window,
            cfg.zero_baseline_velocity,
        );
        let context = stats.to_context(&registered.name);

        let Some((moment_type, analyzer)) = first_trigger(&self.analyzers, &stats) else {
            return Ok(MomentOutcome {
                context: Some(context),
                ..MomentOutcome::skipped(*entity, MomentSkip::NoTrigger)
            });
        };

        info!(
            entity = %entity,
            moment_type = %moment_type,
            analyzer,
            window = stats.window_count,
            baseline = stats.baseline_count,
            velocity = stats.velocity,
            dry_run,
            "Auto moment triggered"
        );

        let created = if dry_run {
            None
        } else {
            let moment = self.build_moment(
                entity,
                ACTION_AUTO,
                moment_type,
                &context,
                cfg.ttl(moment_type),
                now,
            )?;
            let stored = self.store_moment(moment).await?;
            self.mark_rate_state(&key, now).await?;
            Some(stored)
        };

        Ok(MomentOutcome {
            entity: *entity,
            triggered: true,
            moment_type: Some(moment_type),
            context: Some(context),
            created,
            skipped: None,
        })
    }

    /// Assemble a system moment row (id assigned on insert).
    pub(crate) fn build_moment(
        &self,
        entity: &EntityRef,
        action_type: &str,
        moment_type: MomentType,
        context: &MomentContext,
        ttl: chrono::Duration,
        now: DateTime<Utc>,
    ) -> EngineResult<FanMoment> {
        let context_json = serde_json::to_value(context)
            .map_err(|e| PulseError::Persistence(anyhow::Error::new(e)))?;
        Ok(FanMoment {
            id: 0,
            entity: *entity,
            visitor_id: None,
            action_type: action_type.to_string(),
            moment_type,
            share_copy: share_copy(moment_type, context),
            context: context_json,
            created_at: now,
            expires_at: now + ttl,
        })
    }

    pub(crate) async fn store_moment(&self, mut moment: FanMoment) -> EngineResult<FanMoment> {
        moment.id = self
            .db
            .insert_moment(&moment)
            .await
            .map_err(PulseError::Persistence)?;
        Ok(moment)
    }
}
