// Show recap pipeline: rate checks → lookback fetch → peak scan → mint.
//
// Shares the outcome shape and dry-run rules with auto moments, but has its
// own cooldown key and a longer TTL.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::auto_moment::{MomentOutcome, MomentSkip};
use super::engine::{parse_entity_id, PulseEngine};
use crate::db::models::{EntityRef, MomentType, ACTION_RECAP};
use crate::error::{EngineResult, PulseError};
use crate::moments::recap::summarize;
use crate::signals::range::TimeWindow;

pub fn recap_key(entity: &EntityRef) -> String {
    format!("recap:{}", entity.key())
}

impl PulseEngine {
    pub async fn evaluate_recap(
        &self,
        band_id: &str,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> EngineResult<MomentOutcome> {
        let band = EntityRef::band(parse_entity_id(band_id)?);
        self.recap_for(&band, dry_run, now).await
    }

    pub async fn recap_for(
        &self,
        entity: &EntityRef,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> EngineResult<MomentOutcome> {
        let cfg = &self.config.recap;
        let registered = self.load_entity(entity).await?;

        let _guard = self
            .locks
            .acquire(&format!("moments:{}", entity.key()))
            .await;

        let key = recap_key(entity);
        if self.in_cooldown(&key, cfg.cooldown, now).await? {
            return Ok(MomentOutcome::skipped(*entity, MomentSkip::CoolingDown));
        }
        let active = self
            .db
            .get_active_moment(entity, ACTION_RECAP, now)
            .await
            .map_err(PulseError::Persistence)?;
        if active.is_some() {
            return Ok(MomentOutcome::skipped(*entity, MomentSkip::ActiveMoment));
        }

        let lookback = TimeWindow::ending_at(now, cfg.lookback);
        let (records, degraded) = self.fetcher.fetch_or_empty(entity, &lookback).await;
        if degraded {
            warn!(entity = %entity, "Skipping show recap, interaction store unavailable");
            return Ok(MomentOutcome::skipped(*entity, MomentSkip::Degraded));
        }

        let Some(summary) = summarize(&records, cfg) else {
            return Ok(MomentOutcome::skipped(*entity, MomentSkip::NoTrigger));
        };
        let context = summary.to_context(&registered.name, cfg.window_width);

        info!(
            entity = %entity,
            peak = summary.peak.count,
            peak_start = %summary.peak.start,
            dry_run,
            "Show recap triggered"
        );

        let created = if dry_run {
            None
        } else {
            let moment = self.build_moment(
                entity,
                ACTION_RECAP,
                MomentType::ShowRecap,
                &context,
                cfg.ttl,
                now,
            )?;
            let stored = self.store_moment(moment).await?;
            self.mark_rate_state(&key, now).await?;
            Some(stored)
        };

        Ok(MomentOutcome {
            entity: *entity,
            triggered: true,
            moment_type: Some(MomentType::ShowRecap),
            context: Some(context),
            created,
            skipped: None,
        })
    }
}
