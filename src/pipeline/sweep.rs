// Batch sweep: evaluate every registered entity for one range.
//
// Strategy: prune expired moments, list entities, then evaluate them in
// parallel with a bounded number in flight. Bands can also get an
// auto-moment check in the same pass. Per-entity locks inside the engine
// keep overlapping work on one entity serialized; unrelated entities run
// freely. One entity failing never stops the sweep.

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};

use super::engine::PulseEngine;
use crate::db::models::{to_db_timestamp, EntityType, MomentumState};
use crate::signals::range::RangeKey;

/// Rate-state key holding the timestamp of the last completed sweep.
pub const LAST_SWEEP_KEY: &str = "last_sweep_at";

#[derive(Debug, Clone)]
pub struct SweepOptions {
    pub range: RangeKey,
    /// Only sweep entities of this type.
    pub entity_type: Option<EntityType>,
    pub concurrency: usize,
    /// Also run auto-moment evaluation for bands.
    pub moments: bool,
    pub show_progress: bool,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            range: RangeKey::Day,
            entity_type: None,
            concurrency: 8,
            moments: false,
            show_progress: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub evaluated: usize,
    pub surging: usize,
    pub notifications: usize,
    pub moments: usize,
    pub pruned: usize,
    pub degraded: usize,
    pub failed: usize,
}

impl PulseEngine {
    pub async fn sweep(&self, opts: &SweepOptions, now: DateTime<Utc>) -> Result<SweepSummary> {
        let mut summary = SweepSummary {
            pruned: self.db.prune_expired_moments(now).await?,
            ..SweepSummary::default()
        };

        let entities = self.db.list_entities(opts.entity_type).await?;
        info!(
            count = entities.len(),
            range = %opts.range,
            concurrency = opts.concurrency,
            "Starting sweep"
        );

        let pb = if opts.show_progress {
            let pb = ProgressBar::new(entities.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  Sweeping [{bar:30}] {pos}/{len} ({eta})")?,
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let results: Vec<_> = stream::iter(entities.into_iter().map(|entity| {
            let pb = &pb;
            async move {
                let evaluation = self.evaluate_entity(&entity.entity, opts.range, now).await;
                let moment = if opts.moments && entity.entity.entity_type == EntityType::Band {
                    Some(self.auto_moment_for(&entity.entity, false, now).await)
                } else {
                    None
                };
                pb.inc(1);
                (entity, evaluation, moment)
            }
        }))
        .buffer_unordered(opts.concurrency.max(1))
        .collect()
        .await;
        pb.finish_and_clear();

        for (entity, evaluation, moment) in results {
            match evaluation {
                Ok(eval) => {
                    summary.evaluated += 1;
                    if eval.pulse.momentum_state == MomentumState::Surging {
                        summary.surging += 1;
                    }
                    if eval.surge.notification_id.is_some() {
                        summary.notifications += 1;
                    }
                    if eval.signals.degraded {
                        summary.degraded += 1;
                    }
                }
                Err(e) => {
                    warn!(entity = %entity.entity, error = %e, "Failed to evaluate entity, skipping");
                    summary.failed += 1;
                }
            }
            match moment {
                Some(Ok(outcome)) if outcome.created.is_some() => summary.moments += 1,
                Some(Err(e)) => {
                    warn!(entity = %entity.entity, error = %e, "Auto moment check failed");
                }
                _ => {}
            }
        }

        self.db
            .set_rate_state(LAST_SWEEP_KEY, &to_db_timestamp(&now))
            .await?;
        info!(
            evaluated = summary.evaluated,
            surging = summary.surging,
            notifications = summary.notifications,
            moments = summary.moments,
            failed = summary.failed,
            "Sweep complete"
        );
        Ok(summary)
    }
}
