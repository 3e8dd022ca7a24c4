// Fan-initiated moments — a visitor checks in and gets something to share.
//
// One active moment per (entity, visitor): a repeat capture returns the
// existing moment instead of minting another. Each entity has an hourly cap
// counted in rate state under `fan_moments:<type>:<id>:<YYYYMMDDHH>`.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::engine::{parse_entity_id, PulseEngine};
use crate::db::models::{EntityRef, FanMoment, MomentType};
use crate::error::{EngineResult, PulseError};
use crate::moments::context::MomentContext;
use crate::moments::copy::share_copy;

const MAX_VISITOR_ID_CHARS: usize = 128;
const MAX_ACTION_CHARS: usize = 80;

/// Action type recorded on fan-initiated moments; the visitor's own wording
/// lives in the context.
pub const ACTION_CHECK_IN: &str = "CHECK_IN";

#[derive(Debug, Clone, PartialEq)]
pub struct FanMomentConfig {
    /// Captures allowed per entity per clock hour (default 200).
    pub hourly_cap: i64,
    pub ttl: Duration,
    /// Action text used when the visitor doesn't supply one.
    pub default_action: String,
}

impl Default for FanMomentConfig {
    fn default() -> Self {
        Self {
            hourly_cap: 200,
            ttl: Duration::hours(24),
            default_action: "was there".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FanCapture {
    pub moment: FanMoment,
    /// False when an existing active moment was returned.
    pub created: bool,
}

pub fn hourly_cap_key(entity: &EntityRef, now: DateTime<Utc>) -> String {
    format!("fan_moments:{}:{}", entity.key(), now.format("%Y%m%d%H"))
}

impl PulseEngine {
    pub async fn capture_fan_moment(
        &self,
        band_id: &str,
        visitor_id: &str,
        action: Option<&str>,
        now: DateTime<Utc>,
    ) -> EngineResult<FanCapture> {
        let entity = EntityRef::band(parse_entity_id(band_id)?);
        let visitor_id = visitor_id.trim();
        if visitor_id.is_empty() {
            return Err(PulseError::invalid("visitor id is required"));
        }
        if visitor_id.chars().count() > MAX_VISITOR_ID_CHARS {
            return Err(PulseError::invalid(format!(
                "visitor id is longer than {MAX_VISITOR_ID_CHARS} characters"
            )));
        }
        let cfg = &self.config.fan_moment;
        let action = match action.map(str::trim).filter(|a| !a.is_empty()) {
            Some(a) if a.chars().count() > MAX_ACTION_CHARS => {
                return Err(PulseError::invalid(format!(
                    "action is longer than {MAX_ACTION_CHARS} characters"
                )))
            }
            Some(a) => a.to_string(),
            None => cfg.default_action.clone(),
        };

        let registered = self.load_entity(&entity).await?;

        let _guard = self
            .locks
            .acquire(&format!("fan:{}:{visitor_id}", entity.key()))
            .await;

        let existing = self
            .db
            .get_active_visitor_moment(&entity, visitor_id, now)
            .await
            .map_err(PulseError::Persistence)?;
        if let Some(moment) = existing {
            return Ok(FanCapture {
                moment,
                created: false,
            });
        }

        let count = self
            .db
            .increment_rate_counter(&hourly_cap_key(&entity, now))
            .await
            .map_err(PulseError::Persistence)?;
        if count > cfg.hourly_cap {
            warn!(entity = %entity, count, cap = cfg.hourly_cap, "Fan moment cap reached");
            return Err(PulseError::RateLimited(format!(
                "{entity} reached {} fan moments this hour",
                cfg.hourly_cap
            )));
        }

        let context = MomentContext {
            band_name: registered.name.clone(),
            action: Some(action),
            ..MomentContext::default()
        };
        let context_json = serde_json::to_value(&context)
            .map_err(|e| PulseError::Persistence(anyhow::Error::new(e)))?;
        let moment = FanMoment {
            id: 0,
            entity,
            visitor_id: Some(visitor_id.to_string()),
            action_type: ACTION_CHECK_IN.to_string(),
            moment_type: MomentType::FanCheckIn,
            share_copy: share_copy(MomentType::FanCheckIn, &context),
            context: context_json,
            created_at: now,
            expires_at: now + cfg.ttl,
        };
        let moment = self.store_moment(moment).await?;
        info!(entity = %entity, moment_id = moment.id, "Fan moment captured");

        Ok(FanCapture {
            moment,
            created: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_hourly_cap_key_buckets_by_hour() {
        let band = EntityRef::band(3);
        let a = Utc.with_ymd_and_hms(2026, 5, 1, 20, 5, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 5, 1, 20, 59, 59).unwrap();
        let c = Utc.with_ymd_and_hms(2026, 5, 1, 21, 0, 0).unwrap();
        assert_eq!(hourly_cap_key(&band, a), "fan_moments:band:3:2026050120");
        assert_eq!(hourly_cap_key(&band, a), hourly_cap_key(&band, b));
        assert_ne!(hourly_cap_key(&band, b), hourly_cap_key(&band, c));
    }
}
