// Surge eligibility — decides whether a momentum transition earns a push.
//
// The only trigger is previous != surging and current == surging. Staying
// in (or re-entering via warming) surging never fires again until the entity
// has gone quiet (steady or cooling), which re-arms the `surge_push_sent`
// flag on its snapshot.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::pulse::Pulse;
use crate::db::models::{
    Entity, MomentumState, Notification, OwnerProfile, PulseSnapshot,
};
use crate::signals::normalizer::NormalizedSignals;
use crate::signals::range::RangeKey;

/// Guard settings for surge pushes.
#[derive(Debug, Clone, PartialEq)]
pub struct SurgePolicy {
    /// Owners younger than this never get surge pushes (default 7 days).
    pub min_account_age: Duration,
    /// Minimum gap between two surge pushes for one snapshot (default 12h).
    pub push_cooldown: Duration,
}

impl Default for SurgePolicy {
    fn default() -> Self {
        Self {
            min_account_age: Duration::days(7),
            push_cooldown: Duration::hours(12),
        }
    }
}

/// Why a push was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Current state is not surging, or the previous one already was.
    NoTransition,
    /// The entity has no owner to notify.
    NoOwner,
    PushDisabled,
    AccountTooNew,
    /// A push already went out for this surge.
    AlreadySent,
    CoolingDown,
    /// The snapshot could not be read or written.
    SnapshotUnavailable,
    /// Signals were zeroed by an interaction store outage, so the stored
    /// state is left as it was.
    SignalsDegraded,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoTransition => "no transition into surging",
            SkipReason::NoOwner => "entity has no owner",
            SkipReason::PushDisabled => "owner has push disabled",
            SkipReason::AccountTooNew => "owner account too new",
            SkipReason::AlreadySent => "push already sent for this surge",
            SkipReason::CoolingDown => "surge push cooldown active",
            SkipReason::SnapshotUnavailable => "snapshot store unavailable",
            SkipReason::SignalsDegraded => "interaction store unavailable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum SurgeDecision {
    Push,
    Skip(SkipReason),
}

/// Previous state of a snapshot; a missing snapshot counts as steady.
pub fn previous_state(previous: Option<&PulseSnapshot>) -> MomentumState {
    previous
        .map(|s| s.momentum_state)
        .unwrap_or(MomentumState::Steady)
}

/// Whether this evaluation is a transition into surging.
pub fn is_surge_transition(previous: Option<&PulseSnapshot>, current: MomentumState) -> bool {
    current == MomentumState::Surging && previous_state(previous) != MomentumState::Surging
}

/// Decide whether to push. Guards are checked in a fixed order and the
/// first failing one is reported.
pub fn evaluate_surge(
    previous: Option<&PulseSnapshot>,
    current: MomentumState,
    owner: Option<&OwnerProfile>,
    now: DateTime<Utc>,
    policy: &SurgePolicy,
) -> SurgeDecision {
    if !is_surge_transition(previous, current) {
        return SurgeDecision::Skip(SkipReason::NoTransition);
    }
    let Some(owner) = owner else {
        return SurgeDecision::Skip(SkipReason::NoOwner);
    };
    if !owner.push_opt_in {
        return SurgeDecision::Skip(SkipReason::PushDisabled);
    }
    if now - owner.created_at < policy.min_account_age {
        return SurgeDecision::Skip(SkipReason::AccountTooNew);
    }
    if previous.is_some_and(|s| s.surge_push_sent) {
        return SurgeDecision::Skip(SkipReason::AlreadySent);
    }
    if let Some(last) = previous.and_then(|s| s.last_surge_push_at) {
        if now - last < policy.push_cooldown {
            return SurgeDecision::Skip(SkipReason::CoolingDown);
        }
    }
    SurgeDecision::Push
}

/// The snapshot to persist after this evaluation.
pub fn next_snapshot(
    previous: Option<&PulseSnapshot>,
    entity: &Entity,
    range: RangeKey,
    pulse: &Pulse,
    decision: SurgeDecision,
    now: DateTime<Utc>,
) -> PulseSnapshot {
    let state_changed = previous.map_or(true, |s| s.momentum_state != pulse.momentum_state);

    let (surge_push_sent, last_surge_push_at) = if decision == SurgeDecision::Push {
        (true, Some(now))
    } else if pulse.momentum_state.is_quiet() {
        (false, previous.and_then(|s| s.last_surge_push_at))
    } else {
        (
            previous.is_some_and(|s| s.surge_push_sent),
            previous.and_then(|s| s.last_surge_push_at),
        )
    };

    PulseSnapshot {
        entity: entity.entity,
        range_key: range.as_str().to_string(),
        pulse_score: pulse.pulse_score,
        momentum_state: pulse.momentum_state,
        total_activity: pulse.total_activity as i64,
        growth_pct: pulse.growth_pct,
        last_momentum_change_at: if state_changed {
            Some(now)
        } else {
            previous.and_then(|s| s.last_momentum_change_at)
        },
        last_surge_push_at,
        surge_push_sent,
        updated_at: now,
    }
}

/// Push content for a surge. The notification id is assigned on insert.
pub fn build_notification(
    owner: &OwnerProfile,
    entity: &Entity,
    signals: &NormalizedSignals,
    pulse: &Pulse,
    now: DateTime<Utc>,
) -> Notification {
    let mut body = format!(
        "Activity is up {:.0}% over {} ({} interactions).",
        pulse.growth_pct,
        signals.range.phrase(),
        pulse.total_activity,
    );
    if let Some(city) = &signals.current.top_city {
        body.push_str(&format!(" {} is leading the way.", city.name));
    }

    Notification {
        id: 0,
        owner_id: owner.owner_id,
        entity: entity.entity,
        kind: "surge".to_string(),
        title: format!("{} is surging", entity.name),
        body,
        created_at: now,
    }
}
