// Pulse score and momentum state.
//
// Growth compares the current window's total against the previous window's.
// The momentum state is a pure bucketing of growth %. The pulse score blends
// how much is happening (log-scaled weighted activity) with how fast it is
// changing, so a quiet entity that doubles still scores below a busy one
// holding steady.
//
// `score = 100 * activity * (activity_share + (1 - activity_share) * momentum)`
//
// where `activity = min(1, ln(1 + A) / ln(1 + saturation))` and
// `momentum = (clamp(growth, -100, growth_cap) + 100) / (growth_cap + 100)`.

use serde::{Deserialize, Serialize};

use crate::db::models::MomentumState;
use crate::signals::interaction::InteractionKind;
use crate::signals::normalizer::{NormalizedSignals, SignalVector};

/// Configurable weights for the pulse score formula.
#[derive(Debug, Clone, PartialEq)]
pub struct PulseWeights {
    pub view_weight: f64,
    pub click_weight: f64,
    pub play_weight: f64,
    pub scan_weight: f64,
    /// Weighted activity at which the activity factor tops out (default 5000).
    pub activity_saturation: f64,
    /// Share of the score that activity alone can earn (default 0.6).
    pub activity_share: f64,
    /// Growth above this adds nothing more to the score (default 300%).
    pub growth_cap: f64,
}

impl Default for PulseWeights {
    fn default() -> Self {
        Self {
            view_weight: 1.0,
            click_weight: 2.0,
            play_weight: 2.0,
            scan_weight: 3.0,
            activity_saturation: 5000.0,
            activity_share: 0.6,
            growth_cap: 300.0,
        }
    }
}

impl PulseWeights {
    pub fn weight(&self, kind: InteractionKind) -> f64 {
        match kind {
            InteractionKind::PageView => self.view_weight,
            InteractionKind::LinkClick => self.click_weight,
            InteractionKind::MediaPlay => self.play_weight,
            InteractionKind::Scan => self.scan_weight,
        }
    }

    /// Weighted activity of a signal vector.
    pub fn weighted_activity(&self, v: &SignalVector) -> f64 {
        KINDS
            .iter()
            .map(|k| v.count(*k) as f64 * self.weight(*k))
            .sum()
    }
}

/// Growth % cutoffs for the momentum buckets.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentumThresholds {
    /// Growth at or above this is surging (default 150%).
    pub surging_min: f64,
    /// Growth at or above this is warming (default 25%).
    pub warming_min: f64,
    /// Growth at or below this is cooling (default -25%).
    pub cooling_max: f64,
}

impl Default for MomentumThresholds {
    fn default() -> Self {
        Self {
            surging_min: 150.0,
            warming_min: 25.0,
            cooling_max: -25.0,
        }
    }
}

impl MomentumThresholds {
    /// Bucket a growth percentage.
    pub fn classify(&self, growth_pct: f64) -> MomentumState {
        match growth_pct {
            g if g >= self.surging_min => MomentumState::Surging,
            g if g >= self.warming_min => MomentumState::Warming,
            g if g <= self.cooling_max => MomentumState::Cooling,
            _ => MomentumState::Steady,
        }
    }
}

/// One signal kind's contribution to the change between windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseDriver {
    pub signal: InteractionKind,
    pub current: u64,
    pub previous: u64,
    /// (current - previous) * kind weight
    pub weighted_delta: f64,
}

/// Scorer output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pulse {
    pub pulse_score: f64,
    pub momentum_state: MomentumState,
    pub growth_pct: f64,
    pub total_activity: u64,
    pub drivers: Vec<PulseDriver>,
}

const KINDS: [InteractionKind; 4] = [
    InteractionKind::PageView,
    InteractionKind::LinkClick,
    InteractionKind::MediaPlay,
    InteractionKind::Scan,
];

/// Growth of `current` over `previous` in percent.
///
/// A previous total of zero counts as +100% when anything happened now, and
/// 0% otherwise, so the result is always finite.
pub fn growth_pct(current_total: u64, previous_total: u64) -> f64 {
    if previous_total == 0 {
        return if current_total > 0 { 100.0 } else { 0.0 };
    }
    (current_total as f64 - previous_total as f64) / previous_total as f64 * 100.0
}

/// Pulse score (0-100) from weighted activity and growth.
pub fn pulse_score(weighted_activity: f64, growth: f64, weights: &PulseWeights) -> f64 {
    if weighted_activity <= 0.0 {
        return 0.0;
    }
    let activity =
        ((1.0 + weighted_activity).ln() / (1.0 + weights.activity_saturation).ln()).min(1.0);
    let momentum = (growth.clamp(-100.0, weights.growth_cap) + 100.0) / (weights.growth_cap + 100.0);
    let share = weights.activity_share.clamp(0.0, 1.0);
    let score = 100.0 * activity * (share + (1.0 - share) * momentum);
    (score.clamp(0.0, 100.0) * 10.0).round() / 10.0
}

/// Score the current window against the previous one.
///
/// `previous` is optional: without it, growth is computed against zero.
pub fn compute_pulse(
    current: &SignalVector,
    previous: Option<&SignalVector>,
    weights: &PulseWeights,
    thresholds: &MomentumThresholds,
) -> Pulse {
    let empty = SignalVector::default();
    let previous = previous.unwrap_or(&empty);

    let growth = growth_pct(current.total(), previous.total());
    let score = pulse_score(weights.weighted_activity(current), growth, weights);

    let mut drivers: Vec<PulseDriver> = KINDS
        .iter()
        .map(|kind| PulseDriver {
            signal: *kind,
            current: current.count(*kind),
            previous: previous.count(*kind),
            weighted_delta: (current.count(*kind) as f64 - previous.count(*kind) as f64)
                * weights.weight(*kind),
        })
        .filter(|d| d.current != d.previous)
        .collect();
    drivers.sort_by(|a, b| {
        b.weighted_delta
            .abs()
            .total_cmp(&a.weighted_delta.abs())
            .then_with(|| a.signal.cmp(&b.signal))
    });

    Pulse {
        pulse_score: score,
        momentum_state: thresholds.classify(growth),
        growth_pct: growth,
        total_activity: current.total(),
        drivers,
    }
}

/// Convenience wrapper over a normalized pair.
pub fn score_signals(
    signals: &NormalizedSignals,
    weights: &PulseWeights,
    thresholds: &MomentumThresholds,
) -> Pulse {
    compute_pulse(&signals.current, Some(&signals.previous), weights, thresholds)
}
