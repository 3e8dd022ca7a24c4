// Auto-moment triggers — real-time velocity and city concentration.
//
// Compares the last hour of interactions against the same hour yesterday.
// Analyzers run in a fixed priority order and the first one that fires
// decides the moment type:
//
// 1. City heat: one city owns a big share of the window, with a floor
// 2. Pulse surge: high velocity multiplier, with a floor
// 3. Moment mattered: the same test at a lower multiplier and floor
//
// A failing analyzer is logged and skipped; it never blocks the rest.

use std::collections::HashMap;

use anyhow::{bail, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::context::MomentContext;
use crate::db::models::MomentType;
use crate::signals::interaction::InteractionRecord;
use crate::signals::normalizer::{top_entry, TopEntry};

/// Tunables for auto moments.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoMomentConfig {
    /// Lookback window (default 60 minutes).
    pub window: Duration,
    /// How far back the baseline window sits (default 24h).
    pub baseline_offset: Duration,
    /// Minimum share of the window owned by one city (default 0.40).
    pub city_heat_share: f64,
    /// Minimum interactions from that city (default 10).
    pub city_heat_floor: u64,
    pub surge_multiplier: f64,
    pub surge_floor: u64,
    pub mattered_multiplier: f64,
    pub mattered_floor: u64,
    /// Velocity reported when the baseline is empty but the window isn't.
    pub zero_baseline_velocity: f64,
    /// At most one auto moment per entity per cooldown (default 6h).
    pub cooldown: Duration,
    pub city_heat_ttl: Duration,
    pub pulse_surge_ttl: Duration,
    pub mattered_ttl: Duration,
}

impl Default for AutoMomentConfig {
    fn default() -> Self {
        Self {
            window: Duration::minutes(60),
            baseline_offset: Duration::hours(24),
            city_heat_share: 0.40,
            city_heat_floor: 10,
            surge_multiplier: 2.5,
            surge_floor: 10,
            mattered_multiplier: 1.5,
            mattered_floor: 5,
            zero_baseline_velocity: 10.0,
            cooldown: Duration::hours(6),
            city_heat_ttl: Duration::hours(24),
            pulse_surge_ttl: Duration::hours(24),
            mattered_ttl: Duration::hours(48),
        }
    }
}

impl AutoMomentConfig {
    pub fn ttl(&self, moment_type: MomentType) -> Duration {
        match moment_type {
            MomentType::CityHeat => self.city_heat_ttl,
            MomentType::PulseSurge => self.pulse_surge_ttl,
            _ => self.mattered_ttl,
        }
    }

    /// The default analyzer chain, in priority order.
    pub fn analyzers(&self) -> Vec<Box<dyn TriggerAnalyzer>> {
        vec![
            Box::new(CityHeat {
                min_share: self.city_heat_share,
                floor: self.city_heat_floor,
            }),
            Box::new(VelocityTrigger {
                moment_type: MomentType::PulseSurge,
                multiplier: self.surge_multiplier,
                floor: self.surge_floor,
            }),
            Box::new(VelocityTrigger {
                moment_type: MomentType::MomentMattered,
                multiplier: self.mattered_multiplier,
                floor: self.mattered_floor,
            }),
        ]
    }
}

/// Window vs. baseline summary that every analyzer reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub window_minutes: i64,
    pub window_count: u64,
    pub baseline_count: u64,
    pub velocity: f64,
    pub top_city: Option<TopEntry>,
    /// Top city's share of the window (0.0 when the window is empty).
    pub city_share: f64,
}

impl WindowStats {
    pub fn compute(
        window: &[InteractionRecord],
        baseline_count: u64,
        window_len: Duration,
        zero_baseline_velocity: f64,
    ) -> Self {
        let window_count = window.len() as u64;

        let mut cities: HashMap<&str, u64> = HashMap::new();
        for record in window {
            if let Some(city) = record.city() {
                *cities.entry(city).or_default() += 1;
            }
        }
        let top_city = top_entry(cities.into_iter().map(|(k, v)| (k.to_string(), v)));
        let city_share = match (&top_city, window_count) {
            (Some(top), n) if n > 0 => top.count as f64 / n as f64,
            _ => 0.0,
        };

        Self {
            window_minutes: window_len.num_minutes(),
            window_count,
            baseline_count,
            velocity: velocity(window_count, baseline_count, zero_baseline_velocity),
            top_city,
            city_share,
        }
    }

    pub fn to_context(&self, band_name: &str) -> MomentContext {
        MomentContext {
            band_name: band_name.to_string(),
            window_minutes: self.window_minutes,
            window_count: self.window_count,
            baseline_count: self.baseline_count,
            velocity: self.velocity,
            city: self.top_city.as_ref().map(|c| c.name.clone()),
            city_count: self.top_city.as_ref().map(|c| c.count),
            city_share: self.top_city.as_ref().map(|_| self.city_share),
            ..MomentContext::default()
        }
    }
}

/// Window / baseline ratio. An empty baseline yields a large finite ratio
/// when there is activity now, and 0 when there isn't.
pub fn velocity(window_count: u64, baseline_count: u64, zero_baseline_velocity: f64) -> f64 {
    if baseline_count == 0 {
        return if window_count > 0 {
            zero_baseline_velocity
        } else {
            0.0
        };
    }
    window_count as f64 / baseline_count as f64
}

/// One trigger rule.
pub trait TriggerAnalyzer: Send + Sync {
    fn name(&self) -> &'static str;

    /// The moment type to mint, or None if this rule doesn't fire.
    fn analyze(&self, stats: &WindowStats) -> Result<Option<MomentType>>;
}

/// One city accounts for a large share of the window.
pub struct CityHeat {
    pub min_share: f64,
    pub floor: u64,
}

impl TriggerAnalyzer for CityHeat {
    fn name(&self) -> &'static str {
        "city_heat"
    }

    fn analyze(&self, stats: &WindowStats) -> Result<Option<MomentType>> {
        if !stats.city_share.is_finite() {
            bail!("city share is not finite: {}", stats.city_share);
        }
        let Some(top) = &stats.top_city else {
            return Ok(None);
        };
        let fires = stats.city_share >= self.min_share && top.count >= self.floor;
        Ok(fires.then_some(MomentType::CityHeat))
    }
}

/// Window count and velocity both clear their bars.
pub struct VelocityTrigger {
    pub moment_type: MomentType,
    pub multiplier: f64,
    pub floor: u64,
}

impl TriggerAnalyzer for VelocityTrigger {
    fn name(&self) -> &'static str {
        match self.moment_type {
            MomentType::PulseSurge => "pulse_surge",
            _ => "moment_mattered",
        }
    }

    fn analyze(&self, stats: &WindowStats) -> Result<Option<MomentType>> {
        if !stats.velocity.is_finite() {
            bail!("velocity is not finite: {}", stats.velocity);
        }
        let fires = stats.window_count >= self.floor && stats.velocity >= self.multiplier;
        Ok(fires.then_some(self.moment_type))
    }
}

/// Run analyzers in order and return the first hit with its analyzer name.
pub fn first_trigger(
    analyzers: &[Box<dyn TriggerAnalyzer>],
    stats: &WindowStats,
) -> Option<(MomentType, &'static str)> {
    for analyzer in analyzers {
        match analyzer.analyze(stats) {
            Ok(Some(moment_type)) => return Some((moment_type, analyzer.name())),
            Ok(None) => {}
            Err(e) => {
                warn!(
                    analyzer = analyzer.name(),
                    error = %e,
                    "Trigger analyzer failed, treating as no trigger"
                );
            }
        }
    }
    None
}
