// Show recap — the densest stretch of a longer lookback.
//
// Instead of fixed buckets, a window of `window_width` slides across the
// sorted timestamps and the start with the most interactions wins (earliest
// on ties). The peak has to clear `min_peak_count` to be worth a recap.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::context::MomentContext;
use crate::signals::interaction::InteractionRecord;
use crate::signals::normalizer::{top_entry, TopEntry};

#[derive(Debug, Clone, PartialEq)]
pub struct RecapConfig {
    /// How far back to scan (default 6h).
    pub lookback: Duration,
    /// Width of the sliding window (default 30 minutes).
    pub window_width: Duration,
    /// Minimum interactions in the peak window (default 20).
    pub min_peak_count: u64,
    /// At most one recap per entity per cooldown (default 12h).
    pub cooldown: Duration,
    /// Recaps live longer than real-time moments (default 72h).
    pub ttl: Duration,
}

impl Default for RecapConfig {
    fn default() -> Self {
        Self {
            lookback: Duration::hours(6),
            window_width: Duration::minutes(30),
            min_peak_count: 20,
            cooldown: Duration::hours(12),
            ttl: Duration::hours(72),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecapSummary {
    pub peak: PeakWindow,
    pub lookback_count: u64,
    pub top_city: Option<TopEntry>,
    pub top_link: Option<TopEntry>,
    pub top_media: Option<TopEntry>,
}

impl RecapSummary {
    pub fn to_context(&self, band_name: &str, window_width: Duration) -> MomentContext {
        MomentContext {
            band_name: band_name.to_string(),
            window_minutes: window_width.num_minutes(),
            window_count: self.peak.count,
            baseline_count: self.lookback_count,
            velocity: 0.0,
            city: self.top_city.as_ref().map(|c| c.name.clone()),
            city_count: self.top_city.as_ref().map(|c| c.count),
            city_share: self
                .top_city
                .as_ref()
                .filter(|_| self.peak.count > 0)
                .map(|c| c.count as f64 / self.peak.count as f64),
            peak_start: Some(self.peak.start),
            peak_end: Some(self.peak.end),
            top_link: self.top_link.as_ref().map(|l| l.name.clone()),
            top_media: self.top_media.as_ref().map(|m| m.name.clone()),
            action: None,
        }
    }
}

/// Densest `[start, start + width)` window whose start is one of the
/// timestamps. Returns None for empty input.
pub fn find_peak_window(timestamps: &[DateTime<Utc>], width: Duration) -> Option<PeakWindow> {
    let mut sorted = timestamps.to_vec();
    sorted.sort_unstable();

    let mut best: Option<PeakWindow> = None;
    let mut j = 0;
    for (i, start) in sorted.iter().enumerate() {
        let end = *start + width;
        if j < i {
            j = i;
        }
        while j < sorted.len() && sorted[j] < end {
            j += 1;
        }
        let count = (j - i) as u64;
        if best.as_ref().map_or(true, |b| count > b.count) {
            best = Some(PeakWindow {
                start: *start,
                end,
                count,
            });
        }
    }
    best
}

/// Summarize the peak of `records`, or None if it doesn't clear the bar.
pub fn summarize(records: &[InteractionRecord], config: &RecapConfig) -> Option<RecapSummary> {
    let timestamps: Vec<DateTime<Utc>> = records.iter().map(|r| r.occurred_at()).collect();
    let peak = find_peak_window(&timestamps, config.window_width)?;
    if peak.count < config.min_peak_count {
        return None;
    }

    let mut cities: HashMap<&str, u64> = HashMap::new();
    let mut links: HashMap<&str, u64> = HashMap::new();
    let mut media: HashMap<&str, u64> = HashMap::new();
    for record in records
        .iter()
        .filter(|r| r.occurred_at() >= peak.start && r.occurred_at() < peak.end)
    {
        if let Some(city) = record.city() {
            *cities.entry(city).or_default() += 1;
        }
        if let Some(link) = record.link_label() {
            *links.entry(link).or_default() += 1;
        }
        if let Some(m) = record.media_label() {
            *media.entry(m).or_default() += 1;
        }
    }

    let owned = |m: HashMap<&str, u64>| top_entry(m.into_iter().map(|(k, v)| (k.to_string(), v)));
    Some(RecapSummary {
        peak,
        lookback_count: records.len() as u64,
        top_city: owned(cities),
        top_link: owned(links),
        top_media: owned(media),
    })
}
