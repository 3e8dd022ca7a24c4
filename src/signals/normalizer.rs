// Signal normalizer — raw interaction rows -> unified signal vectors.
//
// Pure functions: no I/O, no clock. Empty input yields zeroed vectors and
// never fails. Records outside the requested window are ignored so callers
// can hand over whatever the store returned without pre-filtering.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::interaction::{InteractionKind, InteractionRecord};
use super::range::{RangeKey, TimeWindow};

/// Per-kind counts for one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub views: u64,
    pub clicks: u64,
    pub plays: u64,
    pub scans: u64,
}

impl DayBucket {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            views: 0,
            clicks: 0,
            plays: 0,
            scans: 0,
        }
    }

    pub fn total(&self) -> u64 {
        self.views + self.clicks + self.plays + self.scans
    }
}

/// A named count, e.g. the top city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopEntry {
    pub name: String,
    pub count: u64,
}

/// Unified signal vector for one entity over one window.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalVector {
    pub views: u64,
    pub clicks: u64,
    pub plays: u64,
    pub scans: u64,
    pub by_day: Vec<DayBucket>,
    pub top_city: Option<TopEntry>,
    pub top_platform: Option<TopEntry>,
}

impl SignalVector {
    pub fn total(&self) -> u64 {
        self.views + self.clicks + self.plays + self.scans
    }

    pub fn count(&self, kind: InteractionKind) -> u64 {
        match kind {
            InteractionKind::PageView => self.views,
            InteractionKind::LinkClick => self.clicks,
            InteractionKind::MediaPlay => self.plays,
            InteractionKind::Scan => self.scans,
        }
    }

    /// A zeroed vector for a window (days still listed).
    pub fn zeroed(window: &TimeWindow) -> Self {
        normalize(&[], window)
    }
}

/// Current and previous vectors for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSignals {
    pub range: RangeKey,
    pub current: SignalVector,
    pub previous: SignalVector,
    /// True when at least one window could not be fetched and was zeroed.
    pub degraded: bool,
}

/// Build the signal vector for the records that fall inside `window`.
pub fn normalize(records: &[InteractionRecord], window: &TimeWindow) -> SignalVector {
    let mut days: BTreeMap<NaiveDate, DayBucket> = window
        .days()
        .into_iter()
        .map(|d| (d, DayBucket::empty(d)))
        .collect();

    let mut vector = SignalVector::default();
    let mut cities: HashMap<&str, u64> = HashMap::new();
    let mut platforms: HashMap<String, u64> = HashMap::new();

    for record in records.iter().filter(|r| window.contains(r.occurred_at())) {
        let date = record.occurred_at().date_naive();
        let day = days.entry(date).or_insert_with(|| DayBucket::empty(date));

        match record.kind() {
            InteractionKind::PageView => {
                vector.views += 1;
                day.views += 1;
            }
            InteractionKind::LinkClick => {
                vector.clicks += 1;
                day.clicks += 1;
            }
            InteractionKind::MediaPlay => {
                vector.plays += 1;
                day.plays += 1;
            }
            InteractionKind::Scan => {
                vector.scans += 1;
                day.scans += 1;
            }
        }

        if let Some(city) = record.city() {
            *cities.entry(city).or_default() += 1;
        }
        if let Some(platform) = record.platform() {
            *platforms.entry(platform.to_ascii_lowercase()).or_default() += 1;
        }
    }

    vector.by_day = days.into_values().collect();
    vector.top_city = top_entry(cities.into_iter().map(|(k, v)| (k.to_string(), v)));
    vector.top_platform = top_entry(platforms.into_iter());
    vector
}

/// Normalize both windows of a range evaluation.
pub fn normalize_pair(
    range: RangeKey,
    current: &[InteractionRecord],
    current_window: &TimeWindow,
    previous: &[InteractionRecord],
    previous_window: &TimeWindow,
) -> NormalizedSignals {
    NormalizedSignals {
        range,
        current: normalize(current, current_window),
        previous: normalize(previous, previous_window),
        degraded: false,
    }
}

/// Highest count wins; ties go to the alphabetically first name so the
/// result doesn't depend on hash order.
pub fn top_entry(counts: impl Iterator<Item = (String, u64)>) -> Option<TopEntry> {
    counts
        .filter(|(_, count)| *count > 0)
        .max_by(|(a_name, a), (b_name, b)| a.cmp(b).then_with(|| b_name.cmp(a_name)))
        .map(|(name, count)| TopEntry { name, count })
}
