// Evaluation ranges and the time windows they cover.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// How far back a pulse evaluation looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RangeKey {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl RangeKey {
    pub const ALL: [RangeKey; 3] = [RangeKey::Day, RangeKey::Week, RangeKey::Month];

    pub fn as_str(&self) -> &'static str {
        match self {
            RangeKey::Day => "24h",
            RangeKey::Week => "7d",
            RangeKey::Month => "30d",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            RangeKey::Day => Duration::hours(24),
            RangeKey::Week => Duration::days(7),
            RangeKey::Month => Duration::days(30),
        }
    }

    /// Human-readable phrase for notification copy.
    pub fn phrase(&self) -> &'static str {
        match self {
            RangeKey::Day => "the last 24 hours",
            RangeKey::Week => "the last 7 days",
            RangeKey::Month => "the last 30 days",
        }
    }

    /// The window ending at `now`.
    pub fn current_window(&self, now: DateTime<Utc>) -> TimeWindow {
        TimeWindow::ending_at(now, self.duration())
    }

    /// The equal-length window immediately before the current one.
    pub fn previous_window(&self, now: DateTime<Utc>) -> TimeWindow {
        TimeWindow::ending_at(now - self.duration(), self.duration())
    }
}

impl fmt::Display for RangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RangeKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "24h" | "1d" => Ok(RangeKey::Day),
            "7d" => Ok(RangeKey::Week),
            "30d" => Ok(RangeKey::Month),
            "" => Err("range is required (24h, 7d or 30d)".to_string()),
            other => Err(format!("unknown range '{other}' (expected 24h, 7d or 30d)")),
        }
    }
}

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn ending_at(end: DateTime<Utc>, length: Duration) -> Self {
        Self {
            start: end - length,
            end,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }

    pub fn length(&self) -> Duration {
        self.end - self.start
    }

    /// Every UTC calendar day the window touches, oldest first.
    pub fn days(&self) -> Vec<NaiveDate> {
        if self.end <= self.start {
            return Vec::new();
        }
        let first = self.start.date_naive();
        // `end` is exclusive, so the last touched instant is just before it.
        let last = (self.end - Duration::milliseconds(1)).date_naive();
        first.iter_days().take_while(|d| *d <= last).collect()
    }
}
