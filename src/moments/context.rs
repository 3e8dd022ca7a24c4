// Moment context — the numbers behind a moment, stored as JSON on the row
// and interpolated into its share copy.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MomentContext {
    pub band_name: String,
    pub window_minutes: i64,
    pub window_count: u64,
    pub baseline_count: u64,
    pub velocity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_share: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_media: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl MomentContext {
    /// Placeholder values for share-copy templates. Missing values get a
    /// neutral phrase so copy never shows a raw `{placeholder}`.
    pub fn template_vars(&self) -> HashMap<&'static str, String> {
        let mut vars = HashMap::new();
        vars.insert("band", self.band_name.clone());
        vars.insert("window_minutes", self.window_minutes.to_string());
        vars.insert("count", self.window_count.to_string());
        vars.insert("baseline", self.baseline_count.to_string());
        vars.insert("velocity", format!("{:.1}", self.velocity));
        vars.insert(
            "city",
            self.city.clone().unwrap_or_else(|| "the crowd".to_string()),
        );
        vars.insert(
            "city_count",
            self.city_count.unwrap_or(self.window_count).to_string(),
        );
        vars.insert(
            "city_share",
            format!("{:.0}", self.city_share.unwrap_or(0.0) * 100.0),
        );
        vars.insert(
            "top_link",
            self.top_link.clone().unwrap_or_else(|| "the links".to_string()),
        );
        vars.insert(
            "top_media",
            self.top_media.clone().unwrap_or_else(|| "the set".to_string()),
        );
        vars.insert(
            "action",
            self.action.clone().unwrap_or_else(|| "was there".to_string()),
        );
        vars
    }
}
