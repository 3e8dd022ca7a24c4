// Typed interaction records.
//
// Tracking endpoints write one row per observed event. Rows are immutable
// once written. The `kind` tag picks the variant; the common fields are
// flattened into the same JSON object so an import file reads naturally:
//
//   {"kind":"link_click","entity_type":"band","entity_id":7,
//    "occurred_at":"2026-05-01T20:14:03Z","city":"Austin","platform":"spotify"}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{EntityRef, EntityType};

/// Fields every interaction carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionCommon {
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub occurred_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

impl InteractionCommon {
    pub fn new(entity: EntityRef, occurred_at: DateTime<Utc>) -> Self {
        Self {
            entity_type: entity.entity_type,
            entity_id: entity.entity_id,
            occurred_at,
            city: None,
            region: None,
            country: None,
            device: None,
            referrer: None,
        }
    }

    pub fn with_city(mut self, city: &str) -> Self {
        self.city = Some(city.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    PageView,
    LinkClick,
    MediaPlay,
    Scan,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::PageView => "page_view",
            InteractionKind::LinkClick => "link_click",
            InteractionKind::MediaPlay => "media_play",
            InteractionKind::Scan => "scan",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "page_view" => Some(InteractionKind::PageView),
            "link_click" => Some(InteractionKind::LinkClick),
            "media_play" => Some(InteractionKind::MediaPlay),
            "scan" => Some(InteractionKind::Scan),
            _ => None,
        }
    }
}

/// One observed interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InteractionRecord {
    PageView {
        #[serde(flatten)]
        common: InteractionCommon,
    },
    LinkClick {
        #[serde(flatten)]
        common: InteractionCommon,
        /// Destination platform, e.g. "spotify" or "bandcamp".
        #[serde(default, skip_serializing_if = "Option::is_none")]
        platform: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    MediaPlay {
        #[serde(flatten)]
        common: InteractionCommon,
        /// Media host, e.g. "youtube".
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_id: Option<String>,
    },
    Scan {
        #[serde(flatten)]
        common: InteractionCommon,
    },
}

impl InteractionRecord {
    pub fn page_view(common: InteractionCommon) -> Self {
        InteractionRecord::PageView { common }
    }

    pub fn scan(common: InteractionCommon) -> Self {
        InteractionRecord::Scan { common }
    }

    pub fn link_click(common: InteractionCommon, platform: &str, url: Option<&str>) -> Self {
        InteractionRecord::LinkClick {
            common,
            platform: Some(platform.to_string()),
            url: url.map(str::to_string),
        }
    }

    pub fn media_play(common: InteractionCommon, provider: &str, media_id: Option<&str>) -> Self {
        InteractionRecord::MediaPlay {
            common,
            provider: Some(provider.to_string()),
            media_id: media_id.map(str::to_string),
        }
    }

    pub fn kind(&self) -> InteractionKind {
        match self {
            InteractionRecord::PageView { .. } => InteractionKind::PageView,
            InteractionRecord::LinkClick { .. } => InteractionKind::LinkClick,
            InteractionRecord::MediaPlay { .. } => InteractionKind::MediaPlay,
            InteractionRecord::Scan { .. } => InteractionKind::Scan,
        }
    }

    pub fn common(&self) -> &InteractionCommon {
        match self {
            InteractionRecord::PageView { common }
            | InteractionRecord::LinkClick { common, .. }
            | InteractionRecord::MediaPlay { common, .. }
            | InteractionRecord::Scan { common } => common,
        }
    }

    pub fn entity(&self) -> EntityRef {
        let c = self.common();
        EntityRef::new(c.entity_type, c.entity_id)
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.common().occurred_at
    }

    /// City with surrounding whitespace removed; blank cities count as unknown.
    pub fn city(&self) -> Option<&str> {
        self.common()
            .city
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Link platform for clicks, media provider for plays.
    pub fn platform(&self) -> Option<&str> {
        let raw = match self {
            InteractionRecord::LinkClick { platform, .. } => platform.as_deref(),
            InteractionRecord::MediaPlay { provider, .. } => provider.as_deref(),
            _ => None,
        };
        raw.map(str::trim).filter(|p| !p.is_empty())
    }

    /// Link URL (falling back to the platform) for clicks.
    pub fn link_label(&self) -> Option<&str> {
        match self {
            InteractionRecord::LinkClick { url, platform, .. } => {
                url.as_deref().or(platform.as_deref())
            }
            _ => None,
        }
    }

    /// Media id (falling back to the provider) for plays.
    pub fn media_label(&self) -> Option<&str> {
        match self {
            InteractionRecord::MediaPlay {
                media_id, provider, ..
            } => media_id.as_deref().or(provider.as_deref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_tagged_record() {
        let json = r#"{"kind":"link_click","entity_type":"band","entity_id":7,
            "occurred_at":"2026-05-01T20:14:03Z","city":"Austin","platform":"spotify"}"#;
        let rec: InteractionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.kind(), InteractionKind::LinkClick);
        assert_eq!(rec.entity(), EntityRef::band(7));
        assert_eq!(rec.city(), Some("Austin"));
        assert_eq!(rec.platform(), Some("spotify"));
        assert_eq!(rec.link_label(), Some("spotify"));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let json = r#"{"kind":"like","entity_type":"band","entity_id":7,
            "occurred_at":"2026-05-01T20:14:03Z"}"#;
        assert!(serde_json::from_str::<InteractionRecord>(json).is_err());
    }

    #[test]
    fn test_blank_city_is_unknown() {
        let json = r#"{"kind":"scan","entity_type":"qr","entity_id":3,
            "occurred_at":"2026-05-01T20:14:03Z","city":"  "}"#;
        let rec: InteractionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.city(), None);
        assert_eq!(rec.platform(), None);
    }
}
