// Data models — Rust structs that map to database rows.
//
// These are the types that flow through the engine. They're separate from
// the database queries so other modules can use them without depending on
// rusqlite directly.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// The kinds of things we measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Band,
    Event,
    Qr,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Band => "band",
            EntityType::Event => "event",
            EntityType::Qr => "qr",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "band" => Ok(EntityType::Band),
            "event" => Ok(EntityType::Event),
            "qr" | "qr_code" | "qrcode" => Ok(EntityType::Qr),
            other => Err(format!(
                "unknown entity type '{other}' (expected band, event or qr)"
            )),
        }
    }
}

/// Reference to a measured entity. Ids are only unique within a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub entity_id: i64,
}

impl EntityRef {
    pub fn new(entity_type: EntityType, entity_id: i64) -> Self {
        Self {
            entity_type,
            entity_id,
        }
    }

    pub fn band(entity_id: i64) -> Self {
        Self::new(EntityType::Band, entity_id)
    }

    /// Key used for locks and rate-limit state, e.g. "band:42".
    pub fn key(&self) -> String {
        format!("{}:{}", self.entity_type, self.entity_id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_type, self.entity_id)
    }
}

/// A registered entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(flatten)]
    pub entity: EntityRef,
    pub name: String,
    #[serde(default)]
    pub owner_id: Option<i64>,
}

/// The user who owns one or more entities and receives their notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerProfile {
    pub owner_id: i64,
    #[serde(default)]
    pub push_opt_in: bool,
    pub created_at: DateTime<Utc>,
}

/// Momentum buckets, ordered from coldest to hottest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentumState {
    Cooling,
    Steady,
    Warming,
    Surging,
}

impl MomentumState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MomentumState::Cooling => "cooling",
            MomentumState::Steady => "steady",
            MomentumState::Warming => "warming",
            MomentumState::Surging => "surging",
        }
    }

    /// Steady and cooling are the "quiet" states that re-arm surge pushes.
    pub fn is_quiet(&self) -> bool {
        matches!(self, MomentumState::Cooling | MomentumState::Steady)
    }
}

impl fmt::Display for MomentumState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MomentumState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cooling" => Ok(MomentumState::Cooling),
            "steady" => Ok(MomentumState::Steady),
            "warming" => Ok(MomentumState::Warming),
            "surging" => Ok(MomentumState::Surging),
            other => Err(format!("unknown momentum state '{other}'")),
        }
    }
}

/// Last computed pulse for an entity and range. The only state carried
/// between evaluations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseSnapshot {
    pub entity: EntityRef,
    pub range_key: String,
    pub pulse_score: f64,
    pub momentum_state: MomentumState,
    pub total_activity: i64,
    pub growth_pct: f64,
    pub last_momentum_change_at: Option<DateTime<Utc>>,
    pub last_surge_push_at: Option<DateTime<Utc>>,
    pub surge_push_sent: bool,
    pub updated_at: DateTime<Utc>,
}

/// A push notification queued for the notification subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub owner_id: i64,
    pub entity: EntityRef,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Kinds of shareable moments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentType {
    CityHeat,
    PulseSurge,
    MomentMattered,
    ShowRecap,
    FanCheckIn,
}

impl MomentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MomentType::CityHeat => "city_heat",
            MomentType::PulseSurge => "pulse_surge",
            MomentType::MomentMattered => "moment_mattered",
            MomentType::ShowRecap => "show_recap",
            MomentType::FanCheckIn => "fan_check_in",
        }
    }
}

impl fmt::Display for MomentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MomentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "city_heat" => Ok(MomentType::CityHeat),
            "pulse_surge" => Ok(MomentType::PulseSurge),
            "moment_mattered" => Ok(MomentType::MomentMattered),
            "show_recap" => Ok(MomentType::ShowRecap),
            "fan_check_in" => Ok(MomentType::FanCheckIn),
            other => Err(format!("unknown moment type '{other}'")),
        }
    }
}

/// Action type recorded on system-triggered moments.
pub const ACTION_AUTO: &str = "AUTO";
/// Action type recorded on recap moments.
pub const ACTION_RECAP: &str = "RECAP";

/// A shareable moment. Fan-initiated moments carry a visitor id; system
/// moments carry the AUTO / RECAP action type instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanMoment {
    pub id: i64,
    pub entity: EntityRef,
    pub visitor_id: Option<String>,
    pub action_type: String,
    pub moment_type: MomentType,
    pub share_copy: String,
    pub context: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl FanMoment {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Format a timestamp the way every table stores it. Fixed-width millisecond
/// RFC 3339 in UTC, so string comparison in SQL matches time order.
pub fn to_db_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp back into UTC.
pub fn parse_db_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
