use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::Duration;

use crate::moments::recap::RecapConfig;
use crate::moments::triggers::AutoMomentConfig;
use crate::pipeline::fan_moment::FanMomentConfig;
use crate::scoring::pulse::{MomentumThresholds, PulseWeights};
use crate::scoring::surge::SurgePolicy;

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy. Every
/// value has a default, so an empty environment is a valid configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: String,
    /// Maximum interaction rows read per window.
    pub fetch_limit: usize,
    /// Entities evaluated in parallel during a sweep.
    pub sweep_concurrency: usize,
    pub min_account_age_days: i64,
    pub push_cooldown_hours: i64,
    pub auto_cooldown_hours: i64,
    pub recap_cooldown_hours: i64,
    pub fan_moment_hourly_cap: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "./bandpulse.db".to_string(),
            fetch_limit: 50_000,
            sweep_concurrency: 8,
            min_account_age_days: 7,
            push_cooldown_hours: 12,
            auto_cooldown_hours: 6,
            recap_cooldown_hours: 12,
            fan_moment_hourly_cap: 200,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup. Unset keys take their default;
    /// set but unparseable numbers are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            db_path: lookup("BANDPULSE_DB_PATH")
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(defaults.db_path),
            fetch_limit: number(&lookup, "BANDPULSE_FETCH_LIMIT", defaults.fetch_limit)?,
            sweep_concurrency: number(
                &lookup,
                "BANDPULSE_SWEEP_CONCURRENCY",
                defaults.sweep_concurrency,
            )?,
            min_account_age_days: number(
                &lookup,
                "BANDPULSE_MIN_ACCOUNT_AGE_DAYS",
                defaults.min_account_age_days,
            )?,
            push_cooldown_hours: number(
                &lookup,
                "BANDPULSE_PUSH_COOLDOWN_HOURS",
                defaults.push_cooldown_hours,
            )?,
            auto_cooldown_hours: number(
                &lookup,
                "BANDPULSE_AUTO_COOLDOWN_HOURS",
                defaults.auto_cooldown_hours,
            )?,
            recap_cooldown_hours: number(
                &lookup,
                "BANDPULSE_RECAP_COOLDOWN_HOURS",
                defaults.recap_cooldown_hours,
            )?,
            fan_moment_hourly_cap: number(
                &lookup,
                "BANDPULSE_FAN_MOMENT_HOURLY_CAP",
                defaults.fan_moment_hourly_cap,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.fetch_limit == 0 {
            anyhow::bail!("BANDPULSE_FETCH_LIMIT must be at least 1");
        }
        if self.sweep_concurrency == 0 {
            anyhow::bail!("BANDPULSE_SWEEP_CONCURRENCY must be at least 1");
        }
        let bounded = [
            ("BANDPULSE_MIN_ACCOUNT_AGE_DAYS", self.min_account_age_days, MAX_DAYS),
            ("BANDPULSE_PUSH_COOLDOWN_HOURS", self.push_cooldown_hours, MAX_HOURS),
            ("BANDPULSE_AUTO_COOLDOWN_HOURS", self.auto_cooldown_hours, MAX_HOURS),
            ("BANDPULSE_RECAP_COOLDOWN_HOURS", self.recap_cooldown_hours, MAX_HOURS),
            ("BANDPULSE_FAN_MOMENT_HOURLY_CAP", self.fan_moment_hourly_cap, i64::MAX),
        ];
        for (name, value, max) in bounded {
            if value < 0 {
                anyhow::bail!("{name} must not be negative (got {value})");
            }
            if value > max {
                anyhow::bail!("{name} must be at most {max} (got {value})");
            }
        }
        Ok(())
    }

    /// Engine tunables with the configured overrides applied.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let defaults = EngineConfig::default();
        Ok(EngineConfig {
            fetch_limit: self.fetch_limit,
            surge: SurgePolicy {
                min_account_age: days("BANDPULSE_MIN_ACCOUNT_AGE_DAYS", self.min_account_age_days)?,
                push_cooldown: hours("BANDPULSE_PUSH_COOLDOWN_HOURS", self.push_cooldown_hours)?,
            },
            auto_moment: AutoMomentConfig {
                cooldown: hours("BANDPULSE_AUTO_COOLDOWN_HOURS", self.auto_cooldown_hours)?,
                ..defaults.auto_moment
            },
            recap: RecapConfig {
                cooldown: hours("BANDPULSE_RECAP_COOLDOWN_HOURS", self.recap_cooldown_hours)?,
                ..defaults.recap
            },
            fan_moment: FanMomentConfig {
                hourly_cap: self.fan_moment_hourly_cap,
                ..defaults.fan_moment
            },
            ..defaults
        })
    }
}

/// Ten years; longer cooldowns or account ages are a typo.
const MAX_DAYS: i64 = 3_650;
const MAX_HOURS: i64 = MAX_DAYS * 24;

fn days(key: &str, value: i64) -> Result<Duration> {
    Duration::try_days(value).with_context(|| format!("{key} is out of range (got {value})"))
}

fn hours(key: &str, value: i64) -> Result<Duration> {
    Duration::try_hours(value).with_context(|| format!("{key} is out of range (got {value})"))
}

fn number<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a number, got '{raw}'")),
        _ => Ok(default),
    }
}

/// Every scoring and rate-limit tunable the engine uses.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub fetch_limit: usize,
    pub weights: PulseWeights,
    pub thresholds: MomentumThresholds,
    pub surge: SurgePolicy,
    pub auto_moment: AutoMomentConfig,
    pub recap: RecapConfig,
    pub fan_moment: FanMomentConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch_limit: 50_000,
            weights: PulseWeights::default(),
            thresholds: MomentumThresholds::default(),
            surge: SurgePolicy::default(),
            auto_moment: AutoMomentConfig::default(),
            recap: RecapConfig::default(),
            fan_moment: FanMomentConfig::default(),
        }
    }
}
