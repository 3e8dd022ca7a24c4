// Share copy templates.
//
// Templates use `{name}` placeholders filled from MomentContext. Unknown
// placeholders are left as written so a typo shows up in review instead of
// silently vanishing.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex_lite::{Captures, Regex};

use super::context::MomentContext;
use crate::db::models::MomentType;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder regex is valid"))
}

/// Default template for each moment type.
pub fn template_for(moment_type: MomentType) -> &'static str {
    match moment_type {
        MomentType::CityHeat => {
            "{city} is lighting up for {band}! {city_count} fans tuned in over the last {window_minutes} minutes."
        }
        MomentType::PulseSurge => {
            "{band} is surging right now: {count} fans in {window_minutes} minutes, {velocity}x the usual pace."
        }
        MomentType::MomentMattered => {
            "Something is happening with {band}. Fan activity is running {velocity}x normal."
        }
        MomentType::ShowRecap => {
            "Show recap: {count} fans showed up for {band} at the peak, loudest in {city}. Most played: {top_media}."
        }
        MomentType::FanCheckIn => "I {action} for {band}.",
    }
}

/// Fill `{name}` placeholders from `vars`.
pub fn render(template: &str, vars: &HashMap<&'static str, String>) -> String {
    placeholder_re()
        .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Share copy for a moment.
pub fn share_copy(moment_type: MomentType, context: &MomentContext) -> String {
    render(template_for(moment_type), &context.template_vars())
}
