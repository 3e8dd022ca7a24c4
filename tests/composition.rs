// Composition tests — verifying that pure functions chain together correctly.
//
// These tests exercise the data flow between modules:
//   Interactions -> Normalizer -> Pulse -> Surge -> Snapshot / Notification
//   Interactions -> WindowStats -> Triggers -> Context -> Share copy
// without any database access or clock reads.

use chrono::{DateTime, Duration, TimeZone, Utc};

use bandpulse::db::models::{Entity, EntityRef, MomentType, MomentumState, OwnerProfile};
use bandpulse::moments::copy::share_copy;
use bandpulse::moments::recap::{summarize, RecapConfig};
use bandpulse::moments::triggers::{first_trigger, AutoMomentConfig, WindowStats};
use bandpulse::scoring::pulse::{score_signals, MomentumThresholds, PulseWeights};
use bandpulse::scoring::surge::{
    build_notification, evaluate_surge, next_snapshot, SkipReason, SurgeDecision, SurgePolicy,
};
use bandpulse::signals::interaction::{InteractionCommon, InteractionRecord};
use bandpulse::signals::normalizer::normalize_pair;
use bandpulse::signals::range::RangeKey;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 21, 0, 0).unwrap()
}

fn band() -> Entity {
    Entity {
        entity: EntityRef::band(1),
        name: "The Lanterns".to_string(),
        owner_id: Some(9),
    }
}

fn owner() -> OwnerProfile {
    OwnerProfile {
        owner_id: 9,
        push_opt_in: true,
        created_at: now() - Duration::days(90),
    }
}

fn views(end: DateTime<Utc>, n: usize, city: Option<&str>) -> Vec<InteractionRecord> {
    (0..n)
        .map(|i| {
            let mut c = InteractionCommon::new(EntityRef::band(1), end - Duration::minutes(i as i64 + 1));
            c.city = city.map(str::to_string);
            InteractionRecord::page_view(c)
        })
        .collect()
}

// ============================================================
// Chain: Normalizer -> Pulse -> Surge -> Snapshot
// ============================================================

#[test]
fn surge_chain_pushes_once_then_rearms_when_quiet() {
    let range = RangeKey::Day;
    let weights = PulseWeights::default();
    let thresholds = MomentumThresholds::default();
    let policy = SurgePolicy::default();

    let evaluate = |at: DateTime<Utc>, previous_n: usize, current_n: usize| {
        let previous = views(at - range.duration(), previous_n, None);
        let current = views(at, current_n, Some("Austin"));
        let signals = normalize_pair(
            range,
            &current,
            &range.current_window(at),
            &previous,
            &range.previous_window(at),
        );
        let pulse = score_signals(&signals, &weights, &thresholds);
        (signals, pulse)
    };

    // Surge: 10 -> 30
    let (signals, pulse) = evaluate(now(), 10, 30);
    assert_eq!(pulse.momentum_state, MomentumState::Surging);
    let decision = evaluate_surge(None, pulse.momentum_state, Some(&owner()), now(), &policy);
    assert_eq!(decision, SurgeDecision::Push);
    let notification = build_notification(&owner(), &band(), &signals, &pulse, now());
    assert_eq!(
        notification.body,
        "Activity is up 200% over the last 24 hours (30 interactions). Austin is leading the way."
    );
    let snap1 = next_snapshot(None, &band(), range, &pulse, decision, now());
    assert!(snap1.surge_push_sent);

    // Still surging an hour later: no second push
    let t2 = now() + Duration::hours(1);
    let (_, pulse2) = evaluate(t2, 10, 30);
    let decision2 = evaluate_surge(Some(&snap1), pulse2.momentum_state, Some(&owner()), t2, &policy);
    assert_eq!(decision2, SurgeDecision::Skip(SkipReason::NoTransition));
    let snap2 = next_snapshot(Some(&snap1), &band(), range, &pulse2, decision2, t2);
    assert!(snap2.surge_push_sent);
    assert_eq!(snap2.last_momentum_change_at, snap1.last_momentum_change_at);

    // Steady the next day re-arms the flag
    let t3 = now() + Duration::days(1);
    let (_, pulse3) = evaluate(t3, 20, 20);
    assert_eq!(pulse3.momentum_state, MomentumState::Steady);
    let decision3 = evaluate_surge(Some(&snap2), pulse3.momentum_state, Some(&owner()), t3, &policy);
    let snap3 = next_snapshot(Some(&snap2), &band(), range, &pulse3, decision3, t3);
    assert!(!snap3.surge_push_sent);
    assert_eq!(snap3.last_surge_push_at, Some(now()));
    assert_eq!(snap3.last_momentum_change_at, Some(t3));

    // And the next surge, past the cooldown, pushes again
    let t4 = now() + Duration::days(2);
    let (_, pulse4) = evaluate(t4, 10, 30);
    let decision4 = evaluate_surge(Some(&snap3), pulse4.momentum_state, Some(&owner()), t4, &policy);
    assert_eq!(decision4, SurgeDecision::Push);
}

#[test]
fn surge_inside_push_cooldown_is_held() {
    let range = RangeKey::Day;
    let signals = normalize_pair(
        range,
        &views(now(), 30, None),
        &range.current_window(now()),
        &views(now() - range.duration(), 10, None),
        &range.previous_window(now()),
    );
    let pulse = score_signals(
        &signals,
        &PulseWeights::default(),
        &MomentumThresholds::default(),
    );
    let policy = SurgePolicy::default();

    let first = next_snapshot(None, &band(), range, &pulse, SurgeDecision::Push, now());
    let mut quiet = first.clone();
    quiet.momentum_state = MomentumState::Cooling;
    quiet.surge_push_sent = false;

    let soon = now() + Duration::hours(3);
    assert_eq!(
        evaluate_surge(Some(&quiet), pulse.momentum_state, Some(&owner()), soon, &policy),
        SurgeDecision::Skip(SkipReason::CoolingDown)
    );
}

// ============================================================
// Chain: WindowStats -> Triggers -> Share copy
// ============================================================

#[test]
fn city_heat_chain_produces_share_copy() {
    let cfg = AutoMomentConfig::default();
    let mut window = views(now(), 25, Some("Austin"));
    window.extend(views(now(), 5, Some("Dallas")));

    let stats = WindowStats::compute(&window, 10, cfg.window, cfg.zero_baseline_velocity);
    let (moment_type, analyzer) = first_trigger(&cfg.analyzers(), &stats).unwrap();
    assert_eq!(moment_type, MomentType::CityHeat);
    assert_eq!(analyzer, "city_heat");

    let copy = share_copy(moment_type, &stats.to_context("The Lanterns"));
    assert_eq!(
        copy,
        "Austin is lighting up for The Lanterns! 25 fans tuned in over the last 60 minutes."
    );
}

#[test]
fn velocity_chain_formats_multiplier() {
    let cfg = AutoMomentConfig::default();
    let window = views(now(), 15, None);
    let stats = WindowStats::compute(&window, 5, cfg.window, cfg.zero_baseline_velocity);

    let (moment_type, _) = first_trigger(&cfg.analyzers(), &stats).unwrap();
    assert_eq!(moment_type, MomentType::PulseSurge);
    assert_eq!(
        share_copy(moment_type, &stats.to_context("The Lanterns")),
        "The Lanterns is surging right now: 15 fans in 60 minutes, 3.0x the usual pace."
    );
}

#[test]
fn recap_chain_names_peak_city_and_media() {
    let band_ref = EntityRef::band(1);
    let peak_end = now() - Duration::hours(2);
    let mut records: Vec<InteractionRecord> = (0..22)
        .map(|i| {
            InteractionRecord::media_play(
                InteractionCommon::new(band_ref, peak_end - Duration::minutes(i % 20))
                    .with_city("Denver"),
                "spotify",
                Some("Night Drive"),
            )
        })
        .collect();
    records.extend(views(now() - Duration::hours(5), 3, Some("Boulder")));

    let summary = summarize(&records, &RecapConfig::default()).unwrap();
    assert_eq!(summary.peak.count, 22);
    assert_eq!(summary.lookback_count, 25);

    let context = summary.to_context("The Lanterns", Duration::minutes(30));
    assert_eq!(
        share_copy(MomentType::ShowRecap, &context),
        "Show recap: 22 fans showed up for The Lanterns at the peak, loudest in Denver. Most played: Night Drive."
    );
}
