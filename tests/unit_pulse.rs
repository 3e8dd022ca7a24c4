// Unit tests for the pulse scorer and output helpers.
//
// Tests isolated pure functions: momentum bucket boundaries, growth edge
// cases, score bounds and monotonicity, custom weights, and truncate_chars
// UTF-8 safety.

use bandpulse::db::models::MomentumState;
use bandpulse::output::truncate_chars;
use bandpulse::scoring::pulse::{
    compute_pulse, growth_pct, pulse_score, MomentumThresholds, PulseWeights,
};
use bandpulse::signals::normalizer::SignalVector;

fn views(n: u64) -> SignalVector {
    SignalVector {
        views: n,
        ..SignalVector::default()
    }
}

// ============================================================
// MomentumThresholds::classify — boundary conditions
// ============================================================

#[test]
fn surging_starts_at_exact_boundary() {
    let t = MomentumThresholds::default();
    assert_eq!(t.classify(150.0), MomentumState::Surging);
    assert_eq!(t.classify(149.9), MomentumState::Warming);
}

#[test]
fn warming_starts_at_exact_boundary() {
    let t = MomentumThresholds::default();
    assert_eq!(t.classify(25.0), MomentumState::Warming);
    assert_eq!(t.classify(24.9), MomentumState::Steady);
}

#[test]
fn cooling_includes_exact_boundary() {
    let t = MomentumThresholds::default();
    assert_eq!(t.classify(-25.0), MomentumState::Cooling);
    assert_eq!(t.classify(-24.9), MomentumState::Steady);
    assert_eq!(t.classify(-100.0), MomentumState::Cooling);
}

#[test]
fn custom_thresholds_shift_buckets() {
    let t = MomentumThresholds {
        surging_min: 300.0,
        warming_min: 50.0,
        cooling_max: -50.0,
    };
    assert_eq!(t.classify(200.0), MomentumState::Warming);
    assert_eq!(t.classify(-30.0), MomentumState::Steady);
}

// ============================================================
// growth_pct — zero handling
// ============================================================

#[test]
fn growth_is_always_finite() {
    for (current, previous) in [(0, 0), (1, 0), (u32::MAX as u64, 0), (0, 1), (7, 7)] {
        assert!(growth_pct(current, previous).is_finite());
    }
}

#[test]
fn growth_tripling_is_200_pct() {
    assert_eq!(growth_pct(30, 10), 200.0);
    assert_eq!(growth_pct(5, 10), -50.0);
}

// ============================================================
// pulse_score — bounds and monotonicity
// ============================================================

#[test]
fn score_stays_between_0_and_100() {
    let w = PulseWeights::default();
    for activity in [0.0, 1.0, 50.0, 5_000.0, 1e9] {
        for growth in [-100.0, -25.0, 0.0, 150.0, 10_000.0] {
            let s = pulse_score(activity, growth, &w);
            assert!((0.0..=100.0).contains(&s), "{activity}/{growth} -> {s}");
        }
    }
}

#[test]
fn score_never_drops_as_activity_grows() {
    let w = PulseWeights::default();
    let mut last = 0.0;
    for activity in [1.0, 10.0, 100.0, 1_000.0, 10_000.0] {
        let s = pulse_score(activity, 50.0, &w);
        assert!(s >= last, "{activity} -> {s} < {last}");
        last = s;
    }
}

#[test]
fn score_never_drops_as_growth_grows() {
    let w = PulseWeights::default();
    let mut last = 0.0;
    for growth in [-100.0, -50.0, 0.0, 100.0, 300.0, 900.0] {
        let s = pulse_score(200.0, growth, &w);
        assert!(s >= last, "{growth} -> {s} < {last}");
        last = s;
    }
}

#[test]
fn busy_steady_entity_outscores_quiet_doubling_one() {
    let w = PulseWeights::default();
    assert!(pulse_score(2_000.0, 0.0, &w) > pulse_score(10.0, 100.0, &w));
}

#[test]
fn scan_weight_counts_in_activity() {
    let w = PulseWeights::default();
    let scans = SignalVector {
        scans: 10,
        ..SignalVector::default()
    };
    assert_eq!(w.weighted_activity(&scans), 30.0);
    assert_eq!(w.weighted_activity(&views(10)), 10.0);
}

// ============================================================
// compute_pulse
// ============================================================

#[test]
fn same_input_same_pulse() {
    let w = PulseWeights::default();
    let t = MomentumThresholds::default();
    let a = compute_pulse(&views(30), Some(&views(10)), &w, &t);
    let b = compute_pulse(&views(30), Some(&views(10)), &w, &t);
    assert_eq!(a, b);
}

#[test]
fn ten_to_thirty_is_surging() {
    let p = compute_pulse(
        &views(30),
        Some(&views(10)),
        &PulseWeights::default(),
        &MomentumThresholds::default(),
    );
    assert_eq!(p.growth_pct, 200.0);
    assert_eq!(p.momentum_state, MomentumState::Surging);
    assert!(p.pulse_score > 0.0);
}

#[test]
fn losing_everything_is_cooling_with_zero_score() {
    let p = compute_pulse(
        &views(0),
        Some(&views(40)),
        &PulseWeights::default(),
        &MomentumThresholds::default(),
    );
    assert_eq!(p.growth_pct, -100.0);
    assert_eq!(p.momentum_state, MomentumState::Cooling);
    assert_eq!(p.pulse_score, 0.0);
    assert_eq!(p.drivers[0].weighted_delta, -40.0);
}

// ============================================================
// truncate_chars — UTF-8 safety
// ============================================================

#[test]
fn truncate_multibyte_city_names() {
    assert_eq!(truncate_chars("São Paulo", 3), "São...");
    assert_eq!(truncate_chars("Zürich", 6), "Zürich");
}

#[test]
fn truncate_empty_string() {
    assert_eq!(truncate_chars("", 5), "");
}
