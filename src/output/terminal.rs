// Colored terminal output for evaluations, moments and sweeps.
//
// This module handles all terminal-specific formatting. The main.rs command
// handlers delegate here; `--json` output bypasses it entirely.

use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::db::models::{FanMoment, MomentumState, Notification};
use crate::pipeline::auto_moment::{MomentOutcome, MomentSkip};
use crate::pipeline::evaluate::Evaluation;
use crate::pipeline::fan_moment::FanCapture;
use crate::pipeline::import::ImportSummary;
use crate::pipeline::sweep::SweepSummary;
use crate::scoring::surge::SurgeDecision;

/// Display one pulse evaluation.
pub fn display_evaluation(eval: &Evaluation) {
    println!(
        "\n{}",
        format!(
            "=== Pulse for {} ({}) over {} ===",
            eval.entity.name,
            eval.entity.entity,
            eval.signals.range.phrase()
        )
        .bold()
    );

    println!(
        "  Pulse score: {:.1}/100   Momentum: {}   Growth: {:+.0}%",
        eval.pulse.pulse_score,
        colorize_state(eval.pulse.momentum_state),
        eval.pulse.growth_pct,
    );
    if eval.signals.degraded {
        println!(
            "  {}",
            "Interaction data unavailable, signals were zeroed".yellow()
        );
    }

    let cur = &eval.signals.current;
    let prev = &eval.signals.previous;
    println!();
    println!(
        "  {:<8} {:>8} {:>8}",
        "".dimmed(),
        "Now".dimmed(),
        "Before".dimmed()
    );
    println!("  {}", "-".repeat(26).dimmed());
    for (label, now, before) in [
        ("Views", cur.views, prev.views),
        ("Clicks", cur.clicks, prev.clicks),
        ("Plays", cur.plays, prev.plays),
        ("Scans", cur.scans, prev.scans),
    ] {
        println!("  {label:<8} {now:>8} {before:>8}");
    }

    if let Some(city) = &cur.top_city {
        println!("\n  Top city: {} ({})", city.name, city.count);
    }
    if let Some(platform) = &cur.top_platform {
        println!("  Top platform: {} ({})", platform.name, platform.count);
    }

    if !eval.pulse.drivers.is_empty() {
        println!("\n  Drivers:");
        for d in &eval.pulse.drivers {
            println!(
                "    {:<11} {:>6} -> {:<6} ({:+.0})",
                d.signal.as_str(),
                d.previous,
                d.current,
                d.weighted_delta
            );
        }
    }

    println!();
    match eval.surge.decision {
        SurgeDecision::Push => println!(
            "  {} Surge push queued (notification #{})",
            "!!".red().bold(),
            eval.surge.notification_id.unwrap_or_default()
        ),
        SurgeDecision::Skip(reason) => {
            println!("  Surge push: {}", reason.as_str().dimmed())
        }
    }
    if !eval.surge.persisted {
        println!("  {}", "Snapshot was not saved".red());
    }
}

/// Display an auto-moment or recap outcome.
pub fn display_moment_outcome(label: &str, outcome: &MomentOutcome, dry_run: bool) {
    println!(
        "\n{}",
        format!("=== {label} for {} ===", outcome.entity).bold()
    );

    if let Some(reason) = outcome.skipped {
        let text = match reason {
            MomentSkip::CoolingDown => "cooldown active, try again later",
            MomentSkip::ActiveMoment => "an active moment already exists",
            MomentSkip::NoTrigger => "no trigger fired",
            MomentSkip::Degraded => "interaction store unavailable, nothing evaluated",
        };
        println!("  Not triggered: {}", text.dimmed());
    }

    if let Some(ctx) = &outcome.context {
        println!(
            "  Window: {} interactions in {} min (baseline {}, velocity {:.1}x)",
            ctx.window_count, ctx.window_minutes, ctx.baseline_count, ctx.velocity
        );
        if let (Some(city), Some(count)) = (&ctx.city, ctx.city_count) {
            println!(
                "  Top city: {city} ({count}, {:.0}%)",
                ctx.city_share.unwrap_or(0.0) * 100.0
            );
        }
    }

    if let Some(moment_type) = outcome.moment_type {
        println!("  Triggered: {}", moment_type.as_str().green().bold());
    }
    match &outcome.created {
        Some(moment) => display_moment_line(moment),
        None if outcome.triggered && dry_run => {
            println!("  {}", "Dry run: nothing was saved".yellow())
        }
        None => {}
    }
}

pub fn display_fan_capture(capture: &FanCapture) {
    if capture.created {
        println!("{}", "Moment captured".green().bold());
    } else {
        println!("{}", "Visitor already has an active moment".yellow());
    }
    display_moment_line(&capture.moment);
}

/// Display the active moments list.
pub fn display_moments(moments: &[FanMoment], now: DateTime<Utc>) {
    if moments.is_empty() {
        println!("No active moments.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Active Moments ({}) ===", moments.len()).bold()
    );
    println!();
    for moment in moments {
        let left = moment.expires_at - now;
        println!(
            "  #{:<5} {:<10} {:<16} expires in {}h",
            moment.id,
            moment.entity.to_string(),
            moment.moment_type.as_str(),
            left.num_hours()
        );
        println!("         {}", super::truncate_chars(&moment.share_copy, 100).dimmed());
    }
    println!();
}

pub fn display_sweep_summary(summary: &SweepSummary) {
    println!("\n{}", "=== Sweep complete ===".bold());
    println!("  Evaluated: {}", summary.evaluated);
    println!("  Surging: {}", summary.surging.to_string().red().bold());
    println!("  Notifications queued: {}", summary.notifications);
    println!("  Moments minted: {}", summary.moments);
    println!("  Expired moments pruned: {}", summary.pruned);
    if summary.degraded > 0 {
        println!(
            "  {} {} evaluated on zeroed signals",
            "~".yellow(),
            summary.degraded
        );
    }
    if summary.failed > 0 {
        println!("  {} {} failed", "!".bright_red(), summary.failed);
    }
}

pub fn display_import_summary(summary: &ImportSummary) {
    println!(
        "Imported {} owners, {} entities, {} interactions",
        summary.owners, summary.entities, summary.interactions
    );
}

pub fn display_notifications(notifications: &[Notification]) {
    for n in notifications {
        println!(
            "  {} {} {}",
            n.created_at.format("%Y-%m-%d %H:%M"),
            n.title.bold(),
            super::truncate_chars(&n.body, 80).dimmed()
        );
    }
}

fn display_moment_line(moment: &FanMoment) {
    println!(
        "  Moment #{} ({}), expires {}",
        moment.id,
        moment.moment_type.as_str(),
        moment.expires_at.format("%Y-%m-%d %H:%M UTC")
    );
    println!("  \"{}\"", moment.share_copy);
}

/// Colorize a momentum state.
fn colorize_state(state: MomentumState) -> colored::ColoredString {
    match state {
        MomentumState::Surging => state.as_str().red().bold(),
        MomentumState::Warming => state.as_str().yellow(),
        MomentumState::Steady => state.as_str().normal(),
        MomentumState::Cooling => state.as_str().blue(),
    }
}
