// System status display — DB stats, snapshot states, recent pushes, last sweep.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;

use crate::db::Database;
use crate::pipeline::sweep::LAST_SWEEP_KEY;
use crate::signals::range::RangeKey;

/// Display system status to the terminal.
pub async fn show(db: &Arc<dyn Database>, db_path: &str, now: DateTime<Utc>) -> Result<()> {
    let file_size = std::fs::metadata(db_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_path, file_size);

    let entities = db.list_entities(None).await?;
    let interactions = db.count_interactions().await?;
    println!(
        "Entities: {}   Interactions: {}",
        entities.len(),
        interactions
    );

    for range in RangeKey::ALL {
        let counts = db.count_snapshots_by_state(range.as_str()).await?;
        if counts.is_empty() {
            continue;
        }
        let parts: Vec<String> = counts
            .iter()
            .map(|(state, n)| format!("{n} {state}"))
            .collect();
        println!("Snapshots {:>3}: {}", range.as_str(), parts.join(", "));
    }

    let moments = db.get_active_moments(None, now).await?;
    println!("Active moments: {}", moments.len());

    let notifications = db.get_recent_notifications(5).await?;
    if notifications.is_empty() {
        println!("Recent pushes: none yet");
    } else {
        println!("Recent pushes: {} most recent:", notifications.len());
        crate::output::terminal::display_notifications(&notifications);
    }

    match db.get_rate_state(LAST_SWEEP_KEY).await? {
        Some(last) => println!("Last sweep: {}", last),
        None => {
            println!("Last sweep: never");
            println!("  Run `bandpulse sweep` to evaluate every entity");
        }
    }

    Ok(())
}

/// Whether the database file exists yet.
pub fn is_initialized(db_path: &str) -> bool {
    Path::new(db_path).exists()
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
