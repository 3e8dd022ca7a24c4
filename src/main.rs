use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tracing::info;

use bandpulse::config::Config;
use bandpulse::db::models::EntityType;
use bandpulse::db::{self, Database, SqliteDatabase};
use bandpulse::output::terminal;
use bandpulse::pipeline::sweep::SweepOptions;
use bandpulse::PulseEngine;

/// Bandpulse: momentum and surge analytics for bands, events and QR codes.
///
/// Scores how fast an entity's audience is growing, queues a push when it
/// starts surging, and mints shareable fan moments from real-time activity.
#[derive(Parser)]
#[command(name = "bandpulse", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Load owners, entities and interactions from a JSON file
    Import {
        /// Path to the import document
        file: PathBuf,
    },

    /// Compute the pulse of one entity and run the surge check
    Evaluate {
        /// band, event or qr
        entity_type: String,

        /// Entity id
        entity_id: String,

        /// 24h, 7d or 30d
        #[arg(long, default_value = "24h")]
        range: String,

        /// Print JSON instead of the colored summary
        #[arg(long)]
        json: bool,
    },

    /// Check a band for a real-time auto moment
    AutoMoment {
        band_id: String,

        /// Evaluate without saving anything
        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        json: bool,
    },

    /// Check a band for a show recap
    Recap {
        band_id: String,

        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        json: bool,
    },

    /// Capture a fan-initiated moment
    Capture {
        band_id: String,

        /// Anonymous visitor identifier
        visitor_id: String,

        /// What the fan did, e.g. "was front row"
        #[arg(long)]
        action: Option<String>,
    },

    /// Evaluate every registered entity
    Sweep {
        #[arg(long, default_value = "24h")]
        range: String,

        /// Only sweep this entity type (band, event or qr)
        #[arg(long = "type")]
        entity_type: Option<String>,

        /// Entities evaluated in parallel (default: BANDPULSE_SWEEP_CONCURRENCY)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Also check bands for auto moments
        #[arg(long)]
        moments: bool,
    },

    /// List active moments
    Moments {
        /// Only show moments for this band
        #[arg(long)]
        band: Option<String>,
    },

    /// Show system status (DB stats, snapshot states, last sweep)
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bandpulse=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let now = Utc::now();

    match cli.command {
        Commands::Init => {
            info!("Initializing Bandpulse database...");
            let store = db::initialize_sqlite(&config.db_path)?;
            let table_count = store.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\n{}", "Bandpulse is ready.".bold());
            println!("Next step: load data with `bandpulse import <file.json>`");
        }

        Commands::Import { file } => {
            let store: Arc<dyn Database> = db::open_sqlite(&config.db_path)?;
            let summary = bandpulse::pipeline::import::import_file(&store, &file).await?;
            terminal::display_import_summary(&summary);
        }

        Commands::Evaluate {
            entity_type,
            entity_id,
            range,
            json,
        } => {
            let engine = open_engine(&config)?;
            let eval = engine
                .evaluate(&entity_type, &entity_id, &range, now)
                .await?;
            if json {
                print_json(&eval)?;
            } else {
                terminal::display_evaluation(&eval);
            }
        }

        Commands::AutoMoment {
            band_id,
            dry_run,
            json,
        } => {
            let engine = open_engine(&config)?;
            let outcome = engine.evaluate_auto_moment(&band_id, dry_run, now).await?;
            if json {
                print_json(&outcome)?;
            } else {
                terminal::display_moment_outcome("Auto moment", &outcome, dry_run);
            }
        }

        Commands::Recap {
            band_id,
            dry_run,
            json,
        } => {
            let engine = open_engine(&config)?;
            let outcome = engine.evaluate_recap(&band_id, dry_run, now).await?;
            if json {
                print_json(&outcome)?;
            } else {
                terminal::display_moment_outcome("Show recap", &outcome, dry_run);
            }
        }

        Commands::Capture {
            band_id,
            visitor_id,
            action,
        } => {
            let engine = open_engine(&config)?;
            let capture = engine
                .capture_fan_moment(&band_id, &visitor_id, action.as_deref(), now)
                .await?;
            terminal::display_fan_capture(&capture);
        }

        Commands::Sweep {
            range,
            entity_type,
            concurrency,
            moments,
        } => {
            let engine = open_engine(&config)?;
            let entity_type = entity_type
                .map(|t| t.parse::<EntityType>().map_err(anyhow::Error::msg))
                .transpose()?;
            let opts = SweepOptions {
                range: bandpulse::pipeline::engine::parse_range(&range)?,
                entity_type,
                concurrency: concurrency.unwrap_or(config.sweep_concurrency),
                moments,
                show_progress: true,
            };
            println!(
                "Sweeping {} over {} ({} concurrent)...",
                entity_type.map_or("all entities".to_string(), |t| format!("{t} entities")),
                opts.range.phrase(),
                opts.concurrency
            );
            let summary = engine.sweep(&opts, now).await?;
            terminal::display_sweep_summary(&summary);
        }

        Commands::Moments { band } => {
            let store: Arc<dyn Database> = db::open_sqlite(&config.db_path)?;
            let band = band
                .map(|id| bandpulse::pipeline::engine::parse_entity_id(&id))
                .transpose()?
                .map(bandpulse::db::models::EntityRef::band);
            let moments = store.get_active_moments(band.as_ref(), now).await?;
            terminal::display_moments(&moments, now);
        }

        Commands::Status => {
            if !bandpulse::status::is_initialized(&config.db_path) {
                println!("Database: not initialized");
                println!("\nRun `bandpulse init` to set up the database.");
                return Ok(());
            }
            let store: Arc<dyn Database> = db::open_sqlite(&config.db_path)?;
            bandpulse::status::show(&store, &config.db_path, now).await?;
        }
    }

    Ok(())
}

/// Open the database and build an engine that reads interactions from it.
fn open_engine(config: &Config) -> Result<PulseEngine> {
    let store: Arc<SqliteDatabase> = db::open_sqlite(&config.db_path)?;
    Ok(PulseEngine::new(
        store.clone(),
        store,
        config.engine_config()?,
    ))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
