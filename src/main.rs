use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Duration;
use clap::{Parser, Subcommand};
use tracing::info;

use stats_rebuild::config::EngineConfig;
use stats_rebuild::scope::{Derivation, RebuildRequest, SeasonFilter};
use stats_rebuild::{RebuildJob, runs, store, validate};

#[derive(Debug, Parser)]
#[command(
    name = "stats_rebuild",
    about = "Rebuild derived league statistics from completed matches"
)]
struct Cli {
    /// SQLite database (defaults to STATS_DB_PATH or the user cache dir).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Delete and recompute derived tables for a scope.
    Rebuild {
        #[arg(long)]
        season: Option<String>,
        /// all, standings, player_stats, team_stats, team_seasons or h2h.
        #[arg(long = "type", default_value = "all")]
        kind: String,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Compare stored derived tables against a fresh recomputation.
    Validate {
        #[arg(long)]
        season: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Print a digest of every derived row.
    Fingerprint,
    /// Show recent rebuild runs.
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Clear scope locks left behind by a crashed rebuild and fail its runs.
    Unlock {
        /// Only locks overlapping this season; all locks when omitted.
        #[arg(long)]
        season: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = EngineConfig::load();
    config.logging.init();

    let db_path = config.resolve_db_path(cli.db)?;
    let mut conn = store::open_db(&db_path)?;
    info!(db = %db_path.display(), "database opened");

    match cli.command {
        Command::Rebuild { season, kind, json } => {
            let scope = RebuildRequest {
                season_id: season,
                kind: Some(kind),
            }
            .into_scope()?;
            let lease = Duration::seconds(i64::from(config.lock_lease_secs));
            let mut job = RebuildJob::new(scope).with_lock_lease(lease);
            let report = job.run(&mut conn)?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("serialize report")?
                );
            } else {
                println!("Rebuild complete ({scope})");
                println!("DB: {}", db_path.display());
                for derivation in scope.plan() {
                    println!(
                        "{:<20} {}",
                        derivation.table_name(),
                        report.count(derivation)
                    );
                }
            }
        }
        Command::Validate { season, json } => {
            let season = SeasonFilter::parse(season.as_deref())?;
            let report = validate::validate(&conn, season)?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("serialize validation")?
                );
            } else {
                println!("Validated {} rows for {season}", report.rows_checked);
                for d in Derivation::ALL {
                    let n = report
                        .discrepancies
                        .iter()
                        .filter(|x| x.derivation == d)
                        .count();
                    println!("{:<20} {} discrepancies", d.as_str(), n);
                }
                for item in report.discrepancies.iter().take(20) {
                    println!(" - {item}");
                }
            }
            if !report.is_clean() {
                std::process::exit(1);
            }
        }
        Command::Fingerprint => {
            println!("{}", validate::fingerprint(&conn)?);
        }
        Command::History { limit } => {
            for run in runs::recent_runs(&conn, limit)? {
                println!(
                    "#{} {} {} season={} type={} {}",
                    run.run_id,
                    run.started_at,
                    run.status.as_str(),
                    run.season_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "all".to_string()),
                    run.derivation,
                    run.error.as_deref().unwrap_or("")
                );
            }
        }
        Command::Unlock { season } => {
            let season = SeasonFilter::parse(season.as_deref())?;
            let (locks, runs_failed) = runs::force_unlock(&mut conn, season)?;
            info!(%season, locks, runs_failed, "scope locks cleared");
            println!("Cleared {locks} lock(s) overlapping {season}");
            println!("Marked {runs_failed} running rebuild(s) as failed");
        }
    }

    Ok(())
}
