use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::{Days, NaiveDate};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use stats_rebuild::config::EngineConfig;
use stats_rebuild::match_source::{self, MatchRecord, PlayerLine};
use stats_rebuild::store;

const SQUAD_SIZE: u32 = 14;
const STARTERS: u32 = 11;
const FULL_MATCH: i64 = 90;

/// Writes a synthetic double round-robin season into the match tables.
#[derive(Debug, Parser)]
#[command(name = "seed_demo")]
struct Args {
    #[arg(long)]
    db: Option<PathBuf>,
    #[arg(long, default_value_t = 1)]
    season: u32,
    #[arg(long, default_value_t = 8)]
    teams: u32,
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Extra completed matches recorded without an away team.
    #[arg(long, default_value_t = 0)]
    malformed: u32,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = EngineConfig::load();
    config.logging.init();

    if args.teams < 2 {
        return Err(anyhow!("need at least two teams, got {}", args.teams));
    }
    if args.season == 0 {
        return Err(anyhow!("season ids start at 1"));
    }

    let db_path = config.resolve_db_path(args.db)?;
    let mut conn = store::open_db(&db_path)?;
    let mut rng = StdRng::seed_from_u64(args.seed);
    let opening_day =
        NaiveDate::from_ymd_opt(2025, 8, 9).context("invalid opening day constant")?;

    let team_ids = (1..=args.teams)
        .map(|n| args.season * 100 + n)
        .collect::<Vec<_>>();
    let mut match_id = u64::from(args.season) * 10_000;
    let mut matches = 0usize;
    let mut lines = 0usize;

    let tx = conn.transaction().context("begin seed transaction")?;
    for (round, &home) in team_ids.iter().enumerate() {
        for &away in &team_ids {
            if home == away {
                continue;
            }
            match_id += 1;
            let home_score = sample_goals(&mut rng);
            let away_score = sample_goals(&mut rng);
            let kickoff = opening_day
                .checked_add_days(Days::new(7 * round as u64))
                .map(|d| format!("{d}T15:00:00Z"));
            let mut record = MatchRecord::completed(
                match_id,
                args.season,
                home,
                away,
                i64::from(home_score),
                i64::from(away_score),
            );
            record.kickoff_utc = kickoff;
            match_source::record_match(&tx, &record)?;
            matches += 1;

            for (team, goals) in [(home, home_score), (away, away_score)] {
                for line in squad_lines(&mut rng, match_id, team, goals) {
                    match_source::record_player_line(&tx, &line)?;
                    lines += 1;
                }
            }
        }
    }

    for _ in 0..args.malformed {
        match_id += 1;
        let mut record = MatchRecord::completed(match_id, args.season, team_ids[0], 0, 1, 0);
        record.away_team_id = None;
        match_source::record_match(&tx, &record)?;
    }
    tx.commit().context("commit seed transaction")?;

    info!(season = args.season, matches, lines, malformed = args.malformed, "demo season seeded");
    println!("Seeded season {} into {}", args.season, db_path.display());
    println!("Matches: {matches} (+{} malformed)", args.malformed);
    println!("Player lines: {lines}");
    Ok(())
}

fn sample_goals(rng: &mut StdRng) -> u32 {
    let mut goals = 0;
    // Binomial(6, 0.23), mean close to 1.4 goals.
    for _ in 0..6 {
        if rng.gen_bool(0.23) {
            goals += 1;
        }
    }
    goals
}

fn squad_lines(rng: &mut StdRng, match_id: u64, team_id: u32, goals: u32) -> Vec<PlayerLine> {
    let mut lines = (1..=SQUAD_SIZE)
        .map(|n| PlayerLine {
            match_id,
            player_id: Some(i64::from(team_id * 100 + n)),
            team_id: Some(i64::from(team_id)),
            minutes_played: if n <= STARTERS { FULL_MATCH } else { 0 },
            ..PlayerLine::default()
        })
        .collect::<Vec<_>>();

    // Each outfield starter is replaced at most once, so nobody drops below
    // 90 minus the longest sub appearance.
    for sub in STARTERS..SQUAD_SIZE {
        if !rng.gen_bool(0.6) {
            continue;
        }
        let fresh = (1..STARTERS as usize)
            .filter(|&idx| lines[idx].minutes_played == FULL_MATCH)
            .collect::<Vec<_>>();
        if fresh.is_empty() {
            continue;
        }
        let replaced = fresh[rng.gen_range(0..fresh.len())];
        let minutes = rng.gen_range(5..=35);
        lines[replaced].minutes_played -= minutes;
        lines[sub as usize].minutes_played = minutes;
    }

    for _ in 0..goals {
        let scorer = rng.gen_range(1..SQUAD_SIZE) as usize;
        lines[scorer].goals += 1;
        if rng.gen_bool(0.7) {
            let assister = rng.gen_range(0..SQUAD_SIZE) as usize;
            if assister != scorer {
                lines[assister].assists += 1;
            }
        }
    }

    for line in &mut lines {
        if line.minutes_played > 0 && rng.gen_bool(0.08) {
            line.yellow_cards += 1;
        }
    }
    lines
}
