use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, params};

use crate::h2h::{PairKey, PairStat, PairTotals};
use crate::match_source;
use crate::player_stats::{PlayerSeasonKey, PlayerSeasonStat, PlayerTotals};
use crate::scope::{Derivation, SeasonFilter};
use crate::standings::{StandingRow, StandingTotals, TeamSeasonKey};
use crate::team_stats::TeamSeasonStat;

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")
        .context("enable wal journal")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    match_source::init_source_schema(conn)?;
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS standings (
            season_id INTEGER NOT NULL,
            team_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            matches_played INTEGER NOT NULL,
            wins INTEGER NOT NULL,
            draws INTEGER NOT NULL,
            losses INTEGER NOT NULL,
            goals_for INTEGER NOT NULL,
            goals_against INTEGER NOT NULL,
            goal_difference INTEGER NOT NULL,
            points INTEGER NOT NULL,
            PRIMARY KEY (season_id, team_id)
        );

        CREATE TABLE IF NOT EXISTS team_season_stats (
            season_id INTEGER NOT NULL,
            team_id INTEGER NOT NULL,
            matches_played INTEGER NOT NULL,
            wins INTEGER NOT NULL,
            draws INTEGER NOT NULL,
            losses INTEGER NOT NULL,
            goals_for INTEGER NOT NULL,
            goals_against INTEGER NOT NULL,
            points INTEGER NOT NULL,
            PRIMARY KEY (season_id, team_id)
        );

        CREATE TABLE IF NOT EXISTS team_seasons (
            season_id INTEGER NOT NULL,
            team_id INTEGER NOT NULL,
            PRIMARY KEY (season_id, team_id)
        );

        CREATE TABLE IF NOT EXISTS h2h_pair_stats (
            season_id INTEGER NOT NULL,
            team_small_id INTEGER NOT NULL,
            team_large_id INTEGER NOT NULL,
            total_matches INTEGER NOT NULL,
            small_wins INTEGER NOT NULL,
            large_wins INTEGER NOT NULL,
            draws INTEGER NOT NULL,
            small_goals INTEGER NOT NULL,
            large_goals INTEGER NOT NULL,
            PRIMARY KEY (season_id, team_small_id, team_large_id),
            CHECK (team_small_id < team_large_id)
        );
        CREATE INDEX IF NOT EXISTS idx_h2h_pair ON h2h_pair_stats(team_small_id, team_large_id);

        CREATE TABLE IF NOT EXISTS player_season_stats (
            season_id INTEGER NOT NULL,
            player_id INTEGER NOT NULL,
            team_id INTEGER NOT NULL,
            appearances INTEGER NOT NULL,
            minutes_played INTEGER NOT NULL,
            goals INTEGER NOT NULL,
            assists INTEGER NOT NULL,
            yellow_cards INTEGER NOT NULL,
            red_cards INTEGER NOT NULL,
            PRIMARY KEY (season_id, player_id, team_id)
        );

        CREATE TABLE IF NOT EXISTS rebuild_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            season_id INTEGER NULL,
            derivation TEXT NOT NULL,
            status TEXT NOT NULL,
            report_json TEXT NULL,
            error TEXT NULL
        );

        CREATE TABLE IF NOT EXISTS rebuild_locks (
            scope_key TEXT PRIMARY KEY,
            acquired_at TEXT NOT NULL
        );
        "#,
    )
    .context("create derived schema")?;
    Ok(())
}

/// Deletes the rows a derivation owns for the scope and returns how many went.
pub fn delete_scoped(conn: &Connection, derivation: Derivation, season: SeasonFilter) -> Result<usize> {
    let sql = format!(
        "DELETE FROM {} WHERE (?1 IS NULL OR season_id = ?1)",
        derivation.table_name()
    );
    conn.execute(&sql, params![season.season_id()])
        .with_context(|| format!("delete {} rows for {season}", derivation.table_name()))
}

pub fn insert_standings(conn: &Connection, rows: &[StandingRow]) -> Result<usize> {
    let mut stmt = conn
        .prepare_cached(
            r#"
            INSERT INTO standings (
                season_id, team_id, position, matches_played, wins, draws, losses,
                goals_for, goals_against, goal_difference, points
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .context("prepare standings insert")?;
    for row in rows {
        let t = &row.totals;
        stmt.execute(params![
            row.key.season_id,
            row.key.team_id,
            row.position,
            t.matches_played,
            t.wins,
            t.draws,
            t.losses,
            t.goals_for,
            t.goals_against,
            t.goal_difference,
            t.points,
        ])
        .with_context(|| format!("insert standing for {}", row.key))?;
    }
    Ok(rows.len())
}

pub fn insert_team_season_stats(conn: &Connection, rows: &[TeamSeasonStat]) -> Result<usize> {
    let mut stmt = conn
        .prepare_cached(
            r#"
            INSERT INTO team_season_stats (
                season_id, team_id, matches_played, wins, draws, losses,
                goals_for, goals_against, points
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .context("prepare team season stats insert")?;
    for row in rows {
        stmt.execute(params![
            row.key.season_id,
            row.key.team_id,
            row.matches_played,
            row.wins,
            row.draws,
            row.losses,
            row.goals_for,
            row.goals_against,
            row.points,
        ])
        .with_context(|| format!("insert team season stat for {}", row.key))?;
    }
    Ok(rows.len())
}

pub fn insert_team_seasons(conn: &Connection, rows: &BTreeSet<TeamSeasonKey>) -> Result<usize> {
    let mut stmt = conn
        .prepare_cached("INSERT INTO team_seasons (season_id, team_id) VALUES (?1, ?2)")
        .context("prepare team seasons insert")?;
    for key in rows {
        stmt.execute(params![key.season_id, key.team_id])
            .with_context(|| format!("insert team season {key}"))?;
    }
    Ok(rows.len())
}

pub fn insert_pair_stats(conn: &Connection, rows: &[PairStat]) -> Result<usize> {
    let mut stmt = conn
        .prepare_cached(
            r#"
            INSERT INTO h2h_pair_stats (
                season_id, team_small_id, team_large_id, total_matches,
                small_wins, large_wins, draws, small_goals, large_goals
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .context("prepare h2h insert")?;
    for row in rows {
        let t = &row.totals;
        stmt.execute(params![
            row.key.season_id(),
            row.key.team_small_id(),
            row.key.team_large_id(),
            t.total_matches,
            t.small_wins,
            t.large_wins,
            t.draws,
            t.small_goals,
            t.large_goals,
        ])
        .with_context(|| format!("insert h2h row for {}", row.key))?;
    }
    Ok(rows.len())
}

pub fn insert_player_stats(conn: &Connection, rows: &[PlayerSeasonStat]) -> Result<usize> {
    let mut stmt = conn
        .prepare_cached(
            r#"
            INSERT INTO player_season_stats (
                season_id, player_id, team_id, appearances, minutes_played,
                goals, assists, yellow_cards, red_cards
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .context("prepare player season stats insert")?;
    for row in rows {
        let t = &row.totals;
        stmt.execute(params![
            row.key.season_id,
            row.key.player_id,
            row.key.team_id,
            t.appearances,
            t.minutes_played,
            t.goals,
            t.assists,
            t.yellow_cards,
            t.red_cards,
        ])
        .with_context(|| format!("insert player season stat for {}", row.key))?;
    }
    Ok(rows.len())
}

pub fn load_standings(conn: &Connection, season: SeasonFilter) -> Result<Vec<StandingRow>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                season_id, team_id, position, matches_played, wins, draws, losses,
                goals_for, goals_against, goal_difference, points
            FROM standings
            WHERE (?1 IS NULL OR season_id = ?1)
            ORDER BY season_id ASC, position ASC, team_id ASC
            "#,
        )
        .context("prepare standings query")?;
    let rows = stmt
        .query_map(params![season.season_id()], |row| {
            Ok(StandingRow {
                key: TeamSeasonKey::new(row.get(0)?, row.get(1)?),
                position: row.get(2)?,
                totals: StandingTotals {
                    matches_played: row.get(3)?,
                    wins: row.get(4)?,
                    draws: row.get(5)?,
                    losses: row.get(6)?,
                    goals_for: row.get(7)?,
                    goals_against: row.get(8)?,
                    goal_difference: row.get(9)?,
                    points: row.get(10)?,
                },
            })
        })
        .context("query standings")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode standing row")?);
    }
    Ok(out)
}

pub fn load_team_season_stats(
    conn: &Connection,
    season: SeasonFilter,
) -> Result<Vec<TeamSeasonStat>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                season_id, team_id, matches_played, wins, draws, losses,
                goals_for, goals_against, points
            FROM team_season_stats
            WHERE (?1 IS NULL OR season_id = ?1)
            ORDER BY season_id ASC, team_id ASC
            "#,
        )
        .context("prepare team season stats query")?;
    let rows = stmt
        .query_map(params![season.season_id()], |row| {
            Ok(TeamSeasonStat {
                key: TeamSeasonKey::new(row.get(0)?, row.get(1)?),
                matches_played: row.get(2)?,
                wins: row.get(3)?,
                draws: row.get(4)?,
                losses: row.get(5)?,
                goals_for: row.get(6)?,
                goals_against: row.get(7)?,
                points: row.get(8)?,
            })
        })
        .context("query team season stats")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode team season stat row")?);
    }
    Ok(out)
}

pub fn load_team_seasons(conn: &Connection, season: SeasonFilter) -> Result<BTreeSet<TeamSeasonKey>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT season_id, team_id
            FROM team_seasons
            WHERE (?1 IS NULL OR season_id = ?1)
            "#,
        )
        .context("prepare team seasons query")?;
    let rows = stmt
        .query_map(params![season.season_id()], |row| {
            Ok(TeamSeasonKey::new(row.get(0)?, row.get(1)?))
        })
        .context("query team seasons")?;

    let mut out = BTreeSet::new();
    for row in rows {
        out.insert(row.context("decode team season row")?);
    }
    Ok(out)
}

pub fn load_pair_stats(conn: &Connection, season: SeasonFilter) -> Result<Vec<PairStat>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                season_id, team_small_id, team_large_id, total_matches,
                small_wins, large_wins, draws, small_goals, large_goals
            FROM h2h_pair_stats
            WHERE (?1 IS NULL OR season_id = ?1)
            ORDER BY season_id ASC, team_small_id ASC, team_large_id ASC
            "#,
        )
        .context("prepare h2h query")?;
    let rows = stmt
        .query_map(params![season.season_id()], |row| {
            let ids: (u32, u32, u32) = (row.get(0)?, row.get(1)?, row.get(2)?);
            let totals = PairTotals {
                total_matches: row.get(3)?,
                small_wins: row.get(4)?,
                large_wins: row.get(5)?,
                draws: row.get(6)?,
                small_goals: row.get(7)?,
                large_goals: row.get(8)?,
            };
            Ok((ids, totals))
        })
        .context("query h2h")?;

    let mut out = Vec::new();
    for row in rows {
        let ((season_id, small, large), totals) = row.context("decode h2h row")?;
        let key = PairKey::new(season_id, small, large)
            .ok_or_else(|| anyhow!("h2h row pairs team {small} with itself"))?;
        out.push(PairStat { key, totals });
    }
    Ok(out)
}

pub fn load_player_stats(conn: &Connection, season: SeasonFilter) -> Result<Vec<PlayerSeasonStat>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                season_id, player_id, team_id, appearances, minutes_played,
                goals, assists, yellow_cards, red_cards
            FROM player_season_stats
            WHERE (?1 IS NULL OR season_id = ?1)
            ORDER BY season_id ASC, player_id ASC, team_id ASC
            "#,
        )
        .context("prepare player season stats query")?;
    let rows = stmt
        .query_map(params![season.season_id()], |row| {
            Ok(PlayerSeasonStat {
                key: PlayerSeasonKey {
                    season_id: row.get(0)?,
                    player_id: row.get(1)?,
                    team_id: row.get(2)?,
                },
                totals: PlayerTotals {
                    appearances: row.get(3)?,
                    minutes_played: row.get(4)?,
                    goals: row.get(5)?,
                    assists: row.get(6)?,
                    yellow_cards: row.get(7)?,
                    red_cards: row.get(8)?,
                },
            })
        })
        .context("query player season stats")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode player season stat row")?);
    }
    Ok(out)
}

/// All-time record between two teams, summed over every stored season and
/// oriented to the canonical (smaller id, larger id) order.
pub fn all_time_pair(conn: &Connection, a: u32, b: u32) -> Result<Option<PairTotals>> {
    let Some(key) = PairKey::new(0, a, b) else {
        return Ok(None);
    };
    let (seasons, totals) = conn
        .query_row(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(total_matches), 0),
                COALESCE(SUM(small_wins), 0),
                COALESCE(SUM(large_wins), 0),
                COALESCE(SUM(draws), 0),
                COALESCE(SUM(small_goals), 0),
                COALESCE(SUM(large_goals), 0)
            FROM h2h_pair_stats
            WHERE team_small_id = ?1 AND team_large_id = ?2
            "#,
            params![key.team_small_id(), key.team_large_id()],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    PairTotals {
                        total_matches: row.get(1)?,
                        small_wins: row.get(2)?,
                        large_wins: row.get(3)?,
                        draws: row.get(4)?,
                        small_goals: row.get(5)?,
                        large_goals: row.get(6)?,
                    },
                ))
            },
        )
        .with_context(|| format!("query all-time h2h for {a} vs {b}"))?;
    Ok((seasons > 0).then_some(totals))
}
