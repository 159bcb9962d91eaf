use std::fmt;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use crate::scope::SeasonFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    Scheduled,
    Live,
    Completed,
    Postponed,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Live => "live",
            MatchStatus::Completed => "completed",
            MatchStatus::Postponed => "postponed",
            MatchStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of the authoritative `matches` table as the recording workflow writes it.
#[derive(Debug, Clone)]
pub struct MatchRecord {
    pub match_id: u64,
    pub season_id: Option<u32>,
    pub home_team_id: Option<u32>,
    pub away_team_id: Option<u32>,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub status: MatchStatus,
    pub kickoff_utc: Option<String>,
}

impl MatchRecord {
    pub fn completed(
        match_id: u64,
        season_id: u32,
        home_team_id: u32,
        away_team_id: u32,
        home_score: i64,
        away_score: i64,
    ) -> Self {
        Self {
            match_id,
            season_id: Some(season_id),
            home_team_id: Some(home_team_id),
            away_team_id: Some(away_team_id),
            home_score: Some(home_score),
            away_score: Some(away_score),
            status: MatchStatus::Completed,
            kickoff_utc: None,
        }
    }
}

/// A completed, scored match before the foreign keys have been checked. Ids
/// are kept as stored so out-of-range values reach the skip filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateMatch {
    pub match_id: u64,
    pub season_id: Option<i64>,
    pub home_team_id: Option<i64>,
    pub away_team_id: Option<i64>,
    pub home_score: i64,
    pub away_score: i64,
}

/// One player's line in one match. A second line for the same player in the
/// same match replaces the first.
#[derive(Debug, Clone, Default)]
pub struct PlayerLine {
    pub match_id: u64,
    pub player_id: Option<i64>,
    pub team_id: Option<i64>,
    pub minutes_played: i64,
    pub goals: i64,
    pub assists: i64,
    pub yellow_cards: i64,
    pub red_cards: i64,
}

pub fn init_source_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS matches (
            match_id INTEGER PRIMARY KEY,
            season_id INTEGER NULL,
            home_team_id INTEGER NULL,
            away_team_id INTEGER NULL,
            home_score INTEGER NULL,
            away_score INTEGER NULL,
            status TEXT NOT NULL,
            kickoff_utc TEXT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_season ON matches(season_id);
        CREATE INDEX IF NOT EXISTS idx_matches_status ON matches(status);

        CREATE TABLE IF NOT EXISTS match_player_stats (
            line_id INTEGER PRIMARY KEY AUTOINCREMENT,
            match_id INTEGER NOT NULL,
            player_id INTEGER NULL,
            team_id INTEGER NULL,
            minutes_played INTEGER NOT NULL DEFAULT 0,
            goals INTEGER NOT NULL DEFAULT 0,
            assists INTEGER NOT NULL DEFAULT 0,
            yellow_cards INTEGER NOT NULL DEFAULT 0,
            red_cards INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_player_lines_match ON match_player_stats(match_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_player_lines_player
            ON match_player_stats(match_id, player_id);
        "#,
    )
    .context("create match source schema")?;
    Ok(())
}

pub fn record_match(conn: &Connection, m: &MatchRecord) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO matches (
            match_id, season_id, home_team_id, away_team_id,
            home_score, away_score, status, kickoff_utc
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(match_id) DO UPDATE SET
            season_id = excluded.season_id,
            home_team_id = excluded.home_team_id,
            away_team_id = excluded.away_team_id,
            home_score = excluded.home_score,
            away_score = excluded.away_score,
            status = excluded.status,
            kickoff_utc = excluded.kickoff_utc
        "#,
        params![
            m.match_id as i64,
            m.season_id,
            m.home_team_id,
            m.away_team_id,
            m.home_score,
            m.away_score,
            m.status.as_str(),
            m.kickoff_utc,
        ],
    )
    .with_context(|| format!("upsert match {}", m.match_id))?;
    Ok(())
}

pub fn record_player_line(conn: &Connection, line: &PlayerLine) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO match_player_stats (
            match_id, player_id, team_id, minutes_played,
            goals, assists, yellow_cards, red_cards
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(match_id, player_id) DO UPDATE SET
            team_id = excluded.team_id,
            minutes_played = excluded.minutes_played,
            goals = excluded.goals,
            assists = excluded.assists,
            yellow_cards = excluded.yellow_cards,
            red_cards = excluded.red_cards
        "#,
        params![
            line.match_id as i64,
            line.player_id,
            line.team_id,
            line.minutes_played,
            line.goals,
            line.assists,
            line.yellow_cards,
            line.red_cards,
        ],
    )
    .with_context(|| {
        format!(
            "upsert player line for match {} player {:?}",
            line.match_id, line.player_id
        )
    })?;
    Ok(())
}

pub fn load_completed_matches(
    conn: &Connection,
    season: SeasonFilter,
) -> Result<Vec<CandidateMatch>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                match_id, season_id, home_team_id, away_team_id,
                home_score, away_score
            FROM matches
            WHERE status = ?1
              AND home_score IS NOT NULL
              AND away_score IS NOT NULL
              AND (?2 IS NULL OR season_id = ?2)
            ORDER BY match_id ASC
            "#,
        )
        .context("prepare completed matches query")?;

    let rows = stmt
        .query_map(
            params![MatchStatus::Completed.as_str(), season.season_id()],
            |row| {
                Ok(CandidateMatch {
                    match_id: row.get::<_, i64>(0)? as u64,
                    season_id: row.get(1)?,
                    home_team_id: row.get(2)?,
                    away_team_id: row.get(3)?,
                    home_score: row.get(4)?,
                    away_score: row.get(5)?,
                })
            },
        )
        .context("query completed matches")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode match row")?);
    }
    Ok(out)
}

pub fn load_player_lines(conn: &Connection, season: SeasonFilter) -> Result<Vec<PlayerLine>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                l.match_id, l.player_id, l.team_id, l.minutes_played,
                l.goals, l.assists, l.yellow_cards, l.red_cards
            FROM match_player_stats l
            JOIN matches m ON m.match_id = l.match_id
            WHERE m.status = ?1
              AND m.home_score IS NOT NULL
              AND m.away_score IS NOT NULL
              AND (?2 IS NULL OR m.season_id = ?2)
            ORDER BY l.match_id ASC, l.line_id ASC
            "#,
        )
        .context("prepare player lines query")?;

    let rows = stmt
        .query_map(
            params![MatchStatus::Completed.as_str(), season.season_id()],
            |row| {
                Ok(PlayerLine {
                    match_id: row.get::<_, i64>(0)? as u64,
                    player_id: row.get(1)?,
                    team_id: row.get(2)?,
                    minutes_played: row.get(3)?,
                    goals: row.get(4)?,
                    assists: row.get(5)?,
                    yellow_cards: row.get(6)?,
                    red_cards: row.get(7)?,
                })
            },
        )
        .context("query player lines")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode player line row")?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_source_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn reader_keeps_only_completed_scored_matches() {
        let conn = conn();
        record_match(&conn, &MatchRecord::completed(1, 1, 10, 20, 2, 0)).unwrap();
        let mut live = MatchRecord::completed(2, 1, 10, 30, 1, 1);
        live.status = MatchStatus::Live;
        record_match(&conn, &live).unwrap();
        let mut unscored = MatchRecord::completed(3, 1, 20, 30, 0, 0);
        unscored.away_score = None;
        record_match(&conn, &unscored).unwrap();
        record_match(&conn, &MatchRecord::completed(4, 2, 10, 20, 0, 3)).unwrap();

        let all = load_completed_matches(&conn, SeasonFilter::All).unwrap();
        assert_eq!(all.iter().map(|m| m.match_id).collect::<Vec<_>>(), vec![1, 4]);

        let season_two = load_completed_matches(&conn, SeasonFilter::One(2)).unwrap();
        assert_eq!(season_two.len(), 1);
        assert_eq!(season_two[0].away_score, 3);
    }

    #[test]
    fn reader_keeps_null_foreign_keys_for_the_filter() {
        let conn = conn();
        let mut orphan = MatchRecord::completed(9, 1, 10, 20, 1, 0);
        orphan.home_team_id = None;
        record_match(&conn, &orphan).unwrap();

        let rows = load_completed_matches(&conn, SeasonFilter::All).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].home_team_id, None);
        assert_eq!(rows[0].season_id, Some(1));
    }

    #[test]
    fn reader_keeps_out_of_range_ids_for_the_filter() {
        let conn = conn();
        conn.execute(
            "INSERT INTO matches VALUES (2, 1, -5, 20, 1, 1, 'completed', NULL)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO match_player_stats (match_id, player_id, team_id, minutes_played)
             VALUES (2, -9, 5000000000, 90)",
            [],
        )
        .unwrap();

        let rows = load_completed_matches(&conn, SeasonFilter::All).unwrap();
        assert_eq!(rows[0].home_team_id, Some(-5));
        let lines = load_player_lines(&conn, SeasonFilter::All).unwrap();
        assert_eq!(lines[0].player_id, Some(-9));
        assert_eq!(lines[0].team_id, Some(5_000_000_000));
    }

    #[test]
    fn re_recorded_player_line_replaces_the_first() {
        let conn = conn();
        record_match(&conn, &MatchRecord::completed(1, 1, 10, 20, 2, 0)).unwrap();
        let mut line = PlayerLine {
            match_id: 1,
            player_id: Some(7),
            team_id: Some(10),
            minutes_played: 90,
            goals: 1,
            ..PlayerLine::default()
        };
        record_player_line(&conn, &line).unwrap();
        line.goals = 2;
        record_player_line(&conn, &line).unwrap();

        let lines = load_player_lines(&conn, SeasonFilter::All).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].goals, 2);
        assert_eq!(lines[0].minutes_played, 90);
    }
}
