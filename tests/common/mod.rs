#![allow(dead_code)]

use rusqlite::Connection;

use stats_rebuild::match_source::{self, MatchRecord, PlayerLine};
use stats_rebuild::store;

pub const A: u32 = 1;
pub const B: u32 = 2;
pub const C: u32 = 3;

pub fn db() -> Connection {
    store::open_in_memory().expect("in-memory db should open")
}

/// (match_id, season, home, away, home_score, away_score)
pub fn seed(conn: &Connection, rows: &[(u64, u32, u32, u32, i64, i64)]) {
    for &(id, season, home, away, hs, aws) in rows {
        match_source::record_match(conn, &MatchRecord::completed(id, season, home, away, hs, aws))
            .expect("match should insert");
    }
}

/// A 3:1 B and B 2:2 C in season 1.
pub fn seed_three_team_season(conn: &Connection) {
    seed(conn, &[(1, 1, A, B, 3, 1), (2, 1, B, C, 2, 2)]);
}

pub fn line(match_id: u64, player_id: u32, team_id: u32, minutes: i64, goals: i64) -> PlayerLine {
    PlayerLine {
        match_id,
        player_id: Some(i64::from(player_id)),
        team_id: Some(i64::from(team_id)),
        minutes_played: minutes,
        goals,
        ..PlayerLine::default()
    }
}

pub fn seed_lines(conn: &Connection, lines: &[PlayerLine]) {
    for l in lines {
        match_source::record_player_line(conn, l).expect("player line should insert");
    }
}
