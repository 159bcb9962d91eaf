use serde::Serialize;

use crate::standings::{StandingRow, TeamSeasonKey};

/// Read shape of a finalized standing, stored apart from the ranking table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TeamSeasonStat {
    pub key: TeamSeasonKey,
    pub matches_played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub points: u32,
}

impl From<&StandingRow> for TeamSeasonStat {
    fn from(row: &StandingRow) -> Self {
        let t = &row.totals;
        Self {
            key: row.key,
            matches_played: t.matches_played,
            wins: t.wins,
            draws: t.draws,
            losses: t.losses,
            goals_for: t.goals_for,
            goals_against: t.goals_against,
            points: t.points,
        }
    }
}

pub fn project(standings: &[StandingRow]) -> Vec<TeamSeasonStat> {
    standings.iter().map(TeamSeasonStat::from).collect()
}
