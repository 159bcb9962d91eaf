use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::ranking;
use crate::validation::ValidMatch;

pub const POINTS_FOR_WIN: u32 = 3;
pub const POINTS_FOR_DRAW: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TeamSeasonKey {
    pub season_id: u32,
    pub team_id: u32,
}

impl TeamSeasonKey {
    pub fn new(season_id: u32, team_id: u32) -> Self {
        Self { season_id, team_id }
    }
}

impl fmt::Display for TeamSeasonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "season {} team {}", self.season_id, self.team_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StandingTotals {
    pub matches_played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub goal_difference: i64,
    pub points: u32,
}

impl StandingTotals {
    fn record(&mut self, scored: u32, conceded: u32) {
        self.matches_played += 1;
        self.goals_for += scored;
        self.goals_against += conceded;
        match scored.cmp(&conceded) {
            std::cmp::Ordering::Greater => {
                self.wins += 1;
                self.points += POINTS_FOR_WIN;
            }
            std::cmp::Ordering::Less => self.losses += 1,
            std::cmp::Ordering::Equal => {
                self.draws += 1;
                self.points += POINTS_FOR_DRAW;
            }
        }
        self.goal_difference = i64::from(self.goals_for) - i64::from(self.goals_against);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StandingRow {
    pub key: TeamSeasonKey,
    pub position: u32,
    pub totals: StandingTotals,
}

/// Running (season, team) totals. Both sides of a match are updated together
/// so each entry is self-consistent after every call.
#[derive(Debug, Clone, Default)]
pub struct StandingsAccumulator {
    rows: HashMap<TeamSeasonKey, StandingTotals>,
}

impl StandingsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_matches(matches: &[ValidMatch]) -> Self {
        let mut acc = Self::new();
        for m in matches {
            acc.add_match(m);
        }
        acc
    }

    pub fn add_match(&mut self, m: &ValidMatch) {
        self.rows
            .entry(TeamSeasonKey::new(m.season_id, m.home_team_id))
            .or_default()
            .record(m.home_score, m.away_score);
        self.rows
            .entry(TeamSeasonKey::new(m.season_id, m.away_team_id))
            .or_default()
            .record(m.away_score, m.home_score);
    }

    pub fn get(&self, key: &TeamSeasonKey) -> Option<&StandingTotals> {
        self.rows.get(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_totals(self) -> HashMap<TeamSeasonKey, StandingTotals> {
        self.rows
    }
}

/// Accumulates and ranks in one go; rows come back by season, then position.
pub fn build_standings(matches: &[ValidMatch]) -> Vec<StandingRow> {
    ranking::assign_positions(StandingsAccumulator::from_matches(matches).into_totals())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn played(match_id: u64, home: u32, away: u32, hs: u32, aws: u32) -> ValidMatch {
        ValidMatch {
            match_id,
            season_id: 1,
            home_team_id: home,
            away_team_id: away,
            home_score: hs,
            away_score: aws,
        }
    }

    #[test]
    fn intermediate_state_stays_consistent() {
        let mut acc = StandingsAccumulator::new();
        acc.add_match(&played(1, 1, 2, 0, 2));
        let away = *acc.get(&TeamSeasonKey::new(1, 2)).unwrap();
        assert_eq!(away.goal_difference, 2);
        assert_eq!(away.points, 3);

        acc.add_match(&played(2, 2, 1, 1, 4));
        let team_two = *acc.get(&TeamSeasonKey::new(1, 2)).unwrap();
        assert_eq!(team_two.matches_played, 2);
        assert_eq!(team_two.goals_for, 3);
        assert_eq!(team_two.goals_against, 4);
        assert_eq!(team_two.goal_difference, -1);
        assert_eq!(team_two.points, team_two.wins * 3 + team_two.draws);
    }

    #[test]
    fn goalless_draw_gives_both_a_point() {
        let acc = StandingsAccumulator::from_matches(&[played(1, 5, 6, 0, 0)]);
        for team in [5, 6] {
            let row = acc.get(&TeamSeasonKey::new(1, team)).unwrap();
            assert_eq!((row.draws, row.points, row.goal_difference), (1, 1, 0));
        }
    }
}
