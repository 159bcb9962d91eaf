use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::validation::{Outcome, ValidMatch, classify_outcome};

/// Canonical unordered pair within a season: `team_small_id < team_large_id`
/// always holds, so a fixture and its reverse land on the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PairKey {
    season_id: u32,
    team_small_id: u32,
    team_large_id: u32,
}

impl PairKey {
    /// `None` when both ids are the same team.
    pub fn new(season_id: u32, a: u32, b: u32) -> Option<Self> {
        if a == b {
            return None;
        }
        Some(Self {
            season_id,
            team_small_id: a.min(b),
            team_large_id: a.max(b),
        })
    }

    pub fn season_id(&self) -> u32 {
        self.season_id
    }

    pub fn team_small_id(&self) -> u32 {
        self.team_small_id
    }

    pub fn team_large_id(&self) -> u32 {
        self.team_large_id
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "season {} pair {}-{}",
            self.season_id, self.team_small_id, self.team_large_id
        )
    }
}

/// Counts oriented to the canonical order, not to home/away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PairTotals {
    pub total_matches: u32,
    pub small_wins: u32,
    pub large_wins: u32,
    pub draws: u32,
    pub small_goals: u32,
    pub large_goals: u32,
}

impl PairTotals {
    fn record(&mut self, small_score: u32, large_score: u32) {
        self.total_matches += 1;
        self.small_goals += small_score;
        self.large_goals += large_score;
        match classify_outcome(small_score, large_score) {
            Outcome::HomeWin => self.small_wins += 1,
            Outcome::AwayWin => self.large_wins += 1,
            Outcome::Draw => self.draws += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PairStat {
    pub key: PairKey,
    pub totals: PairTotals,
}

#[derive(Debug, Clone, Default)]
pub struct HeadToHeadAccumulator {
    pairs: HashMap<PairKey, PairTotals>,
}

impl HeadToHeadAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_match(&mut self, m: &ValidMatch) {
        let Some(key) = PairKey::new(m.season_id, m.home_team_id, m.away_team_id) else {
            return;
        };
        let (small_score, large_score) = if key.team_small_id == m.home_team_id {
            (m.home_score, m.away_score)
        } else {
            (m.away_score, m.home_score)
        };
        self.pairs
            .entry(key)
            .or_default()
            .record(small_score, large_score);
    }

    pub fn get(&self, key: &PairKey) -> Option<&PairTotals> {
        self.pairs.get(key)
    }

    pub fn into_rows(self) -> Vec<PairStat> {
        let mut rows = self
            .pairs
            .into_iter()
            .map(|(key, totals)| PairStat { key, totals })
            .collect::<Vec<_>>();
        rows.sort_by_key(|row| row.key);
        rows
    }
}

pub fn build_pair_stats(matches: &[ValidMatch]) -> Vec<PairStat> {
    let mut acc = HeadToHeadAccumulator::new();
    for m in matches {
        acc.add_match(m);
    }
    acc.into_rows()
}
