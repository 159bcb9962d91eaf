use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::validation::ValidPlayerLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PlayerSeasonKey {
    pub season_id: u32,
    pub player_id: u32,
    pub team_id: u32,
}

impl fmt::Display for PlayerSeasonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "season {} player {} team {}",
            self.season_id, self.player_id, self.team_id
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PlayerTotals {
    pub appearances: u32,
    pub minutes_played: u32,
    pub goals: u32,
    pub assists: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
}

impl PlayerTotals {
    fn record(&mut self, line: &ValidPlayerLine) {
        // Unused substitutes are listed with zero minutes.
        if line.minutes_played > 0 {
            self.appearances += 1;
        }
        self.minutes_played += line.minutes_played;
        self.goals += line.goals;
        self.assists += line.assists;
        self.yellow_cards += line.yellow_cards;
        self.red_cards += line.red_cards;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlayerSeasonStat {
    pub key: PlayerSeasonKey,
    pub totals: PlayerTotals,
}

/// Season totals per player per team; a mid-season transfer yields one row
/// for each club.
pub fn build_player_stats(lines: &[ValidPlayerLine]) -> Vec<PlayerSeasonStat> {
    let mut acc: HashMap<PlayerSeasonKey, PlayerTotals> = HashMap::new();
    for line in lines {
        let key = PlayerSeasonKey {
            season_id: line.season_id,
            player_id: line.player_id,
            team_id: line.team_id,
        };
        acc.entry(key).or_default().record(line);
    }
    let mut rows = acc
        .into_iter()
        .map(|(key, totals)| PlayerSeasonStat { key, totals })
        .collect::<Vec<_>>();
    rows.sort_by_key(|row| row.key);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(match_id: u64, team_id: u32, minutes_played: u32, goals: u32) -> ValidPlayerLine {
        ValidPlayerLine {
            season_id: 1,
            match_id,
            player_id: 8,
            team_id,
            minutes_played,
            goals,
            assists: 0,
            yellow_cards: 0,
            red_cards: 0,
        }
    }

    #[test]
    fn bench_lines_do_not_count_as_appearances() {
        let rows = build_player_stats(&[line(1, 10, 90, 1), line(2, 10, 0, 0), line(3, 10, 25, 2)]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].totals.appearances, 2);
        assert_eq!(rows[0].totals.minutes_played, 115);
        assert_eq!(rows[0].totals.goals, 3);
    }

    #[test]
    fn transfers_split_by_team() {
        let rows = build_player_stats(&[line(1, 10, 90, 0), line(2, 20, 90, 1)]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key.team_id, 10);
        assert_eq!(rows[1].totals.goals, 1);
    }
}
