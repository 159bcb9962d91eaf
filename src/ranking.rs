use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::standings::{StandingRow, StandingTotals, TeamSeasonKey};

/// Points, then goal difference, then goals scored, all descending. Rows still
/// level after that are ordered by team id ascending.
pub fn compare_standings(a: &StandingRow, b: &StandingRow) -> Ordering {
    b.totals
        .points
        .cmp(&a.totals.points)
        .then_with(|| b.totals.goal_difference.cmp(&a.totals.goal_difference))
        .then_with(|| b.totals.goals_for.cmp(&a.totals.goals_for))
        .then_with(|| a.key.team_id.cmp(&b.key.team_id))
}

/// Dense 1..N positions per season. Output is grouped by season ascending and
/// ordered by position within each season.
pub fn assign_positions(
    totals: impl IntoIterator<Item = (TeamSeasonKey, StandingTotals)>,
) -> Vec<StandingRow> {
    let mut seasons: BTreeMap<u32, Vec<StandingRow>> = BTreeMap::new();
    for (key, totals) in totals {
        seasons.entry(key.season_id).or_default().push(StandingRow {
            key,
            position: 0,
            totals,
        });
    }

    let mut out = Vec::new();
    for (_, mut rows) in seasons {
        rows.sort_by(compare_standings);
        for (idx, row) in rows.iter_mut().enumerate() {
            row.position = idx as u32 + 1;
        }
        out.extend(rows);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(points: u32, goal_difference: i64, goals_for: u32) -> StandingTotals {
        StandingTotals {
            points,
            goal_difference,
            goals_for,
            ..StandingTotals::default()
        }
    }

    #[test]
    fn keys_apply_in_order() {
        let rows = assign_positions([
            (TeamSeasonKey::new(1, 1), totals(4, 5, 9)),
            (TeamSeasonKey::new(1, 2), totals(6, -1, 2)),
            (TeamSeasonKey::new(1, 3), totals(4, 5, 10)),
            (TeamSeasonKey::new(1, 4), totals(4, 6, 1)),
        ]);
        let order = rows.iter().map(|r| r.key.team_id).collect::<Vec<_>>();
        assert_eq!(order, vec![2, 4, 3, 1]);
        assert_eq!(
            rows.iter().map(|r| r.position).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn full_ties_fall_back_to_team_id() {
        let forward = assign_positions([
            (TeamSeasonKey::new(1, 9), totals(3, 1, 2)),
            (TeamSeasonKey::new(1, 4), totals(3, 1, 2)),
        ]);
        let reversed = assign_positions([
            (TeamSeasonKey::new(1, 4), totals(3, 1, 2)),
            (TeamSeasonKey::new(1, 9), totals(3, 1, 2)),
        ]);
        assert_eq!(forward, reversed);
        assert_eq!(forward[0].key.team_id, 4);
    }

    #[test]
    fn positions_restart_per_season() {
        let rows = assign_positions([
            (TeamSeasonKey::new(2, 1), totals(1, 0, 0)),
            (TeamSeasonKey::new(1, 1), totals(0, 0, 0)),
            (TeamSeasonKey::new(1, 2), totals(3, 0, 0)),
        ]);
        let seen = rows
            .iter()
            .map(|r| (r.key.season_id, r.key.team_id, r.position))
            .collect::<Vec<_>>();
        assert_eq!(seen, vec![(1, 2, 1), (1, 1, 2), (2, 1, 1)]);
    }
}
