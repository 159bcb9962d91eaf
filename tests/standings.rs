mod common;

use common::{A, B, C};
use stats_rebuild::standings::{POINTS_FOR_DRAW, POINTS_FOR_WIN, TeamSeasonKey, build_standings};
use stats_rebuild::validation::ValidMatch;
use stats_rebuild::{RebuildScope, SeasonFilter, rebuild, store};

fn m(match_id: u64, season_id: u32, home: u32, away: u32, hs: u32, aws: u32) -> ValidMatch {
    ValidMatch {
        match_id,
        season_id,
        home_team_id: home,
        away_team_id: away,
        home_score: hs,
        away_score: aws,
    }
}

#[test]
fn three_team_table_matches_hand_computed_totals() {
    let mut conn = common::db();
    common::seed_three_team_season(&conn);
    rebuild(&mut conn, RebuildScope::everything()).expect("rebuild should succeed");

    let rows = store::load_standings(&conn, SeasonFilter::One(1)).expect("standings load");
    let order = rows.iter().map(|r| (r.key.team_id, r.position)).collect::<Vec<_>>();
    assert_eq!(order, vec![(A, 1), (C, 2), (B, 3)]);

    let a = &rows[0].totals;
    assert_eq!((a.matches_played, a.wins, a.draws, a.losses), (1, 1, 0, 0));
    assert_eq!((a.goals_for, a.goals_against, a.goal_difference, a.points), (3, 1, 2, 3));

    let c = &rows[1].totals;
    assert_eq!((c.matches_played, c.wins, c.draws, c.losses), (1, 0, 1, 0));
    assert_eq!((c.goals_for, c.goals_against, c.goal_difference, c.points), (2, 2, 0, 1));

    let b = &rows[2].totals;
    assert_eq!((b.matches_played, b.wins, b.draws, b.losses), (2, 0, 1, 1));
    assert_eq!((b.goals_for, b.goals_against, b.goal_difference, b.points), (3, 5, -2, 1));
}

#[test]
fn totals_satisfy_table_identities() {
    let matches = vec![
        m(1, 1, 10, 20, 2, 0),
        m(2, 1, 20, 30, 1, 1),
        m(3, 1, 30, 10, 4, 2),
        m(4, 1, 10, 20, 0, 0),
        m(5, 1, 20, 10, 3, 1),
        m(6, 2, 10, 30, 1, 0),
    ];
    let rows = build_standings(&matches);
    let decisive = matches.iter().filter(|x| x.home_score != x.away_score).count() as u32;

    let mut wins = 0;
    let mut losses = 0;
    for row in &rows {
        let t = &row.totals;
        assert_eq!(t.matches_played, t.wins + t.draws + t.losses, "{}", row.key);
        assert_eq!(t.points, POINTS_FOR_WIN * t.wins + POINTS_FOR_DRAW * t.draws);
        assert_eq!(t.goal_difference, i64::from(t.goals_for) - i64::from(t.goals_against));
        wins += t.wins;
        losses += t.losses;
    }
    assert_eq!(wins, losses);
    assert_eq!(wins, decisive);

    for season in [1, 2] {
        let positions = rows
            .iter()
            .filter(|r| r.key.season_id == season)
            .map(|r| r.position)
            .collect::<Vec<_>>();
        let expected = (1..=positions.len() as u32).collect::<Vec<_>>();
        assert_eq!(positions, expected, "season {season} positions are dense");
    }
}

#[test]
fn ranking_is_independent_of_match_order() {
    let matches = vec![
        m(1, 1, 5, 6, 1, 1),
        m(2, 1, 7, 8, 2, 2),
        m(3, 1, 5, 7, 0, 0),
        m(4, 1, 6, 8, 1, 1),
    ];
    let forward = build_standings(&matches);
    let mut reversed = matches.clone();
    reversed.reverse();
    assert_eq!(forward, build_standings(&reversed));
}

#[test]
fn full_ties_fall_back_to_team_id() {
    let rows = build_standings(&[m(1, 1, 9, 4, 1, 1)]);
    assert_eq!(rows[0].key, TeamSeasonKey::new(1, 4));
    assert_eq!(rows[0].position, 1);
    assert_eq!(rows[1].key, TeamSeasonKey::new(1, 9));
    assert_eq!(rows[1].position, 2);
}

#[test]
fn goals_for_breaks_equal_goal_difference() {
    // 11 and 12 both finish +0 on one point; 12 scored more.
    let rows = build_standings(&[m(1, 1, 11, 13, 0, 0), m(2, 1, 12, 14, 3, 3)]);
    let order = rows.iter().map(|r| r.key.team_id).collect::<Vec<_>>();
    assert_eq!(order, vec![12, 14, 11, 13]);
}
