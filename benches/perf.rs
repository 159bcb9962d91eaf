use criterion::{Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

use stats_rebuild::h2h::build_pair_stats;
use stats_rebuild::player_stats::build_player_stats;
use stats_rebuild::standings::build_standings;
use stats_rebuild::validation::{ValidMatch, ValidPlayerLine};

/// Double round-robin over `teams` clubs for each season, seeded so runs are
/// repeatable.
fn sample_matches(seasons: u32, teams: u32) -> Vec<ValidMatch> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut out = Vec::new();
    let mut match_id = 0;
    for season_id in 1..=seasons {
        for home in 1..=teams {
            for away in 1..=teams {
                if home == away {
                    continue;
                }
                match_id += 1;
                out.push(ValidMatch {
                    match_id,
                    season_id,
                    home_team_id: home,
                    away_team_id: away,
                    home_score: rng.gen_range(0..5),
                    away_score: rng.gen_range(0..5),
                });
            }
        }
    }
    out
}

fn sample_lines(matches: &[ValidMatch]) -> Vec<ValidPlayerLine> {
    let mut out = Vec::with_capacity(matches.len() * 22);
    for m in matches {
        for (team_id, goals) in [(m.home_team_id, m.home_score), (m.away_team_id, m.away_score)] {
            for n in 0..11 {
                out.push(ValidPlayerLine {
                    season_id: m.season_id,
                    match_id: m.match_id,
                    player_id: team_id * 100 + n,
                    team_id,
                    minutes_played: 90,
                    goals: if n == 9 { goals } else { 0 },
                    assists: 0,
                    yellow_cards: 0,
                    red_cards: 0,
                });
            }
        }
    }
    out
}

fn bench_standings(c: &mut Criterion) {
    let matches = sample_matches(10, 20);
    c.bench_function("build_standings_10x20", |b| {
        b.iter(|| {
            let rows = build_standings(black_box(&matches));
            black_box(rows.len());
        })
    });
}

fn bench_head_to_head(c: &mut Criterion) {
    let matches = sample_matches(10, 20);
    c.bench_function("build_pair_stats_10x20", |b| {
        b.iter(|| {
            let rows = build_pair_stats(black_box(&matches));
            black_box(rows.len());
        })
    });
}

fn bench_player_stats(c: &mut Criterion) {
    let lines = sample_lines(&sample_matches(3, 20));
    c.bench_function("build_player_stats_3x20", |b| {
        b.iter(|| {
            let rows = build_player_stats(black_box(&lines));
            black_box(rows.len());
        })
    });
}

criterion_group!(benches, bench_standings, bench_head_to_head, bench_player_stats);
criterion_main!(benches);
