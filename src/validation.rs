use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::match_source::{CandidateMatch, PlayerLine};

/// Highest score a side may post; anything above is treated as a recording
/// error.
pub const MAX_SCORE: u32 = 99;
/// Longest single appearance, extra time and stoppages included.
pub const MAX_LINE_MINUTES: u32 = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    HomeWin,
    Draw,
    AwayWin,
}

pub fn classify_outcome(home_score: u32, away_score: u32) -> Outcome {
    if home_score > away_score {
        Outcome::HomeWin
    } else if home_score < away_score {
        Outcome::AwayWin
    } else {
        Outcome::Draw
    }
}

/// A completed match whose season and both sides are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidMatch {
    pub match_id: u64,
    pub season_id: u32,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub home_score: u32,
    pub away_score: u32,
}

impl ValidMatch {
    pub fn outcome(&self) -> Outcome {
        classify_outcome(self.home_score, self.away_score)
    }

    pub fn has_side(&self, team_id: u32) -> bool {
        self.home_team_id == team_id || self.away_team_id == team_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    Season,
    HomeTeam,
    AwayTeam,
}

impl MatchField {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchField::Season => "season_id",
            MatchField::HomeTeam => "home_team_id",
            MatchField::AwayTeam => "away_team_id",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingFields(Vec<MatchField>),
    /// Negative, too large for an id, or season 0.
    InvalidId { field: MatchField, value: i64 },
    SameTeam(u32),
    NegativeScore { home: i64, away: i64 },
    ScoreTooHigh { home: i64, away: i64 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingFields(fields) => {
                let names = fields.iter().map(|m| m.as_str()).collect::<Vec<_>>();
                write!(f, "missing {}", names.join(", "))
            }
            SkipReason::InvalidId { field, value } => {
                write!(f, "invalid {} {value}", field.as_str())
            }
            SkipReason::SameTeam(team_id) => write!(f, "team {team_id} on both sides"),
            SkipReason::NegativeScore { home, away } => {
                write!(f, "negative score {home}:{away}")
            }
            SkipReason::ScoreTooHigh { home, away } => {
                write!(f, "score {home}:{away} above {MAX_SCORE}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMatch {
    pub match_id: u64,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub valid: Vec<ValidMatch>,
    pub skipped: Vec<SkippedMatch>,
}

fn id_field(field: MatchField, raw: i64) -> Result<u32, SkipReason> {
    let invalid = SkipReason::InvalidId { field, value: raw };
    let id = u32::try_from(raw).map_err(|_| invalid.clone())?;
    if field == MatchField::Season && id == 0 {
        return Err(invalid);
    }
    Ok(id)
}

pub fn check_match(m: &CandidateMatch) -> Result<ValidMatch, SkipReason> {
    let fields = [
        (MatchField::Season, m.season_id),
        (MatchField::HomeTeam, m.home_team_id),
        (MatchField::AwayTeam, m.away_team_id),
    ];
    let missing = fields
        .iter()
        .filter(|(_, raw)| raw.is_none())
        .map(|(field, _)| *field)
        .collect::<Vec<_>>();
    let (Some(season_raw), Some(home_raw), Some(away_raw)) =
        (m.season_id, m.home_team_id, m.away_team_id)
    else {
        return Err(SkipReason::MissingFields(missing));
    };
    let season_id = id_field(MatchField::Season, season_raw)?;
    let home_team_id = id_field(MatchField::HomeTeam, home_raw)?;
    let away_team_id = id_field(MatchField::AwayTeam, away_raw)?;
    if home_team_id == away_team_id {
        return Err(SkipReason::SameTeam(home_team_id));
    }
    let (Ok(home_score), Ok(away_score)) =
        (u32::try_from(m.home_score), u32::try_from(m.away_score))
    else {
        return Err(SkipReason::NegativeScore {
            home: m.home_score,
            away: m.away_score,
        });
    };
    if home_score > MAX_SCORE || away_score > MAX_SCORE {
        return Err(SkipReason::ScoreTooHigh {
            home: m.home_score,
            away: m.away_score,
        });
    }
    Ok(ValidMatch {
        match_id: m.match_id,
        season_id,
        home_team_id,
        away_team_id,
        home_score,
        away_score,
    })
}

/// Splits candidates into matches every accumulator may use and matches that
/// are excluded from all of them. Skips are logged, never fatal.
pub fn filter_valid(candidates: Vec<CandidateMatch>) -> FilterOutcome {
    let mut out = FilterOutcome::default();
    for candidate in candidates {
        match check_match(&candidate) {
            Ok(valid) => out.valid.push(valid),
            Err(reason) => {
                warn!(match_id = candidate.match_id, reason = %reason, "skipping match");
                out.skipped.push(SkippedMatch {
                    match_id: candidate.match_id,
                    reason,
                });
            }
        }
    }
    out
}

/// A player's line from a valid match, tagged with the match's season.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidPlayerLine {
    pub season_id: u32,
    pub match_id: u64,
    pub player_id: u32,
    pub team_id: u32,
    pub minutes_played: u32,
    pub goals: u32,
    pub assists: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
}

#[derive(Debug, Clone, Default)]
pub struct PlayerLineOutcome {
    pub valid: Vec<ValidPlayerLine>,
    pub skipped: usize,
}

pub fn filter_player_lines(lines: Vec<PlayerLine>, matches: &[ValidMatch]) -> PlayerLineOutcome {
    let by_id = matches
        .iter()
        .map(|m| (m.match_id, m))
        .collect::<HashMap<_, _>>();

    let mut out = PlayerLineOutcome::default();
    for line in lines {
        let Some(parent) = by_id.get(&line.match_id) else {
            // The match itself was skipped and already logged.
            debug!(match_id = line.match_id, "dropping player line of skipped match");
            out.skipped += 1;
            continue;
        };
        let (Some(player_raw), Some(team_raw)) = (line.player_id, line.team_id) else {
            warn!(
                match_id = line.match_id,
                player_id = ?line.player_id,
                team_id = ?line.team_id,
                "skipping player line without player or team"
            );
            out.skipped += 1;
            continue;
        };
        let (Ok(player_id), Ok(team_id)) = (u32::try_from(player_raw), u32::try_from(team_raw))
        else {
            warn!(
                match_id = line.match_id,
                player_id = player_raw,
                team_id = team_raw,
                "skipping player line with out-of-range ids"
            );
            out.skipped += 1;
            continue;
        };
        if !parent.has_side(team_id) {
            warn!(
                match_id = line.match_id,
                player_id,
                team_id,
                "skipping player line for a team that did not play the match"
            );
            out.skipped += 1;
            continue;
        }
        let counts = [
            line.minutes_played,
            line.goals,
            line.assists,
            line.yellow_cards,
            line.red_cards,
        ]
        .map(u32::try_from);
        let [Ok(minutes_played), Ok(goals), Ok(assists), Ok(yellow_cards), Ok(red_cards)] = counts
        else {
            warn!(match_id = line.match_id, player_id, "skipping player line with negative counts");
            out.skipped += 1;
            continue;
        };
        if minutes_played > MAX_LINE_MINUTES
            || [goals, assists, yellow_cards, red_cards]
                .iter()
                .any(|&n| n > MAX_SCORE)
        {
            warn!(
                match_id = line.match_id,
                player_id,
                minutes_played,
                goals,
                "skipping player line with implausible counts"
            );
            out.skipped += 1;
            continue;
        }
        out.valid.push(ValidPlayerLine {
            season_id: parent.season_id,
            match_id: line.match_id,
            player_id,
            team_id,
            minutes_played,
            goals,
            assists,
            yellow_cards,
            red_cards,
        });
    }
    out
}
