use std::collections::BTreeMap;
use std::fmt::{self, Debug, Display};

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::h2h;
use crate::player_stats;
use crate::rebuild::load_inputs;
use crate::scope::{Derivation, SeasonFilter};
use crate::standings;
use crate::store;
use crate::team_seasons;
use crate::team_stats;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// Recomputed but absent from storage.
    Missing,
    /// Stored but no longer produced by the match data.
    Unexpected,
    Mismatch { stored: String, expected: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    pub derivation: Derivation,
    pub key: String,
    #[serde(flatten)]
    pub kind: DiscrepancyKind,
}

impl Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiscrepancyKind::Missing => write!(f, "{} {}: missing", self.derivation, self.key),
            DiscrepancyKind::Unexpected => {
                write!(f, "{} {}: unexpected row", self.derivation, self.key)
            }
            DiscrepancyKind::Mismatch { stored, expected } => write!(
                f,
                "{} {}: stored {stored}, expected {expected}",
                self.derivation, self.key
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub rows_checked: usize,
    pub discrepancies: Vec<Discrepancy>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }

    fn compare<K, V>(
        &mut self,
        derivation: Derivation,
        stored: BTreeMap<K, V>,
        mut expected: BTreeMap<K, V>,
    ) where
        K: Ord + Display,
        V: PartialEq + Debug,
    {
        self.rows_checked += stored.len().max(expected.len());
        for (key, stored_value) in stored {
            match expected.remove(&key) {
                None => self.discrepancies.push(Discrepancy {
                    derivation,
                    key: key.to_string(),
                    kind: DiscrepancyKind::Unexpected,
                }),
                Some(expected_value) if expected_value != stored_value => {
                    self.discrepancies.push(Discrepancy {
                        derivation,
                        key: key.to_string(),
                        kind: DiscrepancyKind::Mismatch {
                            stored: format!("{stored_value:?}"),
                            expected: format!("{expected_value:?}"),
                        },
                    })
                }
                Some(_) => {}
            }
        }
        for key in expected.into_keys() {
            self.discrepancies.push(Discrepancy {
                derivation,
                key: key.to_string(),
                kind: DiscrepancyKind::Missing,
            });
        }
    }
}

/// Recomputes every derivation for `season` from the match tables and compares
/// the result with what is stored. Read-only.
pub fn validate(conn: &Connection, season: SeasonFilter) -> Result<ValidationReport> {
    let inputs = load_inputs(conn, season, true)?;
    let mut report = ValidationReport::default();

    let expected_standings = standings::build_standings(&inputs.matches);
    report.compare(
        Derivation::Standings,
        store::load_standings(conn, season)?
            .into_iter()
            .map(|r| (r.key, (r.position, r.totals)))
            .collect(),
        expected_standings
            .iter()
            .map(|r| (r.key, (r.position, r.totals)))
            .collect(),
    );

    report.compare(
        Derivation::PlayerStats,
        store::load_player_stats(conn, season)?
            .into_iter()
            .map(|r| (r.key, r.totals))
            .collect(),
        player_stats::build_player_stats(&inputs.player_lines)
            .into_iter()
            .map(|r| (r.key, r.totals))
            .collect(),
    );

    report.compare(
        Derivation::TeamStats,
        store::load_team_season_stats(conn, season)?
            .into_iter()
            .map(|r| (r.key, r))
            .collect(),
        team_stats::project(&expected_standings)
            .into_iter()
            .map(|r| (r.key, r))
            .collect(),
    );

    report.compare(
        Derivation::TeamSeasons,
        store::load_team_seasons(conn, season)?
            .into_iter()
            .map(|k| (k, ()))
            .collect(),
        team_seasons::derive_team_seasons(&inputs.matches)
            .into_iter()
            .map(|k| (k, ()))
            .collect(),
    );

    report.compare(
        Derivation::H2h,
        store::load_pair_stats(conn, season)?
            .into_iter()
            .map(|r| (r.key, r.totals))
            .collect(),
        h2h::build_pair_stats(&inputs.matches)
            .into_iter()
            .map(|r| (r.key, r.totals))
            .collect(),
    );

    Ok(report)
}

/// SHA-256 over every derived row in key order, hex encoded.
pub fn fingerprint(conn: &Connection) -> Result<String> {
    let all = SeasonFilter::All;
    let mut hasher = Sha256::new();
    for row in store::load_standings(conn, all)? {
        hasher.update(format!("standings|{}|{}|{:?}\n", row.key, row.position, row.totals));
    }
    for row in store::load_player_stats(conn, all)? {
        hasher.update(format!("player_stats|{}|{:?}\n", row.key, row.totals));
    }
    for row in store::load_team_season_stats(conn, all)? {
        hasher.update(format!("team_stats|{row:?}\n"));
    }
    for key in store::load_team_seasons(conn, all)? {
        hasher.update(format!("team_seasons|{key}\n"));
    }
    for row in store::load_pair_stats(conn, all)? {
        hasher.update(format!("h2h|{}|{:?}\n", row.key, row.totals));
    }
    Ok(format!("{:x}", hasher.finalize()))
}
