use anyhow::{Context, Result};
use chrono::Duration;
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::RebuildError;
use crate::h2h;
use crate::match_source;
use crate::player_stats;
use crate::runs;
use crate::scope::{Derivation, RebuildScope, SeasonFilter};
use crate::standings;
use crate::store;
use crate::team_seasons;
use crate::team_stats;
use crate::validation::{self, ValidMatch, ValidPlayerLine};

/// Rows written per derivation. Derivations outside the scope stay at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RebuildReport {
    pub standings: usize,
    pub player_season_stats: usize,
    pub team_season_stats: usize,
    pub team_seasons: usize,
    pub h2h_pair_stats: usize,
}

impl RebuildReport {
    pub fn count(&self, derivation: Derivation) -> usize {
        match derivation {
            Derivation::Standings => self.standings,
            Derivation::PlayerStats => self.player_season_stats,
            Derivation::TeamStats => self.team_season_stats,
            Derivation::TeamSeasons => self.team_seasons,
            Derivation::H2h => self.h2h_pair_stats,
        }
    }

    fn set(&mut self, derivation: Derivation, rows: usize) {
        let slot = match derivation {
            Derivation::Standings => &mut self.standings,
            Derivation::PlayerStats => &mut self.player_season_stats,
            Derivation::TeamStats => &mut self.team_season_stats,
            Derivation::TeamSeasons => &mut self.team_seasons,
            Derivation::H2h => &mut self.h2h_pair_stats,
        };
        *slot = rows;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildState {
    Idle,
    Running(RebuildScope),
    Succeeded(RebuildReport),
    Failed(String),
}

impl RebuildState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RebuildState::Succeeded(_) | RebuildState::Failed(_))
    }
}

/// Validated input shared by every derivation of one run.
#[derive(Debug, Clone, Default)]
pub struct RebuildInputs {
    pub matches: Vec<ValidMatch>,
    pub player_lines: Vec<ValidPlayerLine>,
    pub skipped_matches: usize,
    pub skipped_player_lines: usize,
}

pub fn load_inputs(
    conn: &Connection,
    season: SeasonFilter,
    with_player_lines: bool,
) -> Result<RebuildInputs> {
    let candidates = match_source::load_completed_matches(conn, season)?;
    let filtered = validation::filter_valid(candidates);
    let mut inputs = RebuildInputs {
        skipped_matches: filtered.skipped.len(),
        matches: filtered.valid,
        ..RebuildInputs::default()
    };
    if with_player_lines {
        let lines = match_source::load_player_lines(conn, season)?;
        let lines = validation::filter_player_lines(lines, &inputs.matches);
        inputs.player_lines = lines.valid;
        inputs.skipped_player_lines = lines.skipped;
    }
    Ok(inputs)
}

/// One rebuild invocation. A job runs at most once; a finished job has to be
/// replaced by a new one to rebuild again.
#[derive(Debug)]
pub struct RebuildJob {
    scope: RebuildScope,
    state: RebuildState,
    lock_lease: Duration,
}

impl RebuildJob {
    pub fn new(scope: RebuildScope) -> Self {
        Self {
            scope,
            state: RebuildState::Idle,
            lock_lease: Duration::seconds(i64::from(runs::DEFAULT_LOCK_LEASE_SECS)),
        }
    }

    /// Age after which another job's overlapping lock is considered abandoned.
    pub fn with_lock_lease(mut self, lease: Duration) -> Self {
        self.lock_lease = lease;
        self
    }

    pub fn scope(&self) -> &RebuildScope {
        &self.scope
    }

    pub fn state(&self) -> &RebuildState {
        &self.state
    }

    pub fn run(&mut self, conn: &mut Connection) -> Result<RebuildReport, RebuildError> {
        if self.state != RebuildState::Idle {
            return Err(RebuildError::AlreadyFinished);
        }
        let scope = self.scope;

        let mut guard = RunGuard::start(conn, &scope, self.lock_lease)?;
        let run_id = guard.run_id;
        info!(run_id, scope = %scope, "rebuild started");
        self.state = RebuildState::Running(scope);

        let result = execute(guard.conn(), &scope);
        match &result {
            Ok(report) => guard.finish(Ok(report)),
            Err(err) => {
                let message = err.to_string();
                guard.finish(Err(message.as_str()));
            }
        }

        match result {
            Ok(report) => {
                info!(run_id, ?report, "rebuild succeeded");
                self.state = RebuildState::Succeeded(report);
                Ok(report)
            }
            Err(err) => {
                error!(run_id, error = %err, "rebuild failed");
                self.state = RebuildState::Failed(err.to_string());
                Err(err)
            }
        }
    }
}

pub fn rebuild(conn: &mut Connection, scope: RebuildScope) -> Result<RebuildReport, RebuildError> {
    RebuildJob::new(scope).run(conn)
}

/// Holds the scope lock and the ledger row of one run. Dropping it without
/// `finish`, as an unwinding panic does, records the run as aborted; the lock
/// is released on every path.
struct RunGuard<'c> {
    conn: &'c mut Connection,
    season: SeasonFilter,
    run_id: i64,
    finished: bool,
}

impl<'c> RunGuard<'c> {
    fn start(
        conn: &'c mut Connection,
        scope: &RebuildScope,
        lease: Duration,
    ) -> Result<Self, RebuildError> {
        let blocker = runs::acquire_scope_lock(conn, scope.season, lease)
            .map_err(RebuildError::storage)?;
        if let Some(held) = blocker {
            let since = runs::lock_acquired_at(conn, held)
                .ok()
                .flatten()
                .unwrap_or_else(|| "unknown".to_string());
            warn!(scope = %scope, held = %held, since = %since, "rebuild refused, scope busy");
            return Err(RebuildError::ScopeBusy {
                requested: scope.season.to_string(),
                held: format!("{held} since {since}"),
            });
        }

        match runs::start_run(conn, scope) {
            Ok(run_id) => Ok(Self {
                conn,
                season: scope.season,
                run_id,
                finished: false,
            }),
            Err(err) => {
                release_lock(conn, scope.season);
                Err(RebuildError::storage(err))
            }
        }
    }

    fn conn(&mut self) -> &mut Connection {
        &mut *self.conn
    }

    fn finish(mut self, outcome: Result<&RebuildReport, &str>) {
        record_outcome(self.conn, self.run_id, outcome);
        self.finished = true;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            error!(run_id = self.run_id, "rebuild aborted before completion");
            record_outcome(self.conn, self.run_id, Err("aborted before completion"));
        }
        release_lock(self.conn, self.season);
    }
}

fn record_outcome(conn: &Connection, run_id: i64, outcome: Result<&RebuildReport, &str>) {
    if let Err(err) = runs::finish_run(conn, run_id, outcome) {
        warn!(run_id, error = %format!("{err:#}"), "failed to record rebuild outcome");
    }
}

fn release_lock(conn: &Connection, season: SeasonFilter) {
    if let Err(err) = runs::release_scope_lock(conn, season) {
        warn!(season = %season, error = %format!("{err:#}"), "failed to release scope lock");
    }
}

fn execute(conn: &mut Connection, scope: &RebuildScope) -> Result<RebuildReport, RebuildError> {
    let plan = scope.plan();
    let inputs = if plan.iter().any(|d| d.reads_matches()) {
        let with_player_lines = plan.contains(&Derivation::PlayerStats);
        let inputs = load_inputs(conn, scope.season, with_player_lines)
            .map_err(|cause| RebuildError::Source { cause })?;
        info!(
            valid = inputs.matches.len(),
            skipped = inputs.skipped_matches,
            skipped_player_lines = inputs.skipped_player_lines,
            "match source loaded"
        );
        inputs
    } else {
        RebuildInputs::default()
    };

    let mut report = RebuildReport::default();
    for derivation in plan {
        let rows = run_derivation(conn, derivation, scope.season, &inputs).map_err(|cause| {
            RebuildError::Derivation { derivation, cause }
        })?;
        report.set(derivation, rows);
    }
    Ok(report)
}

/// Delete, recompute and insert one derivation inside a single transaction so
/// a failed insert leaves the previous rows in place.
fn run_derivation(
    conn: &mut Connection,
    derivation: Derivation,
    season: SeasonFilter,
    inputs: &RebuildInputs,
) -> Result<usize> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .with_context(|| format!("begin {derivation} transaction"))?;
    let deleted = store::delete_scoped(&tx, derivation, season)?;
    debug!(%derivation, %season, deleted, "cleared derived rows");

    let written = match derivation {
        Derivation::Standings => {
            store::insert_standings(&tx, &standings::build_standings(&inputs.matches))?
        }
        Derivation::PlayerStats => store::insert_player_stats(
            &tx,
            &player_stats::build_player_stats(&inputs.player_lines),
        )?,
        Derivation::TeamStats => {
            let finalized = store::load_standings(&tx, season)?;
            store::insert_team_season_stats(&tx, &team_stats::project(&finalized))?
        }
        Derivation::TeamSeasons => store::insert_team_seasons(
            &tx,
            &team_seasons::derive_team_seasons(&inputs.matches),
        )?,
        Derivation::H2h => {
            store::insert_pair_stats(&tx, &h2h::build_pair_stats(&inputs.matches))?
        }
    };

    tx.commit()
        .with_context(|| format!("commit {derivation} transaction"))?;
    info!(%derivation, %season, deleted, written, "derivation rebuilt");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use super::*;
    use crate::match_source::{self, MatchRecord};
    use crate::runs::RunStatus;

    #[test]
    fn panic_mid_run_releases_lock_and_fails_the_run() {
        let mut conn = store::open_in_memory().unwrap();
        match_source::record_match(&conn, &MatchRecord::completed(1, 1, 10, 20, 2, 1)).unwrap();
        let scope = RebuildScope::everything();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut guard = RunGuard::start(&mut conn, &scope, Duration::hours(1)).unwrap();
            let tx = guard.conn().transaction().unwrap();
            store::delete_scoped(&tx, Derivation::Standings, scope.season).unwrap();
            panic!("derivation blew up");
        }));
        assert!(outcome.is_err());

        assert!(runs::lock_acquired_at(&conn, SeasonFilter::All).unwrap().is_none());
        let last = runs::recent_runs(&conn, 1).unwrap().remove(0);
        assert_eq!(last.status, RunStatus::Failed);
        assert_eq!(last.error.as_deref(), Some("aborted before completion"));

        let report = rebuild(&mut conn, scope).unwrap();
        assert_eq!(report.standings, 2);
    }

    #[test]
    fn unreadable_match_table_is_a_source_error() {
        let mut conn = store::open_in_memory().unwrap();
        conn.execute_batch("DROP TABLE matches;").unwrap();

        let err = rebuild(&mut conn, RebuildScope::everything()).unwrap_err();
        assert!(matches!(err, RebuildError::Source { .. }));
        assert!(err.to_string().starts_with("loading match data failed"));
        assert!(runs::lock_acquired_at(&conn, SeasonFilter::All).unwrap().is_none());
    }
}
