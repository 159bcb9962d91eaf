use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde::Serialize;
use tracing::warn;

use crate::rebuild::RebuildReport;
use crate::scope::{RebuildScope, SeasonFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "running" => Some(RunStatus::Running),
            "succeeded" => Some(RunStatus::Succeeded),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub season_id: Option<u32>,
    pub derivation: String,
    pub status: RunStatus,
    pub report: Option<RebuildReport>,
    pub error: Option<String>,
}

pub fn start_run(conn: &Connection, scope: &RebuildScope) -> Result<i64> {
    let started_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO rebuild_runs(started_at, finished_at, season_id, derivation, status, report_json, error)
         VALUES (?1, NULL, ?2, ?3, ?4, NULL, NULL)",
        params![
            started_at,
            scope.season.season_id(),
            scope.selector.as_str(),
            RunStatus::Running.as_str(),
        ],
    )
    .context("insert rebuild run")?;
    Ok(conn.last_insert_rowid())
}

pub fn finish_run(conn: &Connection, run_id: i64, outcome: Result<&RebuildReport, &str>) -> Result<()> {
    let finished_at = Utc::now().to_rfc3339();
    let (status, report_json, error) = match outcome {
        Ok(report) => (
            RunStatus::Succeeded,
            Some(serde_json::to_string(report).context("serialize rebuild report")?),
            None,
        ),
        Err(message) => (RunStatus::Failed, None, Some(message.to_string())),
    };
    conn.execute(
        "UPDATE rebuild_runs
         SET finished_at = ?1, status = ?2, report_json = ?3, error = ?4
         WHERE run_id = ?5",
        params![finished_at, status.as_str(), report_json, error, run_id],
    )
    .context("update rebuild run")?;
    Ok(())
}

pub fn recent_runs(conn: &Connection, limit: usize) -> Result<Vec<RunRecord>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT run_id, started_at, finished_at, season_id, derivation, status, report_json, error
            FROM rebuild_runs
            ORDER BY run_id DESC
            LIMIT ?1
            "#,
        )
        .context("prepare rebuild runs query")?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<u32>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
            ))
        })
        .context("query rebuild runs")?;

    let mut out = Vec::new();
    for row in rows {
        let (run_id, started_at, finished_at, season_id, derivation, status, report_json, error) =
            row.context("decode rebuild run row")?;
        let status = RunStatus::parse(&status)
            .with_context(|| format!("unknown status '{status}' on rebuild run {run_id}"))?;
        let report = match report_json {
            Some(raw) => Some(
                serde_json::from_str::<RebuildReport>(&raw)
                    .with_context(|| format!("invalid report json on rebuild run {run_id}"))?,
            ),
            None => None,
        };
        out.push(RunRecord {
            run_id,
            started_at,
            finished_at,
            season_id,
            derivation,
            status,
            report,
            error,
        });
    }
    Ok(out)
}

/// Lock age after which a holder is presumed dead (killed process, host
/// restart) and the lock may be taken over.
pub const DEFAULT_LOCK_LEASE_SECS: u32 = 6 * 60 * 60;

/// Takes the advisory lock for `season`. Returns the held scope that blocks it
/// when an overlapping rebuild is in progress. Overlapping locks older than
/// `lease` are taken over and their `running` ledger rows marked failed.
pub fn acquire_scope_lock(
    conn: &mut Connection,
    season: SeasonFilter,
    lease: Duration,
) -> Result<Option<SeasonFilter>> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .context("begin lock transaction")?;
    let now = Utc::now();
    for (key, acquired_at) in held_locks(&tx)? {
        let Some(other) = SeasonFilter::from_lock_key(&key) else {
            continue;
        };
        if !other.overlaps(season) {
            continue;
        }
        if !lease_expired(&acquired_at, now, lease) {
            return Ok(Some(other));
        }
        warn!(held = %other, acquired_at = %acquired_at, "taking over expired scope lock");
        tx.execute("DELETE FROM rebuild_locks WHERE scope_key = ?1", params![key])
            .context("delete expired scope lock")?;
        abandon_running_runs(&tx, other, "abandoned: scope lock lease expired")?;
    }
    tx.execute(
        "INSERT INTO rebuild_locks(scope_key, acquired_at) VALUES (?1, ?2)",
        params![season.lock_key(), now.to_rfc3339()],
    )
    .context("insert scope lock")?;
    tx.commit().context("commit scope lock")?;
    Ok(None)
}

/// Clears every lock overlapping `season` and fails the `running` ledger rows
/// they covered. Returns (locks removed, runs marked failed).
pub fn force_unlock(conn: &mut Connection, season: SeasonFilter) -> Result<(usize, usize)> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .context("begin unlock transaction")?;
    let mut locks = 0;
    for (key, _) in held_locks(&tx)? {
        if SeasonFilter::from_lock_key(&key).is_none_or(|other| other.overlaps(season)) {
            locks += tx
                .execute("DELETE FROM rebuild_locks WHERE scope_key = ?1", params![key])
                .context("delete scope lock")?;
        }
    }
    let runs = abandon_running_runs(&tx, season, "abandoned: scope lock cleared manually")?;
    tx.commit().context("commit unlock")?;
    Ok((locks, runs))
}

/// Marks `running` ledger rows whose scope overlaps `season` as failed.
pub fn abandon_running_runs(conn: &Connection, season: SeasonFilter, reason: &str) -> Result<usize> {
    conn.execute(
        "UPDATE rebuild_runs
         SET status = ?1, finished_at = ?2, error = ?3
         WHERE status = ?4
           AND (?5 IS NULL OR season_id IS NULL OR season_id = ?5)",
        params![
            RunStatus::Failed.as_str(),
            Utc::now().to_rfc3339(),
            reason,
            RunStatus::Running.as_str(),
            season.season_id(),
        ],
    )
    .context("abandon running rebuild runs")
}

fn held_locks(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn
        .prepare("SELECT scope_key, acquired_at FROM rebuild_locks ORDER BY scope_key")
        .context("prepare lock query")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .context("query locks")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode lock row")?);
    }
    Ok(out)
}

/// Unparseable timestamps never expire.
fn lease_expired(acquired_at: &str, now: DateTime<Utc>, lease: Duration) -> bool {
    DateTime::parse_from_rfc3339(acquired_at)
        .map(|at| now.signed_duration_since(at.with_timezone(&Utc)) > lease)
        .unwrap_or(false)
}

pub fn release_scope_lock(conn: &Connection, season: SeasonFilter) -> Result<()> {
    conn.execute(
        "DELETE FROM rebuild_locks WHERE scope_key = ?1",
        params![season.lock_key()],
    )
    .context("delete scope lock")?;
    Ok(())
}

pub fn lock_acquired_at(conn: &Connection, season: SeasonFilter) -> Result<Option<String>> {
    conn.query_row(
        "SELECT acquired_at FROM rebuild_locks WHERE scope_key = ?1",
        params![season.lock_key()],
        |row| row.get(0),
    )
    .optional()
    .context("query scope lock")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store;

    fn lease() -> Duration {
        Duration::hours(1)
    }

    #[test]
    fn overlapping_locks_conflict() {
        let mut conn = store::open_in_memory().unwrap();
        let one = SeasonFilter::One(1);
        let two = SeasonFilter::One(2);
        assert_eq!(acquire_scope_lock(&mut conn, one, lease()).unwrap(), None);
        assert_eq!(acquire_scope_lock(&mut conn, two, lease()).unwrap(), None);
        assert_eq!(
            acquire_scope_lock(&mut conn, SeasonFilter::All, lease()).unwrap(),
            Some(one)
        );
        assert_eq!(acquire_scope_lock(&mut conn, two, lease()).unwrap(), Some(two));

        release_scope_lock(&conn, one).unwrap();
        release_scope_lock(&conn, two).unwrap();
        assert!(lock_acquired_at(&conn, one).unwrap().is_none());
        assert_eq!(
            acquire_scope_lock(&mut conn, SeasonFilter::All, lease()).unwrap(),
            None
        );
        assert!(lock_acquired_at(&conn, SeasonFilter::All).unwrap().is_some());
    }

    #[test]
    fn expired_lock_is_taken_over_and_its_run_failed() {
        let mut conn = store::open_in_memory().unwrap();
        let scope = RebuildScope::new(SeasonFilter::One(3), Default::default());
        let orphan = start_run(&conn, &scope).unwrap();
        conn.execute(
            "INSERT INTO rebuild_locks(scope_key, acquired_at) VALUES ('season:3', ?1)",
            params![(Utc::now() - Duration::hours(2)).to_rfc3339()],
        )
        .unwrap();

        assert_eq!(
            acquire_scope_lock(&mut conn, SeasonFilter::One(3), Duration::hours(3)).unwrap(),
            Some(SeasonFilter::One(3))
        );
        assert_eq!(
            acquire_scope_lock(&mut conn, SeasonFilter::All, lease()).unwrap(),
            None
        );

        let runs = recent_runs(&conn, 5).unwrap();
        let run = runs.iter().find(|r| r.run_id == orphan).unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.as_deref().unwrap().contains("lease expired"));
        assert!(lock_acquired_at(&conn, SeasonFilter::One(3)).unwrap().is_none());
    }

    #[test]
    fn force_unlock_clears_overlapping_locks_only() {
        let mut conn = store::open_in_memory().unwrap();
        for season in [1, 2] {
            let scope = RebuildScope::new(SeasonFilter::One(season), Default::default());
            start_run(&conn, &scope).unwrap();
            acquire_scope_lock(&mut conn, SeasonFilter::One(season), lease()).unwrap();
        }

        assert_eq!(force_unlock(&mut conn, SeasonFilter::One(1)).unwrap(), (1, 1));
        assert!(lock_acquired_at(&conn, SeasonFilter::One(2)).unwrap().is_some());
        assert_eq!(force_unlock(&mut conn, SeasonFilter::All).unwrap(), (1, 1));

        let statuses = recent_runs(&conn, 5)
            .unwrap()
            .into_iter()
            .map(|r| r.status)
            .collect::<Vec<_>>();
        assert_eq!(statuses, vec![RunStatus::Failed, RunStatus::Failed]);
    }
}
