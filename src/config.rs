use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::logging::LoggingConfig;
use crate::runs::DEFAULT_LOCK_LEASE_SECS;

const APP_DIR: &str = "stats_rebuild";
const DB_FILE: &str = "stats.sqlite";

pub const ENV_DB_PATH: &str = "STATS_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "STATS_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "STATS_LOG_FORMAT";
pub const ENV_LOCK_LEASE_SECS: &str = "STATS_LOCK_LEASE_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub db_path: Option<PathBuf>,
    pub logging: LoggingConfig,
    /// Age in seconds after which a scope lock may be taken over.
    pub lock_lease_secs: u32,
}

impl EngineConfig {
    /// Reads `.env.local` and `.env` (when present) before the process
    /// environment.
    pub fn load() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = LoggingConfig::default();
        let db_path = non_empty(ENV_DB_PATH)
            .map(PathBuf::from)
            .or_else(|| default_db_path(&lookup));
        Self {
            db_path,
            logging: LoggingConfig {
                level: non_empty(ENV_LOG_LEVEL).unwrap_or(defaults.level),
                format: non_empty(ENV_LOG_FORMAT)
                    .map(|v| v.to_ascii_lowercase())
                    .unwrap_or(defaults.format),
            },
            lock_lease_secs: non_empty(ENV_LOCK_LEASE_SECS)
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_LOCK_LEASE_SECS),
        }
    }

    /// The CLI flag beats the environment, which beats the cache default.
    pub fn resolve_db_path(&self, cli: Option<PathBuf>) -> Result<PathBuf> {
        cli.or_else(|| self.db_path.clone())
            .context("unable to resolve sqlite path (set STATS_DB_PATH or pass --db)")
    }
}

fn default_db_path(lookup: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let base = present("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| present("HOME").map(|home| PathBuf::from(home).join(".cache")))?;
    Some(base.join(APP_DIR).join(DB_FILE))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> EngineConfig {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        EngineConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn explicit_db_path_wins() {
        let cfg = config(&[(ENV_DB_PATH, "/data/stats.db"), ("HOME", "/home/x")]);
        assert_eq!(cfg.db_path, Some(PathBuf::from("/data/stats.db")));
    }

    #[test]
    fn falls_back_to_cache_dirs() {
        let cfg = config(&[("XDG_CACHE_HOME", "/xdg"), ("HOME", "/home/x")]);
        assert_eq!(cfg.db_path, Some(PathBuf::from("/xdg/stats_rebuild/stats.sqlite")));

        let cfg = config(&[("HOME", "/home/x")]);
        assert_eq!(
            cfg.db_path,
            Some(PathBuf::from("/home/x/.cache/stats_rebuild/stats.sqlite"))
        );

        let cfg = config(&[]);
        assert!(cfg.db_path.is_none());
        assert!(cfg.resolve_db_path(None).is_err());
        assert_eq!(
            cfg.resolve_db_path(Some(PathBuf::from("a.db"))).unwrap(),
            PathBuf::from("a.db")
        );
    }

    #[test]
    fn logging_defaults_and_overrides() {
        assert_eq!(config(&[]).logging, LoggingConfig::default());
        let cfg = config(&[(ENV_LOG_LEVEL, "debug"), (ENV_LOG_FORMAT, "JSON")]);
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.logging.format, "json");
    }

    #[test]
    fn lock_lease_reads_positive_seconds_only() {
        assert_eq!(config(&[]).lock_lease_secs, DEFAULT_LOCK_LEASE_SECS);
        assert_eq!(config(&[(ENV_LOCK_LEASE_SECS, "900")]).lock_lease_secs, 900);
        for bad in ["0", "-60", "soon"] {
            assert_eq!(
                config(&[(ENV_LOCK_LEASE_SECS, bad)]).lock_lease_secs,
                DEFAULT_LOCK_LEASE_SECS
            );
        }
    }
}
