use thiserror::Error;

use crate::scope::Derivation;

/// Rejections raised while turning a rebuild request into a scope. Nothing has
/// been deleted when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("invalid season id '{raw}': {reason}")]
    InvalidSeason { raw: String, reason: String },

    #[error(
        "unknown rebuild type '{0}' (expected all, standings, player_stats, team_stats, team_seasons or h2h)"
    )]
    UnknownType(String),
}

#[derive(Error, Debug)]
pub enum RebuildError {
    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("a rebuild overlapping {requested} is already running (lock held for {held})")]
    ScopeBusy { requested: String, held: String },

    #[error("rebuild job already reached a terminal state")]
    AlreadyFinished,

    #[error("rebuild bookkeeping failed: {cause:#}")]
    Storage { cause: anyhow::Error },

    #[error("loading match data failed: {cause:#}")]
    Source { cause: anyhow::Error },

    #[error("{derivation} rebuild failed: {cause:#}")]
    Derivation {
        derivation: Derivation,
        cause: anyhow::Error,
    },
}

impl RebuildError {
    pub fn storage(cause: anyhow::Error) -> Self {
        Self::Storage { cause }
    }

    pub fn failed_derivation(&self) -> Option<Derivation> {
        match self {
            Self::Derivation { derivation, .. } => Some(*derivation),
            _ => None,
        }
    }
}
