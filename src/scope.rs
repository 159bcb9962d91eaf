use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ScopeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Derivation {
    Standings,
    PlayerStats,
    TeamStats,
    TeamSeasons,
    H2h,
}

impl Derivation {
    /// Declaration order, also used to break ties when planning.
    pub const ALL: [Derivation; 5] = [
        Derivation::Standings,
        Derivation::PlayerStats,
        Derivation::TeamStats,
        Derivation::TeamSeasons,
        Derivation::H2h,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Derivation::Standings => "standings",
            Derivation::PlayerStats => "player_stats",
            Derivation::TeamStats => "team_stats",
            Derivation::TeamSeasons => "team_seasons",
            Derivation::H2h => "h2h",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let key = raw.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|d| d.as_str() == key)
    }

    /// Derived tables that must already be persisted for the scope before this
    /// derivation can run.
    pub fn depends_on(self) -> &'static [Derivation] {
        match self {
            Derivation::TeamStats => &[Derivation::Standings],
            _ => &[],
        }
    }

    /// Team stats project persisted standings and never touch match rows.
    pub fn reads_matches(self) -> bool {
        !matches!(self, Derivation::TeamStats)
    }

    pub fn table_name(self) -> &'static str {
        match self {
            Derivation::Standings => "standings",
            Derivation::PlayerStats => "player_season_stats",
            Derivation::TeamStats => "team_season_stats",
            Derivation::TeamSeasons => "team_seasons",
            Derivation::H2h => "h2h_pair_stats",
        }
    }
}

impl fmt::Display for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orders the selected derivations so every dependency that is also selected
/// runs first. Unselected dependencies are assumed to be persisted already.
pub fn execution_plan(selected: &[Derivation]) -> Vec<Derivation> {
    let mut pending = Derivation::ALL
        .into_iter()
        .filter(|d| selected.contains(d))
        .collect::<Vec<_>>();
    let mut plan = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let ready = pending
            .iter()
            .position(|d| d.depends_on().iter().all(|dep| !pending.contains(dep)));
        let Some(idx) = ready else {
            // The dependency table is static and acyclic.
            break;
        };
        plan.push(pending.remove(idx));
    }
    plan
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SeasonFilter {
    #[default]
    All,
    One(u32),
}

impl SeasonFilter {
    pub fn parse(raw: Option<&str>) -> Result<Self, ScopeError> {
        let Some(raw) = raw.map(str::trim) else {
            return Ok(SeasonFilter::All);
        };
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            return Ok(SeasonFilter::All);
        }
        let id = raw.parse::<u32>().map_err(|err| ScopeError::InvalidSeason {
            raw: raw.to_string(),
            reason: err.to_string(),
        })?;
        if id == 0 {
            return Err(ScopeError::InvalidSeason {
                raw: raw.to_string(),
                reason: "season ids start at 1".to_string(),
            });
        }
        Ok(SeasonFilter::One(id))
    }

    pub fn season_id(self) -> Option<u32> {
        match self {
            SeasonFilter::All => None,
            SeasonFilter::One(id) => Some(id),
        }
    }

    pub fn includes(self, season_id: u32) -> bool {
        match self {
            SeasonFilter::All => true,
            SeasonFilter::One(id) => id == season_id,
        }
    }

    pub fn overlaps(self, other: SeasonFilter) -> bool {
        match (self, other) {
            (SeasonFilter::One(a), SeasonFilter::One(b)) => a == b,
            _ => true,
        }
    }

    pub fn lock_key(self) -> String {
        match self {
            SeasonFilter::All => "all".to_string(),
            SeasonFilter::One(id) => format!("season:{id}"),
        }
    }

    pub fn from_lock_key(key: &str) -> Option<Self> {
        if key == "all" {
            return Some(SeasonFilter::All);
        }
        let id = key.strip_prefix("season:")?.parse::<u32>().ok()?;
        Some(SeasonFilter::One(id))
    }
}

impl fmt::Display for SeasonFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeasonFilter::All => f.write_str("all seasons"),
            SeasonFilter::One(id) => write!(f, "season {id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DerivationSelector {
    #[default]
    All,
    Only(Derivation),
}

impl DerivationSelector {
    pub fn parse(raw: Option<&str>) -> Result<Self, ScopeError> {
        let Some(raw) = raw.map(str::trim) else {
            return Ok(DerivationSelector::All);
        };
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            return Ok(DerivationSelector::All);
        }
        Derivation::parse(raw)
            .map(DerivationSelector::Only)
            .ok_or_else(|| ScopeError::UnknownType(raw.to_string()))
    }

    pub fn derivations(self) -> Vec<Derivation> {
        match self {
            DerivationSelector::All => Derivation::ALL.to_vec(),
            DerivationSelector::Only(d) => vec![d],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DerivationSelector::All => "all",
            DerivationSelector::Only(d) => d.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RebuildScope {
    pub season: SeasonFilter,
    pub selector: DerivationSelector,
}

impl RebuildScope {
    pub fn new(season: SeasonFilter, selector: DerivationSelector) -> Self {
        Self { season, selector }
    }

    pub fn everything() -> Self {
        Self::default()
    }

    pub fn plan(&self) -> Vec<Derivation> {
        execution_plan(&self.selector.derivations())
    }
}

impl fmt::Display for RebuildScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.season, self.selector.as_str())
    }
}

/// Raw trigger payload as received from the admin action.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RebuildRequest {
    #[serde(default)]
    pub season_id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl RebuildRequest {
    pub fn into_scope(self) -> Result<RebuildScope, ScopeError> {
        let season = SeasonFilter::parse(self.season_id.as_deref())?;
        let selector = DerivationSelector::parse(self.kind.as_deref())?;
        Ok(RebuildScope { season, selector })
    }
}
