use std::collections::BTreeSet;

use crate::standings::TeamSeasonKey;
use crate::validation::ValidMatch;

/// Distinct (season, team) pairs with at least one valid match, whatever the
/// result.
pub fn derive_team_seasons(matches: &[ValidMatch]) -> BTreeSet<TeamSeasonKey> {
    let mut out = BTreeSet::new();
    for m in matches {
        out.insert(TeamSeasonKey::new(m.season_id, m.home_team_id));
        out.insert(TeamSeasonKey::new(m.season_id, m.away_team_id));
    }
    out
}
