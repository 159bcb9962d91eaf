pub mod config;
pub mod error;
pub mod h2h;
pub mod logging;
pub mod match_source;
pub mod player_stats;
pub mod ranking;
pub mod rebuild;
pub mod runs;
pub mod scope;
pub mod standings;
pub mod store;
pub mod team_seasons;
pub mod team_stats;
pub mod validate;
pub mod validation;

pub use error::{RebuildError, ScopeError};
pub use rebuild::{RebuildJob, RebuildReport, RebuildState, rebuild};
pub use scope::{Derivation, DerivationSelector, RebuildRequest, RebuildScope, SeasonFilter};
