//! Turn simulation and state projection

pub mod battleground;
pub mod character;
pub mod error;
pub mod r#match;
pub mod matrix;
pub mod replay;
pub mod resolver;
pub mod snapshot;

pub use battleground::Battleground;
pub use error::GameError;
pub use matrix::BattlegroundMatrix;
pub use r#match::{MatchRecord, MatchSetup, MatchStatus, TurnRecord, TurnSubmission};
pub use replay::SnapshotCache;
pub use resolver::TurnResolver;
pub use snapshot::{MatchOutcome, Snapshot};
