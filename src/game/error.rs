//! Simulation error kinds

use super::battleground::Position;

/// Errors raised by setup validation, turn resolution and replay.
/// Every variant is a caller mistake; none are retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Invalid match setup: {0}")]
    InvalidSetup(String),

    #[error("Invalid turn number provided.")]
    InvalidTurnNumber { expected: u32, provided: u32 },

    #[error("Invalid turn number provided.")]
    InvalidTurnIndex { requested: u32, committed: u32 },

    #[error("Match does not have any turns completed.")]
    NoTurnsCompleted,

    #[error("Malformed turn payload: {0}")]
    MalformedTurnPayload(String),

    #[error("Unknown action type: {0}")]
    UnknownAction(String),

    #[error("Action target ({}, {}) is outside the battleground", .0.x, .0.y)]
    OutOfBounds(Position),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Match has already been completed.")]
    MatchAlreadyCompleted,
}

impl GameError {
    /// True for the variants callers report as an invalid action
    pub fn is_invalid_action(&self) -> bool {
        matches!(
            self,
            GameError::UnknownAction(_) | GameError::OutOfBounds(_) | GameError::InvalidAction(_)
        )
    }
}
