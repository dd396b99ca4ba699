//! Character state and single-action transitions

use serde::{Deserialize, Serialize};

use super::battleground::{Battleground, Position};
use super::error::GameError;
use super::r#match::{ActionSubmission, CharacterSetup};

/// Action label shown before any turn is resolved
pub const READY_LABEL: &str = "ready";
/// Action label of a character defeated in an earlier turn
pub const DEFEATED_LABEL: &str = "defeated";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub current: u32,
    pub max: u32,
}

impl Health {
    pub fn full(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Saturating damage, never below zero
    pub fn damaged(self, damage: u32) -> Self {
        Self {
            current: self.current.saturating_sub(damage).min(self.max),
            max: self.max,
        }
    }

    pub fn is_depleted(&self) -> bool {
        self.current == 0
    }
}

/// A resolved per-character action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Move { to: Position },
    Attack { target: Position },
    Defend,
    Wait,
}

impl Action {
    /// Parse a raw submission, checking the action type and target bounds
    pub fn parse(submission: &ActionSubmission, grid: &Battleground) -> Result<Self, GameError> {
        let action = match submission.action.trim().to_ascii_lowercase().as_str() {
            "move" => Action::Move {
                to: required_target(submission)?,
            },
            "attack" => Action::Attack {
                target: required_target(submission)?,
            },
            "defend" => Action::Defend,
            "wait" => Action::Wait,
            _ => return Err(GameError::UnknownAction(submission.action.clone())),
        };

        action.check_bounds(grid)?;
        Ok(action)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Action::Move { .. } => "move",
            Action::Attack { .. } => "attack",
            Action::Defend => "defend",
            Action::Wait => "wait",
        }
    }

    pub fn target(&self) -> Option<Position> {
        match self {
            Action::Move { to } => Some(*to),
            Action::Attack { target } => Some(*target),
            Action::Defend | Action::Wait => None,
        }
    }

    fn check_bounds(&self, grid: &Battleground) -> Result<(), GameError> {
        match self.target() {
            Some(target) if !grid.contains(&target) => Err(GameError::OutOfBounds(target)),
            _ => Ok(()),
        }
    }
}

fn required_target(submission: &ActionSubmission) -> Result<Position, GameError> {
    submission.target.ok_or_else(|| {
        GameError::InvalidAction(format!("'{}' requires a target tile", submission.action))
    })
}

/// Derived state of one character, as rendered to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterState {
    pub health: Health,
    pub position: Position,
    pub action: String,
}

impl CharacterState {
    pub fn from_setup(setup: &CharacterSetup) -> Self {
        Self {
            health: Health::full(setup.health),
            position: setup.position,
            action: READY_LABEL.to_string(),
        }
    }

    pub fn is_defeated(&self) -> bool {
        self.health.is_depleted()
    }

    /// Apply one action. Movement goes straight to the destination; reach and
    /// collisions are the resolver's concern. Defeated characters only take
    /// the defeated marker.
    pub fn apply_action(&self, action: &Action, grid: &Battleground) -> Result<Self, GameError> {
        action.check_bounds(grid)?;

        if self.is_defeated() {
            return Ok(self.defeated());
        }

        let position = match action {
            Action::Move { to } => *to,
            _ => self.position,
        };

        Ok(Self {
            health: self.health,
            position,
            action: action.label().to_string(),
        })
    }

    /// Same state with the action label replaced (used for blocked moves)
    pub fn with_label(&self, action: &Action) -> Self {
        Self {
            action: action.label().to_string(),
            ..self.clone()
        }
    }

    pub fn defeated(&self) -> Self {
        Self {
            action: DEFEATED_LABEL.to_string(),
            ..self.clone()
        }
    }

    pub fn take_damage(&mut self, damage: u32) {
        self.health = self.health.damaged(damage);
    }
}
