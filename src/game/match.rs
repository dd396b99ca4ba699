//! Match records, initial setup and raw turn submissions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::battleground::{Battleground, Position};
use super::error::GameError;

/// Largest roster a player may field (keeps matrix markers to one digit)
pub const MAX_ROSTER_SIZE: usize = 9;
pub const MAX_HEALTH: u32 = 10_000;
pub const MAX_ATTACK: u32 = 1_000;
pub const MAX_REACH: u32 = 16;

const DEFAULT_ATTACK: u32 = 10;
const DEFAULT_RANGE: u32 = 1;
const DEFAULT_SPEED: u32 = 2;

/// Which side of the match a roster belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlayerSlot {
    #[serde(rename = "player_1")]
    One,
    #[serde(rename = "player_2")]
    Two,
}

impl PlayerSlot {
    /// Fixed resolution order: player 1 first, then player 2
    pub const ALL: [PlayerSlot; 2] = [PlayerSlot::One, PlayerSlot::Two];

    pub fn number(self) -> u8 {
        match self {
            PlayerSlot::One => 1,
            PlayerSlot::Two => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlayerSlot::One => "player_1",
            PlayerSlot::Two => "player_2",
        }
    }
}

/// Match lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Created, waiting for the owner to start it
    Created,
    /// Started, no turns committed yet
    Started,
    /// At least one turn committed
    InProgress,
    /// A roster has been wiped out
    Completed,
}

/// Starting attributes of one character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSetup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Starting and maximum health
    pub health: u32,
    pub position: Position,
    /// Damage dealt per landed attack
    #[serde(default = "default_attack")]
    pub attack: u32,
    /// Attack reach in tiles
    #[serde(default = "default_range")]
    pub range: u32,
    /// Movement reach in tiles per turn
    #[serde(default = "default_speed")]
    pub speed: u32,
}

fn default_attack() -> u32 {
    DEFAULT_ATTACK
}

fn default_range() -> u32 {
    DEFAULT_RANGE
}

fn default_speed() -> u32 {
    DEFAULT_SPEED
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSetup {
    pub characters: Vec<CharacterSetup>,
}

/// Initial rosters for both players
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSetup {
    pub player_1: RosterSetup,
    pub player_2: RosterSetup,
}

impl MatchSetup {
    pub fn roster(&self, slot: PlayerSlot) -> &RosterSetup {
        match slot {
            PlayerSlot::One => &self.player_1,
            PlayerSlot::Two => &self.player_2,
        }
    }

    /// Check roster sizes, stats and starting positions
    pub fn validate(&self, grid: &Battleground) -> Result<(), GameError> {
        let mut occupied = HashSet::new();

        for slot in PlayerSlot::ALL {
            let roster = self.roster(slot);
            if roster.characters.is_empty() || roster.characters.len() > MAX_ROSTER_SIZE {
                return Err(GameError::InvalidSetup(format!(
                    "{} must field between 1 and {} characters",
                    slot.label(),
                    MAX_ROSTER_SIZE
                )));
            }

            for (index, character) in roster.characters.iter().enumerate() {
                let who = format!("{} character {}", slot.label(), index);

                if character.health == 0 || character.health > MAX_HEALTH {
                    return Err(GameError::InvalidSetup(format!(
                        "{who} health must be between 1 and {MAX_HEALTH}"
                    )));
                }
                if character.attack > MAX_ATTACK {
                    return Err(GameError::InvalidSetup(format!(
                        "{who} attack exceeds {MAX_ATTACK}"
                    )));
                }
                if character.range > MAX_REACH || character.speed > MAX_REACH {
                    return Err(GameError::InvalidSetup(format!(
                        "{who} range and speed must not exceed {MAX_REACH}"
                    )));
                }
                if !grid.contains(&character.position) {
                    return Err(GameError::InvalidSetup(format!(
                        "{who} starts outside the battleground"
                    )));
                }
                if !occupied.insert(character.position) {
                    return Err(GameError::InvalidSetup(format!(
                        "{who} shares a starting tile with another character"
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Persisted match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    pub setup: MatchSetup,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
}

impl MatchRecord {
    pub fn new(owner_id: Uuid, name: Option<String>, setup: MatchSetup) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name,
            setup,
            status: MatchStatus::Created,
            created_at: Utc::now(),
        }
    }
}

/// One raw action as submitted by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSubmission {
    /// Roster index; defaults to the entry's position in the list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<usize>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Position>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerActions {
    pub actions: Vec<ActionSubmission>,
}

/// Turn payload from the API layer
#[derive(Debug, Clone, Deserialize)]
pub struct TurnSubmission {
    pub turn: u32,
    pub player_1: PlayerActions,
    pub player_2: PlayerActions,
}

impl TurnSubmission {
    pub fn into_record(self) -> TurnRecord {
        TurnRecord {
            number: self.turn,
            player_1: self.player_1,
            player_2: self.player_2,
            created_at: Utc::now(),
        }
    }
}

/// Committed, immutable turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub number: u32,
    pub player_1: PlayerActions,
    pub player_2: PlayerActions,
    pub created_at: DateTime<Utc>,
}

impl TurnRecord {
    pub fn actions(&self, slot: PlayerSlot) -> &PlayerActions {
        match slot {
            PlayerSlot::One => &self.player_1,
            PlayerSlot::Two => &self.player_2,
        }
    }
}
