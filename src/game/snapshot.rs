//! Cumulative per-turn state of every character

use serde::{Deserialize, Serialize};

use super::character::CharacterState;
use super::r#match::{MatchSetup, PlayerSlot};

/// One player's characters, in roster order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterState {
    pub characters: Vec<CharacterState>,
}

impl RosterState {
    pub fn is_wiped_out(&self) -> bool {
        self.characters.iter().all(CharacterState::is_defeated)
    }

    pub fn living(&self) -> usize {
        self.characters.iter().filter(|c| !c.is_defeated()).count()
    }
}

/// How a completed match ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    #[serde(rename = "player_1")]
    PlayerOneWins,
    #[serde(rename = "player_2")]
    PlayerTwoWins,
    Draw,
}

/// Full derived state as of a turn (turn 0 is the initial setup)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub turn: u32,
    pub player_1: RosterState,
    pub player_2: RosterState,
}

impl Snapshot {
    pub fn initial(setup: &MatchSetup) -> Self {
        let roster = |slot: PlayerSlot| RosterState {
            characters: setup
                .roster(slot)
                .characters
                .iter()
                .map(CharacterState::from_setup)
                .collect(),
        };

        Self {
            turn: 0,
            player_1: roster(PlayerSlot::One),
            player_2: roster(PlayerSlot::Two),
        }
    }

    pub fn roster(&self, slot: PlayerSlot) -> &RosterState {
        match slot {
            PlayerSlot::One => &self.player_1,
            PlayerSlot::Two => &self.player_2,
        }
    }

    pub fn roster_mut(&mut self, slot: PlayerSlot) -> &mut RosterState {
        match slot {
            PlayerSlot::One => &mut self.player_1,
            PlayerSlot::Two => &mut self.player_2,
        }
    }

    pub fn character(&self, slot: PlayerSlot, index: usize) -> Option<&CharacterState> {
        self.roster(slot).characters.get(index)
    }

    /// Every character in resolution order
    pub fn characters(&self) -> impl Iterator<Item = (PlayerSlot, usize, &CharacterState)> {
        PlayerSlot::ALL.into_iter().flat_map(move |slot| {
            self.roster(slot)
                .characters
                .iter()
                .enumerate()
                .map(move |(index, state)| (slot, index, state))
        })
    }

    /// `Some` once either roster has been wiped out
    pub fn outcome(&self) -> Option<MatchOutcome> {
        match (self.player_1.is_wiped_out(), self.player_2.is_wiped_out()) {
            (false, false) => None,
            (true, true) => Some(MatchOutcome::Draw),
            (false, true) => Some(MatchOutcome::PlayerOneWins),
            (true, false) => Some(MatchOutcome::PlayerTwoWins),
        }
    }
}
