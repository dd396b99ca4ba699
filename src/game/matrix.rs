//! Occupancy matrix projection of a snapshot

use serde::{Deserialize, Serialize};

use super::battleground::Battleground;
use super::r#match::PlayerSlot;
use super::snapshot::Snapshot;

/// Marker of an unoccupied tile
pub const EMPTY_CELL: i32 = 0;

/// `player * 10 + roster index + 1`, negated once the character is defeated.
/// Corpses keep their tile for the rest of the match.
pub fn cell_marker(slot: PlayerSlot, index: usize, defeated: bool) -> i32 {
    let marker = i32::from(slot.number()) * 10 + index as i32 + 1;
    if defeated {
        -marker
    } else {
        marker
    }
}

/// Rows of tile markers, `matrix[y][x]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BattlegroundMatrix {
    rows: Vec<Vec<i32>>,
}

impl BattlegroundMatrix {
    pub fn empty(grid: &Battleground) -> Self {
        Self {
            rows: vec![vec![EMPTY_CELL; grid.width()]; grid.height()],
        }
    }

    #[cfg(test)]
    pub fn rows(&self) -> &[Vec<i32>] {
        &self.rows
    }

    #[cfg(test)]
    pub fn cell(&self, x: usize, y: usize) -> Option<i32> {
        self.rows.get(y).and_then(|row| row.get(x)).copied()
    }
}

/// Project a snapshot onto the grid
pub fn project(snapshot: &Snapshot, grid: &Battleground) -> BattlegroundMatrix {
    let mut matrix = BattlegroundMatrix::empty(grid);

    for (slot, index, character) in snapshot.characters() {
        let position = character.position;
        if !grid.contains(&position) {
            continue;
        }
        matrix.rows[position.y as usize][position.x as usize] =
            cell_marker(slot, index, character.is_defeated());
    }

    matrix
}
