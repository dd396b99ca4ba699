//! Battleground grid bounds and coordinates

use serde::{Deserialize, Serialize};

/// Standard battleground width in tiles
pub const GRID_WIDTH: usize = 16;
/// Standard battleground height in tiles
pub const GRID_HEIGHT: usize = 8;

/// A tile coordinate. Signed so that out-of-range input can be rejected
/// as an invalid action instead of failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    #[cfg(test)]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance (diagonal steps cost one)
    pub fn distance(&self, other: &Position) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        dx.max(dy)
    }
}

/// Fixed-size tile grid all matches are played on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Battleground {
    width: usize,
    height: usize,
}

impl Battleground {
    pub const STANDARD: Battleground = Battleground {
        width: GRID_WIDTH,
        height: GRID_HEIGHT,
    };

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_within_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    pub fn contains(&self, position: &Position) -> bool {
        self.is_within_bounds(position.x, position.y)
    }
}

impl Default for Battleground {
    fn default() -> Self {
        Self::STANDARD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_grid_is_sixteen_by_eight() {
        let grid = Battleground::STANDARD;
        assert_eq!(grid.width(), 16);
        assert_eq!(grid.height(), 8);
    }

    #[test]
    fn bounds_are_half_open() {
        let grid = Battleground::default();
        assert!(grid.is_within_bounds(0, 0));
        assert!(grid.is_within_bounds(15, 7));
        assert!(!grid.is_within_bounds(16, 0));
        assert!(!grid.is_within_bounds(0, 8));
        assert!(!grid.is_within_bounds(-1, 3));
        assert!(!grid.is_within_bounds(4, -1));
    }

    #[test]
    fn distance_counts_diagonals_as_one_step() {
        let origin = Position::new(1, 1);
        assert_eq!(origin.distance(&Position::new(1, 1)), 0);
        assert_eq!(origin.distance(&Position::new(2, 2)), 1);
        assert_eq!(origin.distance(&Position::new(4, 0)), 3);
        assert_eq!(origin.distance(&Position::new(-2, 5)), 4);
    }
}
