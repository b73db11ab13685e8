//! The playing field.
//!
//! A board is a sparse set of cells keyed by integer position. The standard
//! duel field is a flat 9x5 rectangle at `z = 0`, but nothing below assumes
//! flatness: adjacency spans one step on each axis including `z`, so ramps
//! and raised terrain work without special cases.

pub mod pathfinding;

pub use pathfinding::{DistanceCache, DistanceMap};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::point::Vec3;

/// One cell of the playing field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub position: Vec3,
}

/// The set of cells entities can occupy.
#[derive(Clone, Debug, Default)]
pub struct Board {
    cells: FxHashMap<Vec3, Cell>,
}

impl Board {
    /// Create an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a flat `width` x `height` board at `z = 0`.
    #[must_use]
    pub fn rectangular(width: i32, height: i32) -> Self {
        let mut cells = FxHashMap::default();
        for x in 0..width {
            for y in 0..height {
                let position = Vec3::new(x, y, 0);
                cells.insert(position, Cell { position });
            }
        }
        Self { cells }
    }

    /// Add a cell at a position. Replaces any existing cell there.
    pub fn add_cell(&mut self, position: Vec3) {
        self.cells.insert(position, Cell { position });
    }

    /// The cell at a position, if the board has one.
    #[must_use]
    pub fn cell_at(&self, position: Vec3) -> Option<&Cell> {
        self.cells.get(&position)
    }

    /// Is this position part of the board?
    #[must_use]
    pub fn contains(&self, position: Vec3) -> bool {
        self.cells.contains_key(&position)
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Is the board empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells reachable in one step from a position: the 8 planar neighbors,
    /// each at `dz` of -1, 0 or +1, where a cell exists.
    #[must_use]
    pub fn neighbor_destinations(&self, from: Vec3) -> SmallVec<[Vec3; 8]> {
        let mut out = SmallVec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                for dz in -1..=1 {
                    let candidate = Vec3::new(from.x + dx, from.y + dy, from.z + dz);
                    if self.contains(candidate) {
                        out.push(candidate);
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangular_dimensions() {
        let board = Board::rectangular(9, 5);
        assert_eq!(board.len(), 45);
        assert!(board.contains(Vec3::new(0, 0, 0)));
        assert!(board.contains(Vec3::new(8, 4, 0)));
        assert!(!board.contains(Vec3::new(9, 0, 0)));
        assert!(!board.contains(Vec3::new(0, 0, 1)));
    }

    #[test]
    fn test_corner_neighbors() {
        let board = Board::rectangular(9, 5);
        let neighbors = board.neighbor_destinations(Vec3::new(0, 0, 0));
        assert_eq!(neighbors.len(), 3);
        assert!(neighbors.contains(&Vec3::new(1, 0, 0)));
        assert!(neighbors.contains(&Vec3::new(0, 1, 0)));
        assert!(neighbors.contains(&Vec3::new(1, 1, 0)));
    }

    #[test]
    fn test_raised_terrain_neighbors() {
        let mut board = Board::rectangular(3, 1);
        board.add_cell(Vec3::new(1, 0, 1));

        // From (0,0,0) the raised cell at (1,0,1) is one step away
        let neighbors = board.neighbor_destinations(Vec3::new(0, 0, 0));
        assert!(neighbors.contains(&Vec3::new(1, 0, 0)));
        assert!(neighbors.contains(&Vec3::new(1, 0, 1)));
    }
}
