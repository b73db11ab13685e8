//! Grid coordinates.
//!
//! The board is a 3-D grid: `x`/`y` address a column, `z` is elevation.
//! Adjacency is Chebyshev distance - diagonals count as one step - which is
//! what every "within N cells" rule in the engine means.

use serde::{Deserialize, Serialize};

/// A 3-D grid coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Vec3 {
    /// Create a new coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chebyshev distance to another point, taken over all three axes.
    #[must_use]
    pub fn chebyshev(self, other: Vec3) -> i32 {
        (self.x - other.x)
            .abs()
            .max((self.y - other.y).abs())
            .max((self.z - other.z).abs())
    }
}

impl From<(i32, i32, i32)> for Vec3 {
    fn from((x, y, z): (i32, i32, i32)) -> Self {
        Self { x, y, z }
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Is `point` within `range` cells of `origin`?
///
/// Pure function of the two coordinates and the radius - board occupancy is
/// irrelevant. Range 1 is the melee adjacency test.
#[must_use]
pub fn is_within_cells(origin: Vec3, point: Vec3, range: i32) -> bool {
    origin.chebyshev(point) <= range
}
