//! Map Positions
//!
//! Integer map cells on the ground plane and the coarse grid cells the
//! spatial index buckets them into.

use serde::{Deserialize, Serialize};

/// A map cell position on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub z: i32,
}

impl Position {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Squared euclidean distance in map cells.
    pub fn distance_squared(&self, other: &Position) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dz * dz
    }

    pub fn distance(&self, other: &Position) -> f32 {
        (self.distance_squared(other) as f32).sqrt()
    }

    /// Grid cell containing this position, `floor(pos / cell_size)` on each axis.
    ///
    /// Uses euclidean division so negative coordinates land in the cell
    /// below zero rather than being truncated towards it.
    pub fn cell(&self, cell_size: i32) -> CellKey {
        CellKey {
            x: self.x.div_euclid(cell_size),
            z: self.z.div_euclid(cell_size),
        }
    }
}

/// Key of a spatial grid bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey {
    pub x: i32,
    pub z: i32,
}

impl CellKey {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chebyshev distance between two grid cells (ring index in a spiral search).
    pub fn ring_distance(&self, other: &CellKey) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }

    /// All cells lying exactly on the square ring of the given radius around `self`.
    pub fn ring(&self, radius: i32) -> Vec<CellKey> {
        if radius == 0 {
            return vec![*self];
        }
        let mut cells = Vec::with_capacity((radius as usize) * 8);
        for dx in -radius..=radius {
            cells.push(CellKey::new(self.x + dx, self.z - radius));
            cells.push(CellKey::new(self.x + dx, self.z + radius));
        }
        for dz in (-radius + 1)..radius {
            cells.push(CellKey::new(self.x - radius, self.z + dz));
            cells.push(CellKey::new(self.x + radius, self.z + dz));
        }
        cells
    }
}
