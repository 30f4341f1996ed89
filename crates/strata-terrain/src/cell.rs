//! Fluid/collision cells
//!
//! Cells live in a per-plane arena (`FluidGrid`); neighbors are stored as
//! optional arena indices. A missing neighbor means the edge of the grid.

use serde::{Deserialize, Serialize};

/// Index of a cell inside its `FluidGrid`. Equal to the tile index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellIndex(pub u32);

impl CellIndex {
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Collision class of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellKind {
    #[default]
    Air,
    /// Open cell that may hold fluid
    Surface,
    /// Solid, entities cannot occupy it
    Block,
}

/// Neighbor directions, in unstuck priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Top,
    Bottom,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Top,
        Direction::Bottom,
        Direction::Left,
        Direction::Right,
    ];

    /// Tile step for this direction (y grows upward)
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::Top => (0, 1),
            Direction::Bottom => (0, -1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::Top | Direction::Bottom)
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Top => Direction::Bottom,
            Direction::Bottom => Direction::Top,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// One tile of a plane's collision/fluid layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluidCell {
    pub kind: CellKind,
    /// Fluid fill, 1.0 is a full tile
    pub mass: f32,
    neighbors: [Option<CellIndex>; 4],
}

impl FluidCell {
    pub fn new(kind: CellKind) -> Self {
        Self {
            kind,
            mass: 0.0,
            neighbors: [None; 4],
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.kind == CellKind::Block
    }

    pub fn neighbor(&self, dir: Direction) -> Option<CellIndex> {
        self.neighbors[dir.slot()]
    }

    pub(crate) fn link(&mut self, dir: Direction, index: Option<CellIndex>) {
        self.neighbors[dir.slot()] = index;
    }

    /// Fluid height inside the tile, in tile units
    pub fn fluid_height(&self) -> f32 {
        if self.kind == CellKind::Surface {
            self.mass.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_offsets() {
        assert_eq!(Direction::Top.offset(), (0, 1));
        assert_eq!(Direction::Left.offset(), (-1, 0));
        for dir in Direction::ALL {
            let (x, y) = dir.offset();
            let (ox, oy) = dir.opposite().offset();
            assert_eq!((x + ox, y + oy), (0, 0));
        }
    }

    #[test]
    fn test_fluid_height_only_for_surface() {
        let mut cell = FluidCell::new(CellKind::Air);
        cell.mass = 0.8;
        assert_eq!(cell.fluid_height(), 0.0);
        cell.kind = CellKind::Surface;
        assert_eq!(cell.fluid_height(), 0.8);
        cell.mass = 3.0;
        assert_eq!(cell.fluid_height(), 1.0);
    }
}
