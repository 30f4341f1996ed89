//! Cached spatial fix of an entity

use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};
use strata_terrain::PlaneId;

/// Collision extent in tile units, relative to the mass center
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub min: Vec2,
    pub max: Vec2,
}

impl Footprint {
    /// Footprint of `size` tiles centered on the mass center
    pub fn centered(size: Vec2) -> Self {
        Self {
            min: -size * 0.5,
            max: size * 0.5,
        }
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Whole tiles spanned along each axis, at least one
    pub fn tiles(&self) -> IVec2 {
        self.size().ceil().as_ivec2().max(IVec2::ONE)
    }

    /// Inclusive tile offsets (relative to the anchor tile) covered when the
    /// mass center sits at `sub_tile` inside the anchor tile.
    pub fn covered_offsets(&self, sub_tile: Vec2) -> (IVec2, IVec2) {
        let lo = (sub_tile + self.min).floor().as_ivec2();
        let hi = ((sub_tile + self.max).ceil().as_ivec2() - IVec2::ONE).max(lo);
        (lo, hi)
    }
}

impl Default for Footprint {
    fn default() -> Self {
        Self::centered(Vec2::ONE)
    }
}

/// Where an entity is, as last reconciled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldMapPosition {
    pub chunk: IVec2,
    /// Tile inside the chunk
    pub tile: IVec2,
    pub tile_index: u32,
    /// Offset inside the tile, `[0, 1)` per axis
    pub sub_tile: Vec2,
    pub plane: Option<PlaneId>,
    /// Index of `plane` in the chunk's plane table, `None` while unresolved
    pub plane_index: Option<usize>,
    pub draw_order: i32,
    pub view_mask: u32,
    pub footprint: Footprint,
    /// World-space reference point used for the last fix
    pub mass_center: Vec2,
    /// Set once the first fix succeeded
    pub valid: bool,
}

impl WorldMapPosition {
    pub fn new(footprint: Footprint, draw_order: i32) -> Self {
        Self {
            chunk: IVec2::ZERO,
            tile: IVec2::ZERO,
            tile_index: 0,
            sub_tile: Vec2::ZERO,
            plane: None,
            plane_index: None,
            draw_order,
            view_mask: 0,
            footprint,
            mass_center: Vec2::ZERO,
            valid: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_footprint_covers_anchor_only() {
        let fp = Footprint::default();
        assert_eq!(fp.tiles(), IVec2::ONE);
        let (lo, hi) = fp.covered_offsets(Vec2::splat(0.5));
        assert_eq!((lo, hi), (IVec2::ZERO, IVec2::ZERO));
    }

    #[test]
    fn test_offset_footprint_reaches_neighbors() {
        let fp = Footprint::default();
        let (lo, hi) = fp.covered_offsets(Vec2::new(0.2, 0.9));
        assert_eq!(lo, IVec2::new(-1, 0));
        assert_eq!(hi, IVec2::new(0, 1));
    }

    #[test]
    fn test_tall_footprint() {
        let fp = Footprint::centered(Vec2::new(1.0, 2.0));
        assert_eq!(fp.tiles(), IVec2::new(1, 2));
        let (lo, hi) = fp.covered_offsets(Vec2::splat(0.5));
        assert_eq!(lo, IVec2::new(0, -1));
        assert_eq!(hi, IVec2::new(0, 1));
    }

    #[test]
    fn test_zero_footprint_still_covers_anchor() {
        let fp = Footprint::centered(Vec2::ZERO);
        let (lo, hi) = fp.covered_offsets(Vec2::ZERO);
        assert_eq!((lo, hi), (IVec2::ZERO, IVec2::ZERO));
    }
}
