//! Overlays - movable sub-structures with their own tile grid
//!
//! An overlay (a ship, a moving platform, a building interior that is not
//! part of the chunk) carries its own inner-plane feature table and its own
//! collision cells. Entities standing inside an overlay evaluate door rules
//! against the overlay instead of the chunk underneath.

use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};
use strata_terrain::{CellIndex, FeatureKind, FluidGrid};

use crate::entity::Footprint;
use crate::entity::unstuck;

/// Identifier assigned by `WorldPartition::insert_overlay`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OverlayId(pub u32);

/// A movable tile structure placed over the chunk grid
#[derive(Debug, Clone)]
pub struct Overlay {
    id: OverlayId,
    /// World position of the bottom-left corner
    origin: Vec2,
    tile_size: Vec2,
    features: Vec<FeatureKind>,
    cells: FluidGrid,
    /// Whether entities switch planes when entering/leaving
    switchable: bool,
}

impl Overlay {
    pub fn new(origin: Vec2, tile_size: Vec2, cells: FluidGrid) -> Self {
        let features = vec![FeatureKind::None; cells.len()];
        Self {
            id: OverlayId(0),
            origin,
            tile_size,
            features,
            cells,
            switchable: true,
        }
    }

    pub fn id(&self) -> OverlayId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: OverlayId) {
        self.id = id;
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub(crate) fn set_origin(&mut self, origin: Vec2) {
        self.origin = origin;
    }

    pub fn width(&self) -> u32 {
        self.cells.width()
    }

    pub fn height(&self) -> u32 {
        self.cells.height()
    }

    pub fn is_switchable(&self) -> bool {
        self.switchable
    }

    pub fn set_switchable(&mut self, switchable: bool) {
        self.switchable = switchable;
    }

    /// World-space `[min, max)` rectangle
    pub fn bounds(&self) -> (Vec2, Vec2) {
        let size = Vec2::new(self.width() as f32, self.height() as f32) * self.tile_size;
        (self.origin, self.origin + size)
    }

    pub fn contains(&self, point: Vec2) -> bool {
        let (min, max) = self.bounds();
        point.cmpge(min).all() && point.cmplt(max).all()
    }

    /// Tile index and sub-tile offset of a world point inside the overlay
    pub fn locate(&self, point: Vec2) -> Option<(u32, Vec2)> {
        if !self.contains(point) {
            return None;
        }
        let scaled = (point - self.origin) / self.tile_size;
        let tile = scaled.floor();
        let sub = (scaled - tile).clamp(Vec2::ZERO, Vec2::splat(1.0 - f32::EPSILON));
        let tile: IVec2 = tile.as_ivec2();
        let index = self.cells.index_of(tile.x, tile.y)?;
        Some((index.raw(), sub))
    }

    pub fn cells(&self) -> &FluidGrid {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut FluidGrid {
        &mut self.cells
    }

    pub fn feature_at(&self, tile_index: u32) -> FeatureKind {
        self.features
            .get(tile_index as usize)
            .copied()
            .unwrap_or_default()
    }

    pub fn set_feature(&mut self, tile_index: u32, feature: FeatureKind) -> bool {
        match self.features.get_mut(tile_index as usize) {
            Some(slot) => {
                *slot = feature;
                true
            }
            None => false,
        }
    }

    /// Paint features from a text map, top row first
    pub fn set_feature_rows<S: AsRef<str>>(&mut self, rows: &[S]) -> bool {
        let (width, height) = (self.width(), self.height());
        if rows.len() as u32 != height {
            return false;
        }
        for (row, line) in rows.iter().enumerate() {
            let line = line.as_ref();
            if line.chars().count() as u32 != width {
                return false;
            }
            let y = height - 1 - row as u32;
            for (x, c) in line.chars().enumerate() {
                match FeatureKind::from_char(c) {
                    Some(feature) => self.features[(y * width + x as u32) as usize] = feature,
                    None => return false,
                }
            }
        }
        true
    }

    pub fn is_footprint_free(&self, tile_index: u32, sub_tile: Vec2, footprint: &Footprint) -> bool {
        unstuck::is_footprint_free(&self.cells, CellIndex(tile_index), sub_tile, footprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay() -> Overlay {
        Overlay::new(Vec2::new(10.0, 4.0), Vec2::ONE, FluidGrid::new(3, 2))
    }

    #[test]
    fn test_locate() {
        let overlay = overlay();
        let (index, sub) = overlay.locate(Vec2::new(11.25, 5.5)).unwrap();
        assert_eq!(index, 3 + 1);
        assert_eq!(sub, Vec2::new(0.25, 0.5));
        assert!(overlay.locate(Vec2::new(13.0, 4.0)).is_none());
        assert!(overlay.locate(Vec2::new(9.99, 4.0)).is_none());
    }

    #[test]
    fn test_feature_rows() {
        let mut overlay = overlay();
        assert!(overlay.set_feature_rows(&["#D#", "..."]));
        assert_eq!(overlay.feature_at(4), FeatureKind::Door);
        assert_eq!(overlay.feature_at(0), FeatureKind::None);
        assert_eq!(overlay.feature_at(99), FeatureKind::None);
        assert!(!overlay.set_feature_rows(&["#D#"]));
    }
}
