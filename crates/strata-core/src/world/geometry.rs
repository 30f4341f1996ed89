//! World geometry - conversions between world points and chunk/tile fixes

use glam::{IVec2, Vec2};

use crate::config::GeometryConfig;
use crate::error::GeometryError;

/// Largest sub-tile offset below 1.0
const SUB_TILE_MAX: f32 = 1.0 - f32::EPSILON;

/// A world point resolved to chunk, tile and sub-tile coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileFix {
    pub chunk: IVec2,
    /// Tile inside the chunk, `(0, 0)` is bottom-left
    pub tile: IVec2,
    pub tile_index: u32,
    /// Offset inside the tile, each component in `[0, 1)`
    pub sub_tile: Vec2,
}

/// Tile/chunk dimensions and the chunk range of the world
#[derive(Debug, Clone, PartialEq)]
pub struct WorldGeometry {
    tile_size: Vec2,
    chunk_tiles: IVec2,
    min_chunk: IVec2,
    max_chunk: IVec2,
}

impl WorldGeometry {
    pub fn new(tile_size: Vec2, chunk_tiles: IVec2, min_chunk: IVec2, max_chunk: IVec2) -> Self {
        Self {
            tile_size,
            chunk_tiles,
            min_chunk,
            max_chunk,
        }
    }

    pub fn from_config(config: &GeometryConfig) -> Self {
        Self::new(
            Vec2::new(config.tile_size.0, config.tile_size.1),
            IVec2::new(config.chunk_tiles.0 as i32, config.chunk_tiles.1 as i32),
            IVec2::new(config.min_chunk.0, config.min_chunk.1),
            IVec2::new(config.max_chunk.0, config.max_chunk.1),
        )
    }

    pub fn tile_size(&self) -> Vec2 {
        self.tile_size
    }

    pub fn chunk_tiles(&self) -> IVec2 {
        self.chunk_tiles
    }

    /// World-space size of one chunk
    pub fn chunk_size(&self) -> Vec2 {
        self.tile_size * self.chunk_tiles.as_vec2()
    }

    /// World-space rectangle `[min, max)` covered by the chunk range
    pub fn world_rect(&self) -> (Vec2, Vec2) {
        let size = self.chunk_size();
        (
            self.min_chunk.as_vec2() * size,
            (self.max_chunk + IVec2::ONE).as_vec2() * size,
        )
    }

    pub fn contains_chunk(&self, chunk: IVec2) -> bool {
        chunk.cmpge(self.min_chunk).all() && chunk.cmple(self.max_chunk).all()
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        let (min, max) = self.world_rect();
        point.cmpge(min).all() && point.cmplt(max).all()
    }

    pub fn tile_index(&self, tile: IVec2) -> u32 {
        (tile.y * self.chunk_tiles.x + tile.x) as u32
    }

    pub fn tile_coord(&self, tile_index: u32) -> IVec2 {
        let w = self.chunk_tiles.x.max(1) as u32;
        IVec2::new((tile_index % w) as i32, (tile_index / w) as i32)
    }

    /// World point of a chunk/tile/sub-tile triple
    pub fn to_world_point(&self, chunk: IVec2, tile: IVec2, sub_tile: Vec2) -> Vec2 {
        let global = (chunk * self.chunk_tiles + tile).as_vec2();
        (global + sub_tile) * self.tile_size
    }

    /// Resolve a world point, rejecting NaN and points outside the world
    pub fn from_world_point(&self, point: Vec2) -> Result<TileFix, GeometryError> {
        if point.is_nan() {
            return Err(GeometryError::NotANumber);
        }
        if !self.contains_point(point) {
            return Err(GeometryError::OutOfBounds {
                x: point.x,
                y: point.y,
            });
        }
        Ok(self.tile_fix_unchecked(point))
    }

    /// Resolve a world point without the bounds check.
    ///
    /// Points exactly on a tile or chunk border belong to the tile on the
    /// positive side.
    pub fn tile_fix_unchecked(&self, point: Vec2) -> TileFix {
        let scaled = point / self.tile_size;
        let global = scaled.floor();
        let sub_tile = (scaled - global).clamp(Vec2::ZERO, Vec2::splat(SUB_TILE_MAX));
        let global = global.as_ivec2();

        let chunk = IVec2::new(
            global.x.div_euclid(self.chunk_tiles.x),
            global.y.div_euclid(self.chunk_tiles.y),
        );
        let tile = IVec2::new(
            global.x.rem_euclid(self.chunk_tiles.x),
            global.y.rem_euclid(self.chunk_tiles.y),
        );

        TileFix {
            chunk,
            tile,
            tile_index: self.tile_index(tile),
            sub_tile,
        }
    }
}

impl Default for WorldGeometry {
    fn default() -> Self {
        Self::from_config(&GeometryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> WorldGeometry {
        WorldGeometry::new(
            Vec2::new(0.5, 0.25),
            IVec2::new(4, 4),
            IVec2::new(-2, -2),
            IVec2::new(1, 1),
        )
    }

    #[test]
    fn test_world_rect() {
        let geo = small();
        let (min, max) = geo.world_rect();
        assert_eq!(min, Vec2::new(-4.0, -2.0));
        assert_eq!(max, Vec2::new(4.0, 2.0));
        assert!(geo.contains_point(Vec2::new(-4.0, -2.0)));
        assert!(!geo.contains_point(Vec2::new(4.0, 0.0)));
    }

    #[test]
    fn test_negative_points_use_euclidean_division() {
        let geo = small();
        let fix = geo.from_world_point(Vec2::new(-0.25, -0.1)).unwrap();
        assert_eq!(fix.chunk, IVec2::new(-1, -1));
        assert_eq!(fix.tile, IVec2::new(3, 3));
        assert_eq!(fix.tile_index, 15);
        assert!((fix.sub_tile.x - 0.5).abs() < 1e-5);
        assert!((fix.sub_tile.y - 0.6).abs() < 1e-5);
    }

    #[test]
    fn test_round_trip_inside_world() {
        let geo = small();
        for chunk in [IVec2::new(-2, -2), IVec2::new(0, 0), IVec2::new(1, -1)] {
            for (tx, ty) in [(0, 0), (3, 1), (2, 3)] {
                let tile = IVec2::new(tx, ty);
                let sub = Vec2::new(0.25, 0.75);
                let point = geo.to_world_point(chunk, tile, sub);
                let fix = geo.from_world_point(point).unwrap();
                assert_eq!(fix.chunk, chunk);
                assert_eq!(fix.tile, tile);
                assert!((fix.sub_tile - sub).abs().max_element() < 1e-4);
            }
        }
    }

    #[test]
    fn test_chunk_border_belongs_to_positive_side() {
        let geo = small();
        let border = geo.to_world_point(IVec2::new(1, 0), IVec2::ZERO, Vec2::ZERO);
        let a = geo.from_world_point(border).unwrap();
        let b = geo.from_world_point(border).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.chunk, IVec2::new(1, 0));
        assert_eq!(a.tile, IVec2::ZERO);
        assert_eq!(a.sub_tile, Vec2::ZERO);
    }

    #[test]
    fn test_sub_tile_stays_below_one() {
        let geo = small();
        let fix = geo.tile_fix_unchecked(Vec2::new(-1e-9, -1e-9));
        assert!(fix.sub_tile.x < 1.0 && fix.sub_tile.y < 1.0);
        assert!(fix.sub_tile.cmpge(Vec2::ZERO).all());
    }

    #[test]
    fn test_rejects_nan_and_out_of_bounds() {
        let geo = small();
        assert_eq!(
            geo.from_world_point(Vec2::new(f32::NAN, 0.0)),
            Err(GeometryError::NotANumber)
        );
        assert!(matches!(
            geo.from_world_point(Vec2::new(10.0, 0.0)),
            Err(GeometryError::OutOfBounds { .. })
        ));
        assert!(matches!(
            geo.from_world_point(Vec2::new(f32::INFINITY, 0.0)),
            Err(GeometryError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_tile_index_round_trip() {
        let geo = small();
        for index in 0..16 {
            assert_eq!(geo.tile_index(geo.tile_coord(index)), index);
        }
    }
}
