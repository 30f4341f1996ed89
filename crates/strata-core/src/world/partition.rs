//! World partition - chunk storage, geometry and the overlay spatial index

use ahash::AHashMap;
use glam::{IVec2, Vec2};
use rstar::{AABB, RTree, RTreeObject};
use std::collections::hash_map::Entry;
use strata_terrain::PlaneTable;

use super::chunk::Chunk;
use super::chunk_status::ChunkStatus;
use super::geometry::WorldGeometry;
use super::overlay::{Overlay, OverlayId};
use crate::config::{EngineConfig, SessionMode};

/// Overlay bounds stored in the R-tree
#[derive(Debug, Clone, PartialEq)]
struct OverlayEnvelope {
    id: OverlayId,
    min: [f32; 2],
    max: [f32; 2],
}

impl OverlayEnvelope {
    fn of(overlay: &Overlay) -> Self {
        let (min, max) = overlay.bounds();
        Self {
            id: overlay.id(),
            min: [min.x, min.y],
            max: [max.x, max.y],
        }
    }
}

impl RTreeObject for OverlayEnvelope {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

/// All chunks and overlays of a world session
pub struct WorldPartition {
    config: EngineConfig,
    geometry: WorldGeometry,
    chunks: AHashMap<IVec2, Chunk>,
    overlays: AHashMap<OverlayId, Overlay>,
    /// Spatial index for overlay lookups by world point
    overlay_index: RTree<OverlayEnvelope>,
    next_overlay: u32,
}

impl WorldPartition {
    pub fn new(config: EngineConfig) -> Self {
        let geometry = WorldGeometry::from_config(&config.geometry);
        Self {
            config,
            geometry,
            chunks: AHashMap::new(),
            overlays: AHashMap::new(),
            overlay_index: RTree::new(),
            next_overlay: 1,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn geometry(&self) -> &WorldGeometry {
        &self.geometry
    }

    pub fn session(&self) -> SessionMode {
        self.config.session
    }

    pub fn is_remote(&self) -> bool {
        self.config.session == SessionMode::Remote
    }

    /// Create (or replace) an empty chunk sized by the world geometry
    pub fn create_chunk(&mut self, coord: IVec2, planes: PlaneTable) -> &mut Chunk {
        let tiles = self.geometry.chunk_tiles();
        let chunk = Chunk::new(coord, tiles.x as u32, tiles.y as u32, planes);
        log::debug!("[CHUNK] created {:?}", coord);
        match self.chunks.entry(coord) {
            Entry::Occupied(mut e) => {
                e.insert(chunk);
                e.into_mut()
            }
            Entry::Vacant(e) => e.insert(chunk),
        }
    }

    /// Insert a prepared chunk, returning the one it replaced
    pub fn insert_chunk(&mut self, chunk: Chunk) -> Option<Chunk> {
        self.chunks.insert(chunk.coord(), chunk)
    }

    pub fn remove_chunk(&mut self, coord: IVec2) -> Option<Chunk> {
        let removed = self.chunks.remove(&coord);
        if removed.is_some() {
            log::debug!("[CHUNK] removed {:?}", coord);
        }
        removed
    }

    pub fn chunk(&self, coord: IVec2) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    pub fn chunk_mut(&mut self, coord: IVec2) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coord)
    }

    /// Chunk at `coord` if it is loaded and `Available`
    pub fn available_chunk(&self, coord: IVec2) -> Option<&Chunk> {
        self.chunks.get(&coord).filter(|c| c.is_available())
    }

    pub fn set_chunk_status(&mut self, coord: IVec2, status: ChunkStatus) -> bool {
        match self.chunks.get_mut(&coord) {
            Some(chunk) => {
                chunk.set_status(status);
                true
            }
            None => false,
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Coordinates of all available chunks, sorted for stable iteration
    pub fn available_chunks(&self) -> Vec<IVec2> {
        let mut coords: Vec<IVec2> = self
            .chunks
            .values()
            .filter(|c| c.is_available())
            .map(Chunk::coord)
            .collect();
        coords.sort_by_key(|c| (c.y, c.x));
        coords
    }

    /// Add an overlay and index it
    pub fn insert_overlay(&mut self, mut overlay: Overlay) -> OverlayId {
        let id = OverlayId(self.next_overlay);
        self.next_overlay += 1;
        overlay.set_id(id);
        self.overlay_index.insert(OverlayEnvelope::of(&overlay));
        self.overlays.insert(id, overlay);
        log::debug!("[OVERLAY] inserted {:?}", id);
        id
    }

    pub fn remove_overlay(&mut self, id: OverlayId) -> Option<Overlay> {
        let overlay = self.overlays.remove(&id)?;
        self.overlay_index.remove(&OverlayEnvelope::of(&overlay));
        Some(overlay)
    }

    /// Move an overlay so its bottom-left corner sits at `origin`
    pub fn move_overlay(&mut self, id: OverlayId, origin: Vec2) -> bool {
        let Some(overlay) = self.overlays.get_mut(&id) else {
            return false;
        };
        self.overlay_index.remove(&OverlayEnvelope::of(overlay));
        overlay.set_origin(origin);
        self.overlay_index.insert(OverlayEnvelope::of(overlay));
        true
    }

    pub fn overlay(&self, id: OverlayId) -> Option<&Overlay> {
        self.overlays.get(&id)
    }

    /// Mutable access for editing features and cells. Use `move_overlay` to
    /// change its position.
    pub fn overlay_mut(&mut self, id: OverlayId) -> Option<&mut Overlay> {
        self.overlays.get_mut(&id)
    }

    /// Overlay containing a world point. The oldest overlay wins when
    /// several overlap.
    pub fn overlay_at(&self, point: Vec2) -> Option<&Overlay> {
        self.overlay_index
            .locate_in_envelope_intersecting(&AABB::from_point([point.x, point.y]))
            .filter_map(|env| self.overlays.get(&env.id))
            .filter(|overlay| overlay.contains(point))
            .min_by_key(|overlay| overlay.id())
    }
}

impl Default for WorldPartition {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_terrain::FluidGrid;

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.geometry.chunk_tiles = (4, 4);
        config
    }

    #[test]
    fn test_create_chunk_uses_geometry() {
        let mut world = WorldPartition::new(config());
        let chunk = world.create_chunk(IVec2::new(1, 2), PlaneTable::standard());
        assert_eq!(chunk.width(), 4);
        assert_eq!(chunk.coord(), IVec2::new(1, 2));
        assert_eq!(world.chunk_count(), 1);
    }

    #[test]
    fn test_create_chunk_replaces_existing() {
        let mut world = WorldPartition::new(config());
        world.create_chunk(IVec2::ZERO, PlaneTable::standard());
        assert!(world.set_chunk_status(IVec2::ZERO, ChunkStatus::Available));

        let chunk = world.create_chunk(IVec2::ZERO, PlaneTable::standard());
        assert_eq!(chunk.status(), ChunkStatus::Creating);
        assert_eq!(world.chunk_count(), 1);
        assert!(world.available_chunk(IVec2::ZERO).is_none());
    }

    #[test]
    fn test_available_chunk_filters_status() {
        let mut world = WorldPartition::new(config());
        world.create_chunk(IVec2::ZERO, PlaneTable::standard());
        assert!(world.available_chunk(IVec2::ZERO).is_none());
        assert!(world.set_chunk_status(IVec2::ZERO, ChunkStatus::Available));
        assert!(world.available_chunk(IVec2::ZERO).is_some());
        assert!(!world.set_chunk_status(IVec2::ONE, ChunkStatus::Available));
        assert_eq!(world.available_chunks(), vec![IVec2::ZERO]);
    }

    #[test]
    fn test_overlay_lookup_and_move() {
        let mut world = WorldPartition::new(config());
        let id = world.insert_overlay(Overlay::new(Vec2::new(2.0, 2.0), Vec2::ONE, FluidGrid::new(2, 2)));

        assert_eq!(world.overlay_at(Vec2::new(2.5, 3.5)).map(Overlay::id), Some(id));
        assert!(world.overlay_at(Vec2::new(4.0, 3.0)).is_none());

        assert!(world.move_overlay(id, Vec2::new(10.0, 0.0)));
        assert!(world.overlay_at(Vec2::new(2.5, 3.5)).is_none());
        assert_eq!(world.overlay_at(Vec2::new(11.0, 1.0)).map(Overlay::id), Some(id));

        assert!(world.remove_overlay(id).is_some());
        assert!(world.overlay_at(Vec2::new(11.0, 1.0)).is_none());
        assert!(!world.move_overlay(id, Vec2::ZERO));
    }

    #[test]
    fn test_overlapping_overlays_prefer_oldest() {
        let mut world = WorldPartition::new(config());
        let first = world.insert_overlay(Overlay::new(Vec2::ZERO, Vec2::ONE, FluidGrid::new(4, 4)));
        let _second = world.insert_overlay(Overlay::new(Vec2::ONE, Vec2::ONE, FluidGrid::new(4, 4)));
        assert_eq!(world.overlay_at(Vec2::new(2.0, 2.0)).map(Overlay::id), Some(first));
    }
}
