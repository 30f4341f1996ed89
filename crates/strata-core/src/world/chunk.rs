//! Chunk - a fixed-size block of tiles stacked into depth planes

use glam::{IVec2, Vec2};
use strata_terrain::{CellIndex, FeatureKind, FluidCell, FluidGrid, PlaneId, PlaneTable};

use super::chunk_status::ChunkStatus;
use crate::entity::Footprint;
use crate::entity::unstuck;

/// Features and fluid cells of one plane
#[derive(Debug, Clone)]
struct PlaneLayer {
    features: Vec<FeatureKind>,
    cells: FluidGrid,
}

impl PlaneLayer {
    fn new(width: u32, height: u32) -> Self {
        Self {
            features: vec![FeatureKind::None; (width * height) as usize],
            cells: FluidGrid::new(width, height),
        }
    }
}

/// A chunk of the world
#[derive(Debug, Clone)]
pub struct Chunk {
    coord: IVec2,
    width: u32,
    height: u32,
    status: ChunkStatus,
    visible: bool,
    planes: PlaneTable,
    /// One layer per entry of `planes`, same order
    layers: Vec<PlaneLayer>,
}

impl Chunk {
    /// Create an empty chunk in the `Creating` state
    pub fn new(coord: IVec2, width: u32, height: u32, planes: PlaneTable) -> Self {
        let layers = planes.iter().map(|_| PlaneLayer::new(width, height)).collect();
        Self {
            coord,
            width,
            height,
            status: ChunkStatus::Creating,
            visible: true,
            planes,
            layers,
        }
    }

    pub fn coord(&self) -> IVec2 {
        self.coord
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn status(&self) -> ChunkStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ChunkStatus) {
        if self.status != status {
            log::debug!("chunk {:?}: {:?} -> {:?}", self.coord, self.status, status);
        }
        self.status = status;
    }

    pub fn is_available(&self) -> bool {
        self.status.is_available()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn planes(&self) -> &PlaneTable {
        &self.planes
    }

    pub fn plane_index(&self, plane: PlaneId) -> Option<usize> {
        self.planes.index_of(plane)
    }

    fn layer(&self, plane: PlaneId) -> Option<&PlaneLayer> {
        self.plane_index(plane).and_then(|i| self.layers.get(i))
    }

    fn layer_mut(&mut self, plane: PlaneId) -> Option<&mut PlaneLayer> {
        let index = self.plane_index(plane)?;
        self.layers.get_mut(index)
    }

    pub fn fluid_grid(&self, plane: PlaneId) -> Option<&FluidGrid> {
        self.layer(plane).map(|l| &l.cells)
    }

    pub fn fluid_grid_mut(&mut self, plane: PlaneId) -> Option<&mut FluidGrid> {
        self.layer_mut(plane).map(|l| &mut l.cells)
    }

    /// Replace a plane's fluid grid. Rejected when the size does not match.
    pub fn set_fluid_grid(&mut self, plane: PlaneId, grid: FluidGrid) -> bool {
        let (width, height) = (self.width, self.height);
        match self.layer_mut(plane) {
            Some(layer) if grid.width() == width && grid.height() == height => {
                layer.cells = grid;
                true
            }
            _ => false,
        }
    }

    /// Fluid cell of a tile on a plane
    pub fn fluid_cell(&self, tile_index: u32, plane: PlaneId) -> Option<(CellIndex, &FluidCell)> {
        let grid = self.fluid_grid(plane)?;
        let index = CellIndex(tile_index);
        grid.cell(index).map(|cell| (index, cell))
    }

    /// Tile exists on this plane and is not a block
    pub fn is_tile_free(&self, tile_index: u32, plane: PlaneId) -> bool {
        self.fluid_cell(tile_index, plane)
            .is_some_and(|(_, cell)| !cell.is_blocked())
    }

    pub fn feature_at(&self, tile_index: u32, plane: PlaneId) -> FeatureKind {
        self.layer(plane)
            .and_then(|l| l.features.get(tile_index as usize))
            .copied()
            .unwrap_or_default()
    }

    pub fn set_feature(&mut self, tile_index: u32, plane: PlaneId, feature: FeatureKind) -> bool {
        match self
            .layer_mut(plane)
            .and_then(|l| l.features.get_mut(tile_index as usize))
        {
            Some(slot) => {
                *slot = feature;
                true
            }
            None => false,
        }
    }

    /// Paint a plane's features from a text map, top row first
    /// (see `FeatureKind::from_char`).
    pub fn set_feature_rows<S: AsRef<str>>(&mut self, plane: PlaneId, rows: &[S]) -> bool {
        if rows.len() as u32 != self.height {
            return false;
        }
        let (width, height) = (self.width, self.height);
        let Some(layer) = self.layer_mut(plane) else {
            return false;
        };
        for (row, line) in rows.iter().enumerate() {
            let line = line.as_ref();
            if line.chars().count() as u32 != width {
                return false;
            }
            let y = height - 1 - row as u32;
            for (x, c) in line.chars().enumerate() {
                let Some(feature) = FeatureKind::from_char(c) else {
                    return false;
                };
                layer.features[(y * width + x as u32) as usize] = feature;
            }
        }
        true
    }

    /// Nearest plane at or behind `from` holding structure on this tile
    pub fn find_nearest_solid_plane(&self, tile_index: u32, from: PlaneId) -> Option<PlaneId> {
        self.planes
            .at_or_behind(from)
            .find(|plane| self.feature_at(tile_index, *plane).is_structural())
    }

    /// First plane at or in front of `requested` that has structure at or
    /// behind it on this tile, or the outermost plane when none does.
    pub fn find_real_plane(&self, tile_index: u32, requested: PlaneId) -> PlaneId {
        self.planes
            .at_or_in_front(requested)
            .find(|plane| self.find_nearest_solid_plane(tile_index, *plane).is_some())
            .unwrap_or_else(|| self.planes.outermost())
    }

    /// Whether a footprint anchored on this tile only covers free cells
    pub fn is_footprint_free(
        &self,
        tile_index: u32,
        plane: PlaneId,
        sub_tile: Vec2,
        footprint: &Footprint,
    ) -> bool {
        match self.fluid_grid(plane) {
            Some(grid) => unstuck::is_footprint_free(grid, CellIndex(tile_index), sub_tile, footprint),
            None => false,
        }
    }
}
