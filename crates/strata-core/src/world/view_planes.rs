//! View planes - which depth plane each viewport is looking at
//!
//! When the entity a viewport follows switches plane, the viewport follows
//! it and its visible layer mask changes.

use strata_terrain::{PlaneId, PlaneTable};

use crate::entity::EntityId;

#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    /// Entity the viewport follows
    pub focus: Option<EntityId>,
    pub active_plane: PlaneId,
}

#[derive(Debug, Clone)]
pub struct ViewPlanes {
    viewports: Vec<Viewport>,
    planes: PlaneTable,
}

impl ViewPlanes {
    pub fn new(viewport_count: usize) -> Self {
        let planes = PlaneTable::standard();
        let viewport = Viewport {
            focus: None,
            active_plane: planes.outermost(),
        };
        Self {
            viewports: vec![viewport; viewport_count.max(1)],
            planes,
        }
    }

    pub fn viewport(&self, index: usize) -> Option<&Viewport> {
        self.viewports.get(index)
    }

    pub fn viewport_count(&self) -> usize {
        self.viewports.len()
    }

    pub fn set_focus(&mut self, viewport: usize, entity: Option<EntityId>) -> bool {
        match self.viewports.get_mut(viewport) {
            Some(v) => {
                v.focus = entity;
                true
            }
            None => false,
        }
    }

    /// Record that `entity` moved to `plane` in `viewport`. Returns true when
    /// the viewport followed it.
    pub fn switch_to_plane(&mut self, entity: EntityId, plane: PlaneId, viewport: usize) -> bool {
        let Some(v) = self.viewports.get_mut(viewport) else {
            log::warn!("[VIEW] {} switched plane in unknown viewport {}", entity, viewport);
            return false;
        };
        if v.focus != Some(entity) || v.active_plane == plane {
            return false;
        }
        log::debug!("[VIEW] viewport {} follows {} to {}", viewport, entity, plane);
        v.active_plane = plane;
        true
    }

    /// Layers drawn by a viewport: its active plane and everything behind it
    pub fn visible_mask(&self, viewport: usize) -> u32 {
        let Some(v) = self.viewports.get(viewport) else {
            return 0;
        };
        self.planes
            .at_or_behind(v.active_plane)
            .fold(0, |mask, plane| mask | plane.layer_mask())
    }
}

impl Default for ViewPlanes {
    fn default() -> Self {
        Self::new(1)
    }
}
