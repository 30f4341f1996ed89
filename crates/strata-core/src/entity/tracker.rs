//! Position tracker - per-entity reconciliation of the cached world fix
//!
//! `update_position` runs once per tick:
//! 1. resolve the physics reference point to chunk/tile/sub-tile
//! 2. bind the chunk, or wait while it is missing or still being created
//! 3. evaluate plane switch rules and commit a free destination
//! 4. resolve a plane when none is set
//! 5. refresh the collision cell and push the entity out of blocks
//! 6. update fluid/gravity state
//! 7. commit the chunk change

use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strata_terrain::{CellIndex, Direction, FeatureKind, PlaneId};

use super::area_state::{AreaState, AreaTracker};
use super::events::PositionEvent;
use super::handles::{EntityHandles, Lifecycle};
use super::id::EntityId;
use super::plane_switch::{PlaneSwitchState, SwitchContext, SwitchRequest, SwitchTarget};
use super::position::{Footprint, WorldMapPosition};
use super::unstuck::{self, TILE_CENTER, UnstuckPlan};
use crate::error::{GeometryError, PositionError};
use crate::world::{Chunk, TileFix, WorldPartition};

/// Per-entity behaviour switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    pub footprint: Footprint,
    /// Floating strength in fluid, 0 sinks
    pub buoyancy: f32,
    /// Push the entity out of blocked cells
    pub check_unstuck: bool,
    /// The entity moves with the terrain rules (plane switching, unstuck)
    pub follows_terrain: bool,
    /// Anchored entities never switch planes
    pub anchored: bool,
    pub draw_order: i32,
    pub viewport: usize,
    /// Delay handed to `Lifecycle::destroy` on fatal failures
    pub destroy_delay: f32,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            footprint: Footprint::default(),
            buoyancy: 0.0,
            check_unstuck: true,
            follows_terrain: true,
            anchored: false,
            draw_order: 0,
            viewport: 0,
            destroy_delay: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    #[default]
    Auto,
    /// Re-resolve tile, cell and plane even if nothing moved
    Force,
    /// Commit a chunk change without notifying
    Silent,
}

/// A committed plane switch, to be forwarded to view planes and riders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneSwitch {
    pub plane: PlaneId,
    pub viewport: usize,
}

/// Outcome of one `update_position`
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub events: SmallVec<[PositionEvent; 4]>,
    pub plane_switch: Option<PlaneSwitch>,
    pub awaiting_chunk: bool,
}

/// Tracks one entity's position against the world partition
#[derive(Debug, Clone)]
pub struct PositionTracker {
    id: EntityId,
    settings: TrackerSettings,
    position: WorldMapPosition,
    /// Plane requested by spawn or placement, used on the next resolution
    plane_hint: Option<PlaneId>,
    awaiting_chunk: bool,
    /// Re-resolve everything on the next available tick
    needs_refresh: bool,
    pending_plane: Option<SwitchRequest>,
    switch: PlaneSwitchState,
    current_cell: Option<CellIndex>,
    last_unblocked: Option<CellIndex>,
    area: AreaTracker,
    /// Mounted on a carrier: collides as a trigger only
    riding: bool,
    /// Collision filter has to be pushed to the body on the next update
    filter_dirty: bool,
    destroyed: bool,
}

impl PositionTracker {
    pub fn new(id: EntityId, settings: TrackerSettings) -> Self {
        let position = WorldMapPosition::new(settings.footprint, settings.draw_order);
        Self {
            id,
            settings,
            position,
            plane_hint: None,
            awaiting_chunk: false,
            needs_refresh: false,
            pending_plane: None,
            switch: PlaneSwitchState::default(),
            current_cell: None,
            last_unblocked: None,
            area: AreaTracker::default(),
            riding: false,
            filter_dirty: false,
            destroyed: false,
        }
    }

    /// Start on `plane` if the terrain allows it
    pub fn with_plane(mut self, plane: PlaneId) -> Self {
        self.plane_hint = Some(plane);
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut TrackerSettings {
        &mut self.settings
    }

    pub fn position(&self) -> &WorldMapPosition {
        &self.position
    }

    pub fn plane(&self) -> Option<PlaneId> {
        self.position.plane
    }

    pub fn is_awaiting_chunk(&self) -> bool {
        self.awaiting_chunk
    }

    pub fn pending_plane(&self) -> Option<PlaneId> {
        self.pending_plane.map(|r| r.plane)
    }

    pub fn current_cell(&self) -> Option<CellIndex> {
        self.current_cell
    }

    pub fn area_state(&self) -> Option<AreaState> {
        self.area.state()
    }

    pub fn is_wetted(&self) -> bool {
        self.area.is_wetted()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn is_riding(&self) -> bool {
        self.riding
    }

    /// Mark the entity as mounted or dismounted. The body's collision filter
    /// follows on the next update.
    pub fn set_riding(&mut self, riding: bool) {
        if self.riding != riding {
            self.riding = riding;
            self.filter_dirty = true;
        }
    }

    /// Reconcile the cached fix with the entity's current physics state
    pub fn update_position(
        &mut self,
        world: &WorldPartition,
        handles: &mut EntityHandles<'_>,
        lifecycle: &mut dyn Lifecycle,
        tick: u64,
        mode: UpdateMode,
    ) -> Result<TickReport, PositionError> {
        if self.destroyed {
            return Err(PositionError::Destroyed { entity: self.id });
        }

        let reference = handles
            .physics
            .mass_center()
            .unwrap_or_else(|| handles.physics.origin());

        let fix = match world.geometry().from_world_point(reference) {
            Ok(fix) => fix,
            Err(GeometryError::NotANumber) => {
                return Err(self.fail(lifecycle, PositionError::InvalidPosition { entity: self.id }));
            }
            Err(GeometryError::OutOfBounds { x, y }) if world.is_remote() => {
                log::trace!("[POSITION] {} outside the world at ({}, {}), waiting", self.id, x, y);
                return Ok(self.defer(handles, reference));
            }
            Err(GeometryError::OutOfBounds { x, y }) => {
                return Err(self.fail(
                    lifecycle,
                    PositionError::OutOfWorld {
                        entity: self.id,
                        x,
                        y,
                    },
                ));
            }
        };

        let mut report = TickReport::default();
        let valid = self.position.valid;
        let chunk_moved = valid && fix.chunk != self.position.chunk;
        let refresh = mode == UpdateMode::Force || self.needs_refresh || !valid;
        let tile_changed = refresh || chunk_moved || fix.tile_index != self.position.tile_index;

        self.position.mass_center = reference;
        self.position.sub_tile = fix.sub_tile;
        if tile_changed {
            self.position.tile = fix.tile;
            self.position.tile_index = fix.tile_index;
            self.current_cell = None;
            if let Some(dropped) = self.pending_plane.take() {
                log::trace!("[PLANE] {} moved, dropping pending {:?}", self.id, dropped.plane);
            }
        }
        if chunk_moved || !valid || mode == UpdateMode::Force {
            self.last_unblocked = None;
            self.switch.reset();
            self.position.plane_index = None;
        }

        let was_awaiting = self.awaiting_chunk;
        let chunk = world.available_chunk(fix.chunk);
        self.awaiting_chunk = chunk.is_none();
        self.needs_refresh = self.awaiting_chunk;

        if let Some(chunk) = chunk {
            if was_awaiting {
                log::debug!("[POSITION] {} chunk {:?} available", self.id, fix.chunk);
                handles.render.set_enabled_recursive(true);
                report.events.push(PositionEvent::Appeared { chunk: fix.chunk });
            }
            self.resolve_plane(world, chunk, handles, tile_changed, &mut report);
            if self.filter_dirty {
                self.apply_collision_filter(handles);
            }
            self.refresh_cell(world, chunk, &fix, handles, lifecycle, &mut report)?;
        }

        if handles.physics.body_enabled() && handles.physics.is_dynamic_body() {
            let cell = match (chunk, self.position.plane, self.current_cell) {
                (Some(chunk), Some(plane), Some(index)) => chunk
                    .fluid_grid(plane)
                    .and_then(|grid| grid.cell(index)),
                _ => None,
            };
            self.area.update(
                handles.physics,
                handles.movement,
                cell,
                self.position.sub_tile,
                self.settings.buoyancy,
                world.config(),
                tick,
                &mut report.events,
            );
        }

        if valid && (chunk_moved || mode == UpdateMode::Force) && mode != UpdateMode::Silent {
            log::debug!(
                "[POSITION] {} chunk {:?} -> {:?}",
                self.id,
                self.position.chunk,
                fix.chunk
            );
            report.events.push(PositionEvent::ChunkChanged {
                from: self.position.chunk,
                to: fix.chunk,
            });
        }
        self.position.chunk = fix.chunk;
        self.position.valid = true;

        if self.awaiting_chunk && handles.render.is_enabled() {
            log::debug!("[POSITION] {} waiting for chunk {:?}", self.id, fix.chunk);
            handles.render.set_enabled_recursive(false);
        }
        report.awaiting_chunk = self.awaiting_chunk;
        Ok(report)
    }

    /// Teleport to `point`, preferring `plane`, and run a forced update
    pub fn place_at(
        &mut self,
        world: &WorldPartition,
        handles: &mut EntityHandles<'_>,
        lifecycle: &mut dyn Lifecycle,
        point: Vec2,
        plane: PlaneId,
        tick: u64,
    ) -> Result<TickReport, PositionError> {
        handles.physics.move_mass_center_to(point);
        self.plane_hint = Some(plane);
        self.position.plane = None;
        self.pending_plane = None;
        self.update_position(world, handles, lifecycle, tick, UpdateMode::Force)
    }

    /// Set the plane directly (rider propagation). Returns the event when the
    /// plane actually changed.
    pub fn apply_plane(
        &mut self,
        world: &WorldPartition,
        plane: PlaneId,
        handles: &mut EntityHandles<'_>,
    ) -> Option<PositionEvent> {
        let from = self.position.plane;
        if from == Some(plane) {
            return None;
        }
        self.position.plane = Some(plane);
        self.position.plane_index = world
            .available_chunk(self.position.chunk)
            .and_then(|c| c.plane_index(plane));
        self.position.view_mask = plane.layer_mask();
        self.pending_plane = None;
        self.current_cell = None;
        handles
            .render
            .apply_plane(plane, self.position.view_mask, self.position.draw_order);
        self.apply_collision_filter(handles);
        Some(PositionEvent::PlaneChanged { from, to: plane })
    }

    fn apply_collision_filter(&mut self, handles: &mut EntityHandles<'_>) {
        if let Some(plane) = self.position.plane {
            log::trace!("[PLANE] {} collides on {} (riding: {})", self.id, plane, self.riding);
            handles.physics.set_plane_filter(plane, self.riding);
            self.filter_dirty = false;
        }
    }

    /// Steps 3-5: switch rules, fallback resolution, commit
    fn resolve_plane(
        &mut self,
        world: &WorldPartition,
        chunk: &Chunk,
        handles: &mut EntityHandles<'_>,
        tile_changed: bool,
        report: &mut TickReport,
    ) {
        let tile_index = self.position.tile_index;
        let switchable = handles.physics.is_dynamic_body()
            && !self.settings.anchored
            && self.settings.follows_terrain;
        let mut commit = None;

        if let (true, Some(current)) = (switchable, self.position.plane) {
            let reference = self.position.mass_center;
            let overlay = world
                .overlay_at(reference)
                .and_then(|o| o.locate(reference).map(|(tile, sub)| (o, tile, sub)));

            let ctx = SwitchContext {
                chunk,
                tile_index,
                tile_changed,
                current,
                overlay: overlay.map(|(o, tile, _)| (o, tile)),
            };
            if let Some(request) = self.switch.evaluate(&ctx) {
                if request.plane != current {
                    log::debug!(
                        "[PLANE] {} {:?} rule requests {} -> {}",
                        self.id,
                        request.rule,
                        current,
                        request.plane
                    );
                    self.pending_plane = Some(request);
                }
            }

            if let Some(pending) = self.pending_plane {
                let footprint = &self.settings.footprint;
                let free = match (pending.target, overlay) {
                    (SwitchTarget::Overlay(id), Some((o, tile, sub))) if o.id() == id => {
                        o.is_footprint_free(tile, sub, footprint)
                    }
                    _ => chunk.is_footprint_free(
                        tile_index,
                        pending.plane,
                        self.position.sub_tile,
                        footprint,
                    ),
                };
                if free {
                    commit = Some(pending.plane);
                    self.pending_plane = None;
                } else {
                    log::trace!("[PLANE] {} switch to {} blocked, retrying", self.id, pending.plane);
                }
            }
        }

        let unresolved = self.position.plane.is_none() || self.position.plane_index.is_none();
        if commit.is_none() && self.pending_plane.is_none() && unresolved {
            let base = self
                .plane_hint
                .take()
                .or(self.position.plane)
                .unwrap_or_else(|| chunk.planes().outermost());
            commit = Some(chunk.find_real_plane(tile_index, base));
        }

        if let Some(plane) = commit {
            self.commit_plane(chunk, plane, handles, report);
        }
    }

    fn commit_plane(
        &mut self,
        chunk: &Chunk,
        plane: PlaneId,
        handles: &mut EntityHandles<'_>,
        report: &mut TickReport,
    ) {
        let from = self.position.plane;
        self.position.plane = Some(plane);
        self.position.plane_index = chunk.plane_index(plane);
        self.position.view_mask = plane.layer_mask();
        if from == Some(plane) {
            return;
        }

        log::debug!("[PLANE] {} {:?} -> {}", self.id, from, plane);
        handles
            .render
            .apply_plane(plane, self.position.view_mask, self.position.draw_order);
        self.apply_collision_filter(handles);
        self.current_cell = None;
        report.events.push(PositionEvent::PlaneChanged { from, to: plane });
        report.plane_switch = Some(PlaneSwitch {
            plane,
            viewport: self.settings.viewport,
        });
    }

    /// Step 5: resolve the collision cell, unstuck if the footprint overlaps
    /// blocks
    fn refresh_cell(
        &mut self,
        world: &WorldPartition,
        chunk: &Chunk,
        fix: &TileFix,
        handles: &mut EntityHandles<'_>,
        lifecycle: &mut dyn Lifecycle,
        report: &mut TickReport,
    ) -> Result<(), PositionError> {
        if self.current_cell.is_some() || self.position.plane_index.is_none() {
            return Ok(());
        }
        let Some(plane) = self.position.plane else {
            return Ok(());
        };
        let Some(grid) = chunk.fluid_grid(plane) else {
            return Ok(());
        };
        let index = CellIndex(self.position.tile_index);
        if grid.cell(index).is_none() {
            return Ok(());
        }
        self.current_cell = Some(index);

        let footprint = self.settings.footprint;
        let embedded = self.settings.check_unstuck
            && self.settings.follows_terrain
            && chunk.is_visible()
            && !unstuck::is_footprint_free(grid, index, self.position.sub_tile, &footprint);

        if embedded {
            match unstuck::plan_unstuck(grid, index, &footprint, self.last_unblocked) {
                Ok(plan) => self.apply_unstuck(world, fix, plan, handles, report),
                Err(source) => {
                    return Err(self.fail(
                        lifecycle,
                        PositionError::Unstuck {
                            entity: self.id,
                            source,
                        },
                    ));
                }
            }
        }

        if let Some(cell) = self.current_cell {
            if !grid.is_blocked(cell) {
                self.last_unblocked = Some(cell);
            }
        }
        Ok(())
    }

    fn apply_unstuck(
        &mut self,
        world: &WorldPartition,
        fix: &TileFix,
        plan: UnstuckPlan,
        handles: &mut EntityHandles<'_>,
        report: &mut TickReport,
    ) {
        let geometry = world.geometry();
        let tile = self.position.tile + plan.offset;
        let target = geometry.to_world_point(fix.chunk, tile, TILE_CENTER);
        log::warn!(
            "[UNSTUCK] {} moved by {:?} to tile {:?} of chunk {:?}",
            self.id,
            plan.offset,
            tile,
            fix.chunk
        );

        handles.physics.move_mass_center_to(target);
        self.position.tile = tile;
        self.position.tile_index = geometry.tile_index(tile);
        self.position.sub_tile = TILE_CENTER;
        self.position.mass_center = target;
        self.current_cell = Some(plan.target);
        report.events.push(PositionEvent::Unstuck {
            offset: plan.offset,
        });
    }

    /// Remote mode: out of bounds is a wait, not a failure
    fn defer(&mut self, handles: &mut EntityHandles<'_>, reference: Vec2) -> TickReport {
        self.position.mass_center = reference;
        self.awaiting_chunk = true;
        self.needs_refresh = true;
        if handles.render.is_enabled() {
            handles.render.set_enabled_recursive(false);
        }
        TickReport {
            awaiting_chunk: true,
            ..TickReport::default()
        }
    }

    fn fail(&mut self, lifecycle: &mut dyn Lifecycle, error: PositionError) -> PositionError {
        log::error!("[POSITION] {}", error);
        self.destroyed = true;
        lifecycle.destroy(self.id, self.settings.destroy_delay);
        error
    }

    /// Whether the reference point is inside the world bounds
    pub fn is_inside_world(&self, world: &WorldPartition) -> bool {
        world.geometry().contains_point(self.position.mass_center)
    }

    /// Feature under the entity on `plane`
    pub fn feature_on_plane(&self, world: &WorldPartition, plane: PlaneId) -> FeatureKind {
        world
            .available_chunk(self.position.chunk)
            .map(|chunk| chunk.feature_at(self.position.tile_index, plane))
            .unwrap_or_default()
    }

    /// Tile next to the entity's tile in `facing`, on the entity's plane.
    /// `None` at the chunk edge or while unresolved.
    fn tile_in_front(&self, world: &WorldPartition, facing: Direction) -> Option<(IVec2, u32)> {
        let chunk = world.available_chunk(self.position.chunk)?;
        let (dx, dy) = facing.offset();
        let tile = self.position.tile + IVec2::new(dx, dy);
        if tile.x < 0 || tile.y < 0 || tile.x >= chunk.width() as i32 || tile.y >= chunk.height() as i32 {
            return None;
        }
        Some((tile, world.geometry().tile_index(tile)))
    }

    /// Whether the cell in front of the entity is blocked
    pub fn has_cell_in_front(&self, world: &WorldPartition, facing: Direction) -> Option<bool> {
        let plane = self.position.plane?;
        let (_, index) = self.tile_in_front(world, facing)?;
        let chunk = world.available_chunk(self.position.chunk)?;
        chunk
            .fluid_cell(index, plane)
            .map(|(_, cell)| cell.is_blocked())
    }

    /// Whether a wall (structure that is not a door) stands in front of the
    /// entity on its plane
    pub fn has_wall_in_front(&self, world: &WorldPartition, facing: Direction) -> bool {
        let Some(plane) = self.position.plane else {
            return false;
        };
        let Some((_, index)) = self.tile_in_front(world, facing) else {
            return false;
        };
        world
            .available_chunk(self.position.chunk)
            .map(|chunk| {
                let feature = chunk.feature_at(index, plane);
                feature.is_structural() && feature != FeatureKind::Door
            })
            .unwrap_or(false)
    }
}
