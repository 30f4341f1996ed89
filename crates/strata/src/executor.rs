//! Scenario execution engine

use anyhow::{Context, Result, anyhow, bail};
use glam::{IVec2, Vec2};
use ahash::AHashMap;
use strata_core::entity::{EntityId, LifeTimer, MovementState, PositionEvent, PositionTracker};
use strata_core::terrain::{CellKind, FeatureKind, FluidGrid, PlaneId, PlaneTable};
use strata_core::world::{ChunkStatus, Overlay, OverlayId, PositionListener, PositionSystem, WorldPartition};
use strata_core::EngineConfig;

use crate::config::RunnerSettings;
use crate::physics::{PhysicsWorld, RapierBackend};
use crate::scenario::{Expectation, ScenarioAction, ScenarioDefinition};

/// Outcome of one scenario run
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub scenario_name: String,
    pub ticks: u64,
    pub events: usize,
    pub plane_switches: usize,
    pub destroyed: Vec<String>,
    pub failures: Vec<String>,
}

impl ExecutionReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} after {} ticks ({} events, {} plane switches, {} destroyed, {} failed checks)",
            self.scenario_name,
            if self.passed() { "PASSED" } else { "FAILED" },
            self.ticks,
            self.events,
            self.plane_switches,
            self.destroyed.len(),
            self.failures.len()
        )
    }
}

/// Logs every position event under the entity's scenario name
struct EventLog<'a> {
    names: &'a AHashMap<EntityId, String>,
    count: usize,
}

impl EventLog<'_> {
    fn name(&self, entity: EntityId) -> String {
        self.names
            .get(&entity)
            .cloned()
            .unwrap_or_else(|| entity.to_string())
    }
}

impl PositionListener for EventLog<'_> {
    fn on_event(&mut self, entity: EntityId, event: &PositionEvent) {
        self.count += 1;
        log::info!("[{}] {:?}", self.name(entity), event);
    }

    fn on_destroyed(&mut self, entity: EntityId, delay: f32) {
        log::info!("[{}] destroyed (delay {:.2}s)", self.name(entity), delay);
    }

    fn on_life_expired(&mut self, entity: EntityId) {
        log::info!("[{}] life time expired", self.name(entity));
    }
}

/// Runs a scenario against a fresh world
pub struct ScenarioExecutor {
    settings: RunnerSettings,
    engine: EngineConfig,
}

impl ScenarioExecutor {
    pub fn new(engine: EngineConfig, settings: RunnerSettings) -> Self {
        Self { settings, engine }
    }

    pub fn execute(&self, scenario: &ScenarioDefinition) -> Result<ExecutionReport> {
        log::info!("Starting scenario: {}", scenario.name);
        if !scenario.description.is_empty() {
            log::info!("Description: {}", scenario.description);
        }

        let mut engine = self.engine.clone();
        if let Some(geometry) = &scenario.geometry {
            engine.geometry = geometry.clone();
        }
        engine.validate().context("Invalid scenario geometry")?;

        let mut world = WorldPartition::new(engine);
        let overlays = build_world(&mut world, scenario)?;

        let gravity = scenario.gravity.unwrap_or(self.settings.gravity);
        let mut backend = RapierBackend::new(PhysicsWorld::new(self.settings.dt, gravity));
        let mut system = PositionSystem::new(world.config(), self.settings.viewports);
        let mut ids: AHashMap<String, EntityId> = AHashMap::new();

        for desc in &scenario.entities {
            let id = EntityId::new();
            let position = Vec2::new(desc.position.0, desc.position.1);
            let velocity = Vec2::new(desc.velocity.0, desc.velocity.1);
            backend.spawn(id, position, velocity, desc.mass, desc.fixed);

            let mut tracker = PositionTracker::new(id, desc.settings.clone());
            if let Some(plane) = desc.plane {
                tracker = tracker.with_plane(PlaneId(plane));
            }
            system.track(tracker);
            if let Some(life_time) = desc.life_time {
                system.set_life_timer(id, Some(LifeTimer::new(life_time)));
            }
            if let Some(viewport) = desc.focus {
                if !system.view_planes_mut().set_focus(viewport, Some(id)) {
                    bail!("Entity '{}' focuses unknown viewport {}", desc.name, viewport);
                }
            }
            ids.insert(desc.name.clone(), id);
        }
        for desc in &scenario.entities {
            if let Some(carrier) = &desc.rides {
                let rider = lookup(&ids, &desc.name)?;
                let carrier_id = lookup(&ids, carrier)?;
                if !system.attach_rider(rider, carrier_id) {
                    bail!("Entity '{}' cannot ride '{}'", desc.name, carrier);
                }
            }
        }

        let names: AHashMap<EntityId, String> = ids.iter().map(|(n, id)| (*id, n.clone())).collect();
        let mut listener = EventLog {
            names: &names,
            count: 0,
        };
        let mut report = ExecutionReport {
            scenario_name: scenario.name.clone(),
            ..ExecutionReport::default()
        };

        let ticks = scenario.ticks.unwrap_or(self.settings.ticks);
        for tick in 1..=ticks {
            for chunk in &scenario.chunks {
                if chunk.available_at == tick {
                    world.set_chunk_status(IVec2::new(chunk.coord.0, chunk.coord.1), ChunkStatus::Available);
                }
            }
            for timed in scenario.actions.iter().filter(|a| a.at == tick) {
                apply_action(
                    &timed.action,
                    &mut world,
                    &overlays,
                    &mut system,
                    &mut backend,
                    &mut listener,
                    &ids,
                )
                .with_context(|| format!("Action at tick {} failed", tick))?;
            }

            backend.step();
            let summary = system.tick(&world, &mut backend, &mut listener, self.settings.dt);
            report.plane_switches += summary.plane_switches;
            for id in summary.destroyed {
                backend.despawn(id);
                report.destroyed.push(listener.name(id));
            }
            report.ticks = tick;
        }
        report.events = listener.count;

        for (name, id) in &ids {
            if let (Some(tracker), Some(position)) = (system.tracker(*id), backend.position(*id)) {
                log::info!(
                    "{} ends at ({:.2}, {:.2}), chunk {:?}, plane {:?}",
                    name,
                    position.x,
                    position.y,
                    tracker.position().chunk,
                    tracker.plane()
                );
            }
        }

        for expectation in &scenario.verify {
            if let Err(failure) = check(expectation, &system, &ids) {
                log::warn!("Check failed: {}", failure);
                report.failures.push(failure);
            }
        }
        Ok(report)
    }
}

fn lookup(ids: &AHashMap<String, EntityId>, name: &str) -> Result<EntityId> {
    ids.get(name)
        .copied()
        .ok_or_else(|| anyhow!("Unknown entity '{}'", name))
}

/// Create chunks and overlays; returns overlay ids in definition order
fn build_world(world: &mut WorldPartition, scenario: &ScenarioDefinition) -> Result<Vec<OverlayId>> {
    let geometry = world.geometry().clone();
    for desc in &scenario.chunks {
        let coord = IVec2::new(desc.coord.0, desc.coord.1);
        if !geometry.contains_chunk(coord) {
            bail!("Chunk {:?} is outside the world", coord);
        }
        let chunk = world.create_chunk(coord, PlaneTable::standard());
        for plane_desc in &desc.planes {
            let plane = PlaneId(plane_desc.plane);
            if !plane_desc.cells.is_empty() {
                let grid = FluidGrid::parse_rows(&plane_desc.cells)
                    .ok_or_else(|| anyhow!("Bad cell rows for plane {} of chunk {:?}", plane, coord))?;
                if !chunk.set_fluid_grid(plane, grid) {
                    bail!("Cell rows for plane {} of chunk {:?} do not fit", plane, coord);
                }
            }
            if !plane_desc.features.is_empty() && !chunk.set_feature_rows(plane, &plane_desc.features) {
                bail!("Bad feature rows for plane {} of chunk {:?}", plane, coord);
            }
        }
        let status = if desc.available_at == 0 {
            ChunkStatus::Available
        } else {
            ChunkStatus::Creating
        };
        world.set_chunk_status(coord, status);
    }

    let tile_size = geometry.tile_size();
    let mut overlays = Vec::new();
    for desc in &scenario.overlays {
        let cells = FluidGrid::parse_rows(&desc.cells).ok_or_else(|| anyhow!("Bad overlay cell rows"))?;
        let mut overlay = Overlay::new(Vec2::new(desc.origin.0, desc.origin.1), tile_size, cells);
        if !desc.features.is_empty() && !overlay.set_feature_rows(&desc.features) {
            bail!("Bad overlay feature rows");
        }
        overlay.set_switchable(desc.switchable);
        overlays.push(world.insert_overlay(overlay));
    }
    Ok(overlays)
}

fn parse_cell(c: char) -> Result<(CellKind, f32)> {
    Ok(match c {
        '#' => (CellKind::Block, 0.0),
        '.' => (CellKind::Air, 0.0),
        '_' => (CellKind::Surface, 0.0),
        ',' => (CellKind::Surface, 0.5),
        '~' => (CellKind::Surface, 1.0),
        other => bail!("Unknown cell character '{}'", other),
    })
}

fn apply_action(
    action: &ScenarioAction,
    world: &mut WorldPartition,
    overlays: &[OverlayId],
    system: &mut PositionSystem,
    backend: &mut RapierBackend,
    listener: &mut EventLog<'_>,
    ids: &AHashMap<String, EntityId>,
) -> Result<()> {
    match action {
        ScenarioAction::SetFeature {
            chunk,
            tile,
            plane,
            feature,
        } => {
            let feature = FeatureKind::from_char(*feature)
                .ok_or_else(|| anyhow!("Unknown feature character '{}'", feature))?;
            let tile_index = world.geometry().tile_index(IVec2::new(tile.0, tile.1));
            let chunk = world
                .chunk_mut(IVec2::new(chunk.0, chunk.1))
                .ok_or_else(|| anyhow!("No chunk at {:?}", chunk))?;
            if !chunk.set_feature(tile_index, PlaneId(*plane), feature) {
                bail!("Cannot set feature at {:?} on plane {}", tile, plane);
            }
        }
        ScenarioAction::SetCell {
            chunk,
            tile,
            plane,
            cell,
        } => {
            let (kind, mass) = parse_cell(*cell)?;
            let grid = world
                .chunk_mut(IVec2::new(chunk.0, chunk.1))
                .and_then(|c| c.fluid_grid_mut(PlaneId(*plane)))
                .ok_or_else(|| anyhow!("No plane {} in chunk {:?}", plane, chunk))?;
            if !grid.set_kind(tile.0, tile.1, kind) || !grid.set_mass(tile.0, tile.1, mass) {
                bail!("Tile {:?} is outside the chunk", tile);
            }
        }
        ScenarioAction::SetChunkStatus { chunk, status } => {
            if !world.set_chunk_status(IVec2::new(chunk.0, chunk.1), *status) {
                bail!("No chunk at {:?}", chunk);
            }
        }
        ScenarioAction::SetMovement {
            entity,
            climb_wall,
            climb_roof,
            on_ground,
        } => {
            let mut movement = MovementState::empty();
            movement.set(MovementState::CLIMB_WALL, *climb_wall);
            movement.set(MovementState::CLIMB_ROOF, *climb_roof);
            movement.set(MovementState::ON_GROUND, *on_ground);
            if !backend.set_movement(lookup(ids, entity)?, movement) {
                bail!("Entity '{}' has no body", entity);
            }
        }
        ScenarioAction::SetVelocity { entity, velocity } => {
            let id = lookup(ids, entity)?;
            let body = backend
                .body_mut(id)
                .ok_or_else(|| anyhow!("Entity '{}' has no body", entity))?;
            body.set_linvel(rapier2d::prelude::vector![velocity.0, velocity.1], true);
        }
        ScenarioAction::Teleport {
            entity,
            position,
            plane,
        } => {
            let id = lookup(ids, entity)?;
            let point = Vec2::new(position.0, position.1);
            let found = system.place_at(world, backend, listener, id, point, PlaneId(*plane))?;
            if !found {
                bail!("Entity '{}' is not tracked", entity);
            }
        }
        ScenarioAction::MoveOverlay { index, origin } => {
            let id = overlays
                .get(*index)
                .copied()
                .ok_or_else(|| anyhow!("No overlay #{}", index))?;
            world.move_overlay(id, Vec2::new(origin.0, origin.1));
        }
        ScenarioAction::Destroy { entity } => {
            system.destroy(lookup(ids, entity)?, 0.0);
        }
        ScenarioAction::Log { message } => log::info!("{}", message),
    }
    Ok(())
}

/// Evaluate one check, returning a failure message
fn check(
    expectation: &Expectation,
    system: &PositionSystem,
    ids: &AHashMap<String, EntityId>,
) -> std::result::Result<(), String> {
    let tracker = |name: &str| {
        let id = ids.get(name).ok_or_else(|| format!("unknown entity '{}'", name))?;
        system
            .tracker(*id)
            .ok_or_else(|| format!("'{}' is no longer tracked", name))
    };

    match expectation {
        Expectation::Plane { entity, plane } => {
            let actual = tracker(entity)?.plane();
            if actual != Some(PlaneId(*plane)) {
                return Err(format!("'{}' on plane {:?}, expected {}", entity, actual, plane));
            }
        }
        Expectation::Chunk { entity, chunk } => {
            let actual = tracker(entity)?.position().chunk;
            if actual != IVec2::new(chunk.0, chunk.1) {
                return Err(format!("'{}' in chunk {:?}, expected {:?}", entity, actual, chunk));
            }
        }
        Expectation::Tile { entity, tile } => {
            let actual = tracker(entity)?.position().tile;
            if actual != IVec2::new(tile.0, tile.1) {
                return Err(format!("'{}' on tile {:?}, expected {:?}", entity, actual, tile));
            }
        }
        Expectation::Wetted { entity, wetted } => {
            let actual = tracker(entity)?.is_wetted();
            if actual != *wetted {
                return Err(format!("'{}' wetted is {}, expected {}", entity, actual, wetted));
            }
        }
        Expectation::Destroyed { entity } => {
            if tracker(entity).is_ok() {
                return Err(format!("'{}' is still alive", entity));
            }
        }
        Expectation::Alive { entity } => {
            tracker(entity)?;
        }
        Expectation::ViewportPlane { viewport, plane } => {
            let actual = system
                .view_planes()
                .viewport(*viewport)
                .map(|v| v.active_plane)
                .ok_or_else(|| format!("no viewport {}", viewport))?;
            if actual != PlaneId(*plane) {
                return Err(format!("viewport {} shows {}, expected {}", viewport, actual, plane));
            }
        }
    }
    Ok(())
}
