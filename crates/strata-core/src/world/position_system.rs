//! Position system - runs every tracked entity once per tick
//!
//! Entities are updated in the order they were tracked. A committed plane
//! switch is forwarded to the view planes and then to the entity's riders
//! (entities attached to it, such as a passenger on a cart), up to the
//! configured rider depth. Destroy requests collected during the tick are
//! applied at the end.

use ahash::AHashMap;
use glam::Vec2;
use strata_terrain::PlaneId;

use super::partition::WorldPartition;
use super::view_planes::ViewPlanes;
use crate::config::EngineConfig;
use crate::entity::{
    DestroyQueue, EntityBackend, EntityId, LifeExpiry, LifeTimer, Lifecycle, PlaneSwitch,
    PositionEvent, PositionTracker, UpdateMode,
};
use crate::error::PositionError;

/// Receives position notifications
pub trait PositionListener {
    fn on_event(&mut self, entity: EntityId, event: &PositionEvent);

    /// The entity was removed from the system
    fn on_destroyed(&mut self, _entity: EntityId, _delay: f32) {}

    /// A notifying life timer ran out
    fn on_life_expired(&mut self, _entity: EntityId) {}
}

/// A listener that ignores everything
#[derive(Debug, Default)]
pub struct NoopListener;

impl PositionListener for NoopListener {
    fn on_event(&mut self, _entity: EntityId, _event: &PositionEvent) {}
}

impl PositionListener for Vec<(EntityId, PositionEvent)> {
    fn on_event(&mut self, entity: EntityId, event: &PositionEvent) {
        self.push((entity, event.clone()));
    }
}

/// What happened during one `PositionSystem::tick`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickSummary {
    pub tick: u64,
    pub updated: usize,
    pub awaiting: usize,
    pub plane_switches: usize,
    pub destroyed: Vec<EntityId>,
}

struct Tracked {
    tracker: PositionTracker,
    /// Entity this one rides on
    carrier: Option<EntityId>,
    life: Option<LifeTimer>,
}

/// Owns the trackers of all live entities
pub struct PositionSystem {
    entities: AHashMap<EntityId, Tracked>,
    order: Vec<EntityId>,
    view_planes: ViewPlanes,
    destroy_queue: DestroyQueue,
    tick: u64,
    max_rider_depth: u32,
}

impl PositionSystem {
    pub fn new(config: &EngineConfig, viewport_count: usize) -> Self {
        Self {
            entities: AHashMap::new(),
            order: Vec::new(),
            view_planes: ViewPlanes::new(viewport_count),
            destroy_queue: DestroyQueue::new(),
            tick: 0,
            max_rider_depth: config.max_rider_depth,
        }
    }

    /// Start tracking an entity. Re-tracking an id replaces its tracker.
    pub fn track(&mut self, tracker: PositionTracker) -> EntityId {
        let id = tracker.id();
        let entry = Tracked {
            tracker,
            carrier: None,
            life: None,
        };
        if self.entities.insert(id, entry).is_none() {
            self.order.push(id);
        }
        log::debug!("[SYSTEM] tracking {}", id);
        id
    }

    /// Stop tracking an entity; its riders are dropped off
    pub fn untrack(&mut self, id: EntityId) -> Option<PositionTracker> {
        let entry = self.entities.remove(&id)?;
        self.order.retain(|e| *e != id);
        for tracked in self.entities.values_mut() {
            if tracked.carrier == Some(id) {
                tracked.carrier = None;
                tracked.tracker.set_riding(false);
            }
        }
        Some(entry.tracker)
    }

    pub fn tracker(&self, id: EntityId) -> Option<&PositionTracker> {
        self.entities.get(&id).map(|t| &t.tracker)
    }

    pub fn tracker_mut(&mut self, id: EntityId) -> Option<&mut PositionTracker> {
        self.entities.get_mut(&id).map(|t| &mut t.tracker)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Tracked ids in update order
    pub fn ids(&self) -> &[EntityId] {
        &self.order
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn view_planes(&self) -> &ViewPlanes {
        &self.view_planes
    }

    pub fn view_planes_mut(&mut self) -> &mut ViewPlanes {
        &mut self.view_planes
    }

    /// Make `rider` follow `carrier`'s plane switches. Refuses unknown ids
    /// and attachments that would form a loop.
    pub fn attach_rider(&mut self, rider: EntityId, carrier: EntityId) -> bool {
        if rider == carrier || !self.entities.contains_key(&carrier) {
            return false;
        }
        let mut cursor = Some(carrier);
        while let Some(id) = cursor {
            if id == rider {
                log::warn!("[SYSTEM] {} cannot ride {}: loop", rider, carrier);
                return false;
            }
            cursor = self.entities.get(&id).and_then(|t| t.carrier);
        }
        match self.entities.get_mut(&rider) {
            Some(entry) => {
                entry.carrier = Some(carrier);
                entry.tracker.set_riding(true);
                true
            }
            None => false,
        }
    }

    pub fn detach_rider(&mut self, rider: EntityId) {
        if let Some(entry) = self.entities.get_mut(&rider) {
            entry.carrier = None;
            entry.tracker.set_riding(false);
        }
    }

    /// Direct riders of `carrier`, in update order
    pub fn riders_of(&self, carrier: EntityId) -> Vec<EntityId> {
        self.order
            .iter()
            .copied()
            .filter(|id| {
                self.entities
                    .get(id)
                    .is_some_and(|t| t.carrier == Some(carrier))
            })
            .collect()
    }

    pub fn set_life_timer(&mut self, id: EntityId, timer: Option<LifeTimer>) -> bool {
        match self.entities.get_mut(&id) {
            Some(entry) => {
                entry.life = timer;
                true
            }
            None => false,
        }
    }

    /// Queue an entity for removal at the end of the next tick
    pub fn destroy(&mut self, id: EntityId, delay: f32) {
        self.destroy_queue.destroy(id, delay);
    }

    /// Update every entity once
    pub fn tick(
        &mut self,
        world: &WorldPartition,
        backend: &mut dyn EntityBackend,
        listener: &mut dyn PositionListener,
        dt: f32,
    ) -> TickSummary {
        self.tick += 1;
        let mut summary = TickSummary {
            tick: self.tick,
            ..TickSummary::default()
        };

        let ids = self.order.clone();
        for id in ids {
            if self.destroy_queue.contains(id) {
                continue;
            }
            let Some(entry) = self.entities.get_mut(&id) else {
                continue;
            };

            match entry.life.as_mut().and_then(|life| life.advance(dt)) {
                Some(LifeExpiry::Destroy) => {
                    log::debug!("[SYSTEM] {} life time over", id);
                    self.destroy_queue.destroy(id, 0.0);
                    continue;
                }
                Some(LifeExpiry::Notify) => listener.on_life_expired(id),
                None => {}
            }

            let Some(mut handles) = backend.handles(id) else {
                log::trace!("[SYSTEM] no handles for {}, skipping", id);
                continue;
            };
            let result = entry.tracker.update_position(
                world,
                &mut handles,
                &mut self.destroy_queue,
                self.tick,
                UpdateMode::Auto,
            );

            match result {
                Ok(report) => {
                    summary.updated += 1;
                    if report.awaiting_chunk {
                        summary.awaiting += 1;
                    }
                    for event in &report.events {
                        listener.on_event(id, event);
                    }
                    if let Some(switch) = report.plane_switch {
                        summary.plane_switches += 1;
                        self.propagate_plane(world, backend, listener, id, switch);
                    }
                }
                Err(err) => log::warn!("[SYSTEM] {}", err),
            }
        }

        let requests: Vec<(EntityId, f32)> = self.destroy_queue.drain().collect();
        for (id, delay) in requests {
            if self.untrack(id).is_some() {
                listener.on_destroyed(id, delay);
                summary.destroyed.push(id);
            }
        }
        summary
    }

    /// Teleport a tracked entity. Returns false when the entity or its
    /// handles are unknown.
    pub fn place_at(
        &mut self,
        world: &WorldPartition,
        backend: &mut dyn EntityBackend,
        listener: &mut dyn PositionListener,
        id: EntityId,
        point: Vec2,
        plane: PlaneId,
    ) -> Result<bool, PositionError> {
        let Some(entry) = self.entities.get_mut(&id) else {
            return Ok(false);
        };
        let Some(mut handles) = backend.handles(id) else {
            return Ok(false);
        };
        let report = entry.tracker.place_at(
            world,
            &mut handles,
            &mut self.destroy_queue,
            point,
            plane,
            self.tick,
        )?;
        for event in &report.events {
            listener.on_event(id, event);
        }
        if let Some(switch) = report.plane_switch {
            self.propagate_plane(world, backend, listener, id, switch);
        }
        Ok(true)
    }

    /// Forward a committed switch to the view planes and down the rider tree
    fn propagate_plane(
        &mut self,
        world: &WorldPartition,
        backend: &mut dyn EntityBackend,
        listener: &mut dyn PositionListener,
        carrier: EntityId,
        switch: PlaneSwitch,
    ) {
        self.view_planes
            .switch_to_plane(carrier, switch.plane, switch.viewport);

        let mut frontier = vec![(carrier, 0u32)];
        while let Some((parent, depth)) = frontier.pop() {
            let riders = self.riders_of(parent);
            if riders.is_empty() {
                continue;
            }
            if depth >= self.max_rider_depth {
                log::warn!("[SYSTEM] rider chain under {} deeper than {}", parent, depth);
                continue;
            }
            for rider in riders {
                let Some(entry) = self.entities.get_mut(&rider) else {
                    continue;
                };
                let Some(mut handles) = backend.handles(rider) else {
                    continue;
                };
                if let Some(event) = entry.tracker.apply_plane(world, switch.plane, &mut handles) {
                    let viewport = entry.tracker.settings().viewport;
                    self.view_planes.switch_to_plane(rider, switch.plane, viewport);
                    listener.on_event(rider, &event);
                }
                frontier.push((rider, depth + 1));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{PointBackend, TrackerSettings};
    use crate::world::ChunkStatus;
    use glam::IVec2;
    use strata_terrain::{FeatureKind, PlaneTable};

    fn world() -> WorldPartition {
        let mut config = EngineConfig::default();
        config.geometry.chunk_tiles = (4, 4);
        config.geometry.min_chunk = (0, 0);
        config.geometry.max_chunk = (1, 1);
        let mut world = WorldPartition::new(config);
        for y in 0..=1 {
            for x in 0..=1 {
                world.create_chunk(IVec2::new(x, y), PlaneTable::standard());
                world.set_chunk_status(IVec2::new(x, y), ChunkStatus::Available);
            }
        }
        world
    }

    fn spawn(system: &mut PositionSystem, backend: &mut PointBackend, at: Vec2) -> EntityId {
        let id = EntityId::new();
        backend.spawn(id, at, 1.0);
        system.track(PositionTracker::new(id, TrackerSettings::default()))
    }

    #[test]
    fn test_tick_updates_in_order() {
        let world = world();
        let mut system = PositionSystem::new(world.config(), 1);
        let mut backend = PointBackend::default();
        let a = spawn(&mut system, &mut backend, Vec2::new(1.5, 1.5));
        let b = spawn(&mut system, &mut backend, Vec2::new(5.5, 1.5));
        assert_eq!(system.ids(), &[a, b]);

        let mut events: Vec<(EntityId, PositionEvent)> = Vec::new();
        let summary = system.tick(&world, &mut backend, &mut events, 1.0 / 60.0);
        assert_eq!(summary.updated, 2);
        assert_eq!(summary.tick, 1);
        assert_eq!(events.first().map(|(id, _)| *id), Some(a));
        assert_eq!(system.tracker(b).unwrap().position().chunk, IVec2::new(1, 0));
    }

    #[test]
    fn test_entities_without_handles_are_skipped() {
        let world = world();
        let mut system = PositionSystem::new(world.config(), 1);
        let mut backend = PointBackend::default();
        system.track(PositionTracker::new(EntityId::new(), TrackerSettings::default()));
        let summary = system.tick(&world, &mut backend, &mut NoopListener, 0.1);
        assert_eq!(summary.updated, 0);
    }

    #[test]
    fn test_fatal_failure_removes_entity() {
        let world = world();
        let mut system = PositionSystem::new(world.config(), 1);
        let mut backend = PointBackend::default();
        let id = spawn(&mut system, &mut backend, Vec2::new(100.0, 1.0));

        let summary = system.tick(&world, &mut backend, &mut NoopListener, 0.1);
        assert_eq!(summary.destroyed, vec![id]);
        assert!(system.tracker(id).is_none());
        assert!(system.is_empty());
    }

    #[test]
    fn test_life_timer_destroys() {
        let world = world();
        let mut system = PositionSystem::new(world.config(), 1);
        let mut backend = PointBackend::default();
        let id = spawn(&mut system, &mut backend, Vec2::new(1.5, 1.5));
        assert!(system.set_life_timer(id, Some(LifeTimer::new(0.15))));

        let summary = system.tick(&world, &mut backend, &mut NoopListener, 0.1);
        assert!(summary.destroyed.is_empty());
        let summary = system.tick(&world, &mut backend, &mut NoopListener, 0.1);
        assert_eq!(summary.destroyed, vec![id]);
    }

    #[test]
    fn test_attach_refuses_loops() {
        let world = world();
        let mut system = PositionSystem::new(world.config(), 1);
        let mut backend = PointBackend::default();
        let a = spawn(&mut system, &mut backend, Vec2::new(1.5, 1.5));
        let b = spawn(&mut system, &mut backend, Vec2::new(1.5, 1.5));
        let c = spawn(&mut system, &mut backend, Vec2::new(1.5, 1.5));

        assert!(system.attach_rider(b, a));
        assert!(system.attach_rider(c, b));
        assert!(!system.attach_rider(a, c));
        assert!(!system.attach_rider(a, a));
        assert_eq!(system.riders_of(a), vec![b]);

        system.untrack(b);
        assert!(system.riders_of(b).is_empty());
        assert!(system.attach_rider(c, a));
    }

    #[test]
    fn test_plane_switch_reaches_riders_and_viewport() {
        let mut world = world();
        let mut system = PositionSystem::new(world.config(), 2);
        let mut backend = PointBackend::default();
        let cart = spawn(&mut system, &mut backend, Vec2::new(1.5, 1.5));
        let rider = spawn(&mut system, &mut backend, Vec2::new(1.5, 1.5));
        backend.get_mut(rider).unwrap().body.dynamic = false;
        assert!(system.attach_rider(rider, cart));
        system.view_planes_mut().set_focus(0, Some(cart));

        system.tick(&world, &mut backend, &mut NoopListener, 0.1);
        assert_eq!(system.tracker(cart).unwrap().plane(), Some(PlaneId::OUTER));

        world
            .chunk_mut(IVec2::ZERO)
            .unwrap()
            .set_feature(5, PlaneId::INNER, FeatureKind::Door);
        let mut events: Vec<(EntityId, PositionEvent)> = Vec::new();
        let summary = system.tick(&world, &mut backend, &mut events, 0.1);

        assert_eq!(summary.plane_switches, 1);
        assert_eq!(system.tracker(cart).unwrap().plane(), Some(PlaneId::INNER));
        assert_eq!(system.tracker(rider).unwrap().plane(), Some(PlaneId::INNER));
        assert_eq!(backend.get(rider).unwrap().render.plane, Some(PlaneId::INNER));
        assert_eq!(
            system.view_planes().viewport(0).unwrap().active_plane,
            PlaneId::INNER
        );
        assert!(events.iter().any(|(id, e)| *id == rider
            && matches!(e, PositionEvent::PlaneChanged { to: PlaneId::INNER, .. })));

        let rider_body = &backend.get(rider).unwrap().body;
        assert_eq!(rider_body.collision_plane, Some(PlaneId::INNER));
        assert!(rider_body.trigger_only);
        assert!(!backend.get(cart).unwrap().body.trigger_only);
    }

    #[test]
    fn test_detached_rider_collides_again() {
        let world = world();
        let mut system = PositionSystem::new(world.config(), 1);
        let mut backend = PointBackend::default();
        let cart = spawn(&mut system, &mut backend, Vec2::new(1.5, 1.5));
        let rider = spawn(&mut system, &mut backend, Vec2::new(1.5, 1.5));
        assert!(system.attach_rider(rider, cart));

        system.tick(&world, &mut backend, &mut NoopListener, 0.1);
        assert!(system.tracker(rider).unwrap().is_riding());
        assert!(backend.get(rider).unwrap().body.trigger_only);

        system.detach_rider(rider);
        system.tick(&world, &mut backend, &mut NoopListener, 0.1);
        assert!(!backend.get(rider).unwrap().body.trigger_only);
        assert_eq!(
            backend.get(rider).unwrap().body.collision_plane,
            Some(PlaneId::OUTER)
        );
    }
}
