//! Capabilities the tracker needs from the rest of the game
//!
//! The tracker never owns physics bodies or scene nodes. It is handed
//! `EntityHandles` for the duration of one update and talks to them through
//! these traits.

use ahash::AHashMap;
use glam::Vec2;
use strata_terrain::PlaneId;

use super::id::EntityId;

bitflags::bitflags! {
    /// Movement state set by the movement controller
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MovementState: u32 {
        const CLIMB_WALL = 1 << 0;
        const CLIMB_ROOF = 1 << 1;
        const ON_GROUND = 1 << 2;
    }
}

impl MovementState {
    pub fn is_climbing(self) -> bool {
        self.intersects(MovementState::CLIMB_WALL | MovementState::CLIMB_ROOF)
    }
}

/// Rigid body access
pub trait PhysicsHandle {
    /// World-space mass center while the body is attached and enabled
    fn mass_center(&self) -> Option<Vec2>;

    /// Scene-node origin, used when there is no enabled body
    fn origin(&self) -> Vec2;

    /// Whether the body is simulated (not static or kinematic)
    fn is_dynamic_body(&self) -> bool;

    fn velocity(&self) -> Vec2;
    fn set_velocity(&mut self, velocity: Vec2);
    fn add_impulse(&mut self, impulse: Vec2);

    /// Force applied on the next physics step. Implementations may keep it
    /// until the owner resets forces; the owner must clear it after every
    /// step or per-tick forces such as buoyancy accumulate.
    fn add_force(&mut self, force: Vec2);

    fn body_mass(&self) -> f32;
    fn gravity(&self) -> f32;
    fn set_gravity(&mut self, scale: f32);

    /// Teleport so that the mass center lands on `target`
    fn move_mass_center_to(&mut self, target: Vec2);

    fn body_enabled(&self) -> bool;
    fn set_body_enabled(&mut self, enabled: bool);

    /// Collide only with bodies on `plane`. A riding body keeps its plane
    /// membership but becomes trigger-only.
    fn set_plane_filter(&mut self, plane: PlaneId, riding: bool);
}

/// Scene-node access
pub trait RenderHandle {
    fn is_enabled(&self) -> bool;

    /// Enable/disable the node and all of its children
    fn set_enabled_recursive(&mut self, enabled: bool);

    /// Move the node's drawables to a plane's render layer
    fn apply_plane(&mut self, plane: PlaneId, view_mask: u32, draw_order: i32);
}

/// Entity removal, owned by whoever spawned the entity
pub trait Lifecycle {
    fn destroy(&mut self, entity: EntityId, delay: f32);
}

/// Per-update borrow of an entity's collaborators
pub struct EntityHandles<'a> {
    pub physics: &'a mut dyn PhysicsHandle,
    pub render: &'a mut dyn RenderHandle,
    pub movement: MovementState,
}

/// Hands out `EntityHandles` to the position system
pub trait EntityBackend {
    fn handles(&mut self, entity: EntityId) -> Option<EntityHandles<'_>>;
}

/// Collects destroy requests until the owner drains them
#[derive(Debug, Default)]
pub struct DestroyQueue {
    requests: Vec<(EntityId, f32)>,
}

impl DestroyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.requests.iter().any(|(id, _)| *id == entity)
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, (EntityId, f32)> {
        self.requests.drain(..)
    }
}

impl Lifecycle for DestroyQueue {
    fn destroy(&mut self, entity: EntityId, delay: f32) {
        log::debug!("[LIFECYCLE] destroy {} in {:.2}s", entity, delay);
        self.requests.push((entity, delay));
    }
}

/// Minimal point-mass body for entities without a physics engine body
#[derive(Debug, Clone, PartialEq)]
pub struct PointBody {
    /// Scene-node origin
    pub position: Vec2,
    /// Mass center relative to the origin
    pub center_offset: Vec2,
    pub velocity: Vec2,
    pub mass: f32,
    pub gravity_scale: f32,
    pub dynamic: bool,
    pub enabled: bool,
    /// Force accumulated for the next step
    pub force: Vec2,
    /// Plane whose bodies this one collides with, `None` until first set
    pub collision_plane: Option<PlaneId>,
    /// Overlaps are reported but never resolved
    pub trigger_only: bool,
}

impl PointBody {
    pub fn new(position: Vec2, mass: f32) -> Self {
        Self {
            position,
            center_offset: Vec2::ZERO,
            velocity: Vec2::ZERO,
            mass,
            gravity_scale: 1.0,
            dynamic: true,
            enabled: true,
            force: Vec2::ZERO,
            collision_plane: None,
            trigger_only: false,
        }
    }

    /// Semi-implicit Euler step; clears the accumulated force
    pub fn integrate(&mut self, gravity: Vec2, dt: f32) {
        if !self.enabled || !self.dynamic {
            self.force = Vec2::ZERO;
            return;
        }
        let inv_mass = if self.mass > 0.0 { 1.0 / self.mass } else { 0.0 };
        self.velocity += (gravity * self.gravity_scale + self.force * inv_mass) * dt;
        self.position += self.velocity * dt;
        self.force = Vec2::ZERO;
    }
}

impl PhysicsHandle for PointBody {
    fn mass_center(&self) -> Option<Vec2> {
        self.enabled.then(|| self.position + self.center_offset)
    }

    fn origin(&self) -> Vec2 {
        self.position
    }

    fn is_dynamic_body(&self) -> bool {
        self.dynamic
    }

    fn velocity(&self) -> Vec2 {
        self.velocity
    }

    fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }

    fn add_impulse(&mut self, impulse: Vec2) {
        if self.mass > 0.0 {
            self.velocity += impulse / self.mass;
        }
    }

    fn add_force(&mut self, force: Vec2) {
        self.force += force;
    }

    fn body_mass(&self) -> f32 {
        self.mass
    }

    fn gravity(&self) -> f32 {
        self.gravity_scale
    }

    fn set_gravity(&mut self, scale: f32) {
        self.gravity_scale = scale;
    }

    fn move_mass_center_to(&mut self, target: Vec2) {
        self.position = target - self.center_offset;
    }

    fn body_enabled(&self) -> bool {
        self.enabled
    }

    fn set_body_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn set_plane_filter(&mut self, plane: PlaneId, riding: bool) {
        self.collision_plane = Some(plane);
        self.trigger_only = riding;
    }
}

/// Render bookkeeping for headless use and tests
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub enabled: bool,
    pub plane: Option<PlaneId>,
    pub view_mask: u32,
    pub draw_order: i32,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            enabled: true,
            plane: None,
            view_mask: 0,
            draw_order: 0,
        }
    }
}

impl RenderHandle for RenderState {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled_recursive(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn apply_plane(&mut self, plane: PlaneId, view_mask: u32, draw_order: i32) {
        self.plane = Some(plane);
        self.view_mask = view_mask;
        self.draw_order = draw_order;
    }
}

/// One headless entity: point body plus render bookkeeping
#[derive(Debug, Clone)]
pub struct PointEntity {
    pub body: PointBody,
    pub render: RenderState,
    pub movement: MovementState,
}

/// `EntityBackend` over point bodies, for servers and tests without a
/// physics engine
#[derive(Debug, Default)]
pub struct PointBackend {
    entities: AHashMap<EntityId, PointEntity>,
}

impl PointBackend {
    pub fn spawn(&mut self, entity: EntityId, position: Vec2, mass: f32) -> &mut PointEntity {
        self.entities.entry(entity).or_insert_with(|| PointEntity {
            body: PointBody::new(position, mass),
            render: RenderState::default(),
            movement: MovementState::empty(),
        })
    }

    pub fn remove(&mut self, entity: EntityId) -> Option<PointEntity> {
        self.entities.remove(&entity)
    }

    pub fn get(&self, entity: EntityId) -> Option<&PointEntity> {
        self.entities.get(&entity)
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut PointEntity> {
        self.entities.get_mut(&entity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Step every body
    pub fn integrate(&mut self, gravity: Vec2, dt: f32) {
        for entity in self.entities.values_mut() {
            entity.body.integrate(gravity, dt);
        }
    }
}

impl EntityBackend for PointBackend {
    fn handles(&mut self, entity: EntityId) -> Option<EntityHandles<'_>> {
        let e = self.entities.get_mut(&entity)?;
        Some(EntityHandles {
            physics: &mut e.body,
            render: &mut e.render,
            movement: e.movement,
        })
    }
}
