//! Rapier physics world and the entity backend built on it

use glam::Vec2;
use rapier2d::prelude::*;
use ahash::AHashMap;
use strata_core::entity::{
    EntityBackend, EntityHandles, EntityId, MovementState, PhysicsHandle, RenderState, plane_filter,
};

/// Radius of the ball collider given to every entity, in tiles
const BODY_RADIUS: f32 = 0.4;

/// Manages the rapier2d physics world
pub struct PhysicsWorld {
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    gravity: Vector<Real>,
}

impl PhysicsWorld {
    pub fn new(dt: f32, gravity: f32) -> Self {
        let integration_parameters = IntegrationParameters {
            dt,
            ..Default::default()
        };

        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            pipeline: PhysicsPipeline::new(),
            integration_parameters,
            island_manager: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            gravity: vector![0.0, -gravity],
        }
    }

    /// Insert a ball body centered on `position`
    pub fn add_body(&mut self, position: Vec2, velocity: Vec2, mass: f32, fixed: bool) -> RigidBodyHandle {
        let builder = if fixed {
            RigidBodyBuilder::fixed()
        } else {
            RigidBodyBuilder::dynamic()
        };
        let body = builder
            .translation(vector![position.x, position.y])
            .linvel(vector![velocity.x, velocity.y])
            .build();
        let handle = self.rigid_body_set.insert(body);

        // Entities overlap freely; the position engine handles terrain contact
        let collider = ColliderBuilder::ball(BODY_RADIUS)
            .mass(mass)
            .sensor(true)
            .build();
        self.collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);

        log::debug!(
            "Physics: body {:?} at ({:.2}, {:.2}), mass {}",
            handle,
            position.x,
            position.y,
            mass
        );
        handle
    }

    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.rigid_body_set.get(handle)
    }

    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.rigid_body_set.get_mut(handle)
    }

    /// Copy plane filters recorded on bodies onto their colliders
    fn sync_collision_groups(&mut self) {
        for (_, body) in self.rigid_body_set.iter() {
            let Some(groups) = plane_filter(body) else {
                continue;
            };
            for handle in body.colliders() {
                if let Some(collider) = self.collider_set.get_mut(*handle) {
                    if collider.collision_groups() != groups {
                        collider.set_collision_groups(groups);
                    }
                }
            }
        }
    }

    pub fn step(&mut self) {
        self.sync_collision_groups();

        let physics_hooks = ();
        let event_handler = ();

        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &physics_hooks,
            &event_handler,
        );

        // Rapier keeps forces until reset
        for (_, body) in self.rigid_body_set.iter_mut() {
            body.reset_forces(false);
        }
    }
}

struct BodyEntry {
    handle: RigidBodyHandle,
    render: RenderState,
    movement: MovementState,
}

/// Hands out rapier bodies and render state per entity
pub struct RapierBackend {
    physics: PhysicsWorld,
    entities: AHashMap<EntityId, BodyEntry>,
}

impl RapierBackend {
    pub fn new(physics: PhysicsWorld) -> Self {
        Self {
            physics,
            entities: AHashMap::new(),
        }
    }

    pub fn spawn(&mut self, entity: EntityId, position: Vec2, velocity: Vec2, mass: f32, fixed: bool) {
        let handle = self.physics.add_body(position, velocity, mass, fixed);
        self.entities.insert(
            entity,
            BodyEntry {
                handle,
                render: RenderState::default(),
                movement: MovementState::empty(),
            },
        );
    }

    pub fn despawn(&mut self, entity: EntityId) {
        if let Some(entry) = self.entities.remove(&entity) {
            self.physics.remove_body(entry.handle);
        }
    }

    pub fn body_mut(&mut self, entity: EntityId) -> Option<&mut RigidBody> {
        let handle = self.entities.get(&entity)?.handle;
        self.physics.body_mut(handle)
    }

    pub fn set_movement(&mut self, entity: EntityId, movement: MovementState) -> bool {
        match self.entities.get_mut(&entity) {
            Some(entry) => {
                entry.movement = movement;
                true
            }
            None => false,
        }
    }

    /// Current mass center, for reporting
    pub fn position(&self, entity: EntityId) -> Option<Vec2> {
        let entry = self.entities.get(&entity)?;
        let body = self.physics.body(entry.handle)?;
        PhysicsHandle::mass_center(body)
    }

    pub fn step(&mut self) {
        self.physics.step();
    }
}

impl EntityBackend for RapierBackend {
    fn handles(&mut self, entity: EntityId) -> Option<EntityHandles<'_>> {
        let entry = self.entities.get_mut(&entity)?;
        let body = self.physics.rigid_body_set.get_mut(entry.handle)?;
        Some(EntityHandles {
            physics: body,
            render: &mut entry.render,
            movement: entry.movement,
        })
    }
}
