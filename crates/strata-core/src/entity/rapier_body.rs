//! `PhysicsHandle` for rapier rigid bodies
//!
//! A rigid body cannot reach its colliders, so plane filters are recorded in
//! the body's `user_data` and copied onto the colliders by the owner of the
//! `ColliderSet` (see `plane_filter`).

use glam::Vec2;
use rapier2d::prelude::*;
use strata_terrain::PlaneId;

use super::handles::PhysicsHandle;

/// Set in `user_data` once a plane filter has been recorded
const FILTER_SET: u128 = 1 << 64;

/// Collision groups for a body on `plane`. Riders keep their plane
/// membership but filter out everything, so they produce no contacts.
pub fn plane_interaction_groups(plane: PlaneId, riding: bool) -> InteractionGroups {
    let membership = Group::from_bits_truncate(plane.layer_mask());
    let filter = if riding { Group::NONE } else { membership };
    InteractionGroups::new(membership, filter)
}

/// Groups recorded by `PhysicsHandle::set_plane_filter`, if any
pub fn plane_filter(body: &RigidBody) -> Option<InteractionGroups> {
    if body.user_data & FILTER_SET == 0 {
        return None;
    }
    let memberships = Group::from_bits_truncate(body.user_data as u32);
    let filter = Group::from_bits_truncate((body.user_data >> 32) as u32);
    Some(InteractionGroups::new(memberships, filter))
}

fn to_glam(v: &Vector<Real>) -> Vec2 {
    Vec2::new(v.x, v.y)
}

/// World-space center of mass from the current pose. Unlike the cached
/// value this is correct right after a teleport.
fn world_com(body: &RigidBody) -> Point<Real> {
    body.position() * body.mass_properties().local_mprops.local_com
}

impl PhysicsHandle for RigidBody {
    fn mass_center(&self) -> Option<Vec2> {
        if !self.is_enabled() {
            return None;
        }
        let center = world_com(self);
        Some(Vec2::new(center.x, center.y))
    }

    fn origin(&self) -> Vec2 {
        to_glam(self.translation())
    }

    fn is_dynamic_body(&self) -> bool {
        self.is_dynamic()
    }

    fn velocity(&self) -> Vec2 {
        to_glam(self.linvel())
    }

    fn set_velocity(&mut self, velocity: Vec2) {
        self.set_linvel(vector![velocity.x, velocity.y], true);
    }

    fn add_impulse(&mut self, impulse: Vec2) {
        self.apply_impulse(vector![impulse.x, impulse.y], true);
    }

    fn add_force(&mut self, force: Vec2) {
        RigidBody::add_force(self, vector![force.x, force.y], true);
    }

    fn body_mass(&self) -> f32 {
        self.mass()
    }

    fn gravity(&self) -> f32 {
        self.gravity_scale()
    }

    fn set_gravity(&mut self, scale: f32) {
        self.set_gravity_scale(scale, true);
    }

    fn move_mass_center_to(&mut self, target: Vec2) {
        let center = world_com(self);
        let delta = vector![target.x - center.x, target.y - center.y];
        let translation = *self.translation() + delta;
        self.set_translation(translation, true);
    }

    fn body_enabled(&self) -> bool {
        self.is_enabled()
    }

    fn set_body_enabled(&mut self, enabled: bool) {
        self.set_enabled(enabled);
    }

    fn set_plane_filter(&mut self, plane: PlaneId, riding: bool) {
        let groups = plane_interaction_groups(plane, riding);
        self.user_data = FILTER_SET
            | ((groups.filter.bits() as u128) << 32)
            | groups.memberships.bits() as u128;
    }
}
