//! Fluid/gravity state machine
//!
//! Each tick an entity is either climbing, in fluid or in air. Transitions
//! set the body's gravity scale; entering fluid fast damps the fall, and a
//! floating force keeps buoyant bodies up while submerged.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strata_terrain::FluidCell;

use super::events::PositionEvent;
use super::handles::{MovementState, PhysicsHandle};
use crate::config::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AreaState {
    Climbing,
    InFluid,
    InAir,
}

/// Last committed area state of one entity
#[derive(Debug, Clone, Default)]
pub struct AreaTracker {
    state: Option<AreaState>,
    wetted: Option<bool>,
    /// Tick of the last floating force, so repeated updates stay idempotent
    last_force_tick: Option<u64>,
}

impl AreaTracker {
    pub fn state(&self) -> Option<AreaState> {
        self.state
    }

    pub fn is_wetted(&self) -> bool {
        self.wetted.unwrap_or(false)
    }

    /// Classify without side effects
    pub fn classify(
        movement: MovementState,
        cell: Option<&FluidCell>,
        sub_tile: Vec2,
        config: &EngineConfig,
    ) -> AreaState {
        if movement.is_climbing() {
            return AreaState::Climbing;
        }
        let in_fluid = config.fluid_enabled
            && cell.is_some_and(|c| c.fluid_height() > sub_tile.y);
        if in_fluid {
            AreaState::InFluid
        } else {
            AreaState::InAir
        }
    }

    /// Apply the state for this tick, pushing notifications for transitions
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        physics: &mut dyn PhysicsHandle,
        movement: MovementState,
        cell: Option<&FluidCell>,
        sub_tile: Vec2,
        buoyancy: f32,
        config: &EngineConfig,
        tick: u64,
        events: &mut SmallVec<[PositionEvent; 4]>,
    ) {
        let next = Self::classify(movement, cell, sub_tile, config);
        let tuning = &config.buoyancy;

        if self.state != Some(next) {
            let scale = match next {
                AreaState::Climbing => config.gravity.none,
                AreaState::InFluid => config.gravity.fluid,
                AreaState::InAir => config.gravity.air,
            };
            physics.set_gravity(scale);

            if next == AreaState::InFluid && buoyancy > 0.0 {
                let velocity = physics.velocity();
                if velocity.y < -tuning.entry_speed {
                    // Splash: damp the fall and kick upward
                    physics.set_velocity(Vec2::new(velocity.x, velocity.y * tuning.entry_damping));
                    let impulse = tuning.entry_impulse * buoyancy * physics.body_mass();
                    physics.add_impulse(Vec2::new(0.0, impulse));
                }
            }

            log::debug!("[AREA] {:?} -> {:?} (gravity {})", self.state, next, scale);
            self.state = Some(next);
            events.push(PositionEvent::AreaChanged { state: next });
            events.push(PositionEvent::GravityChanged { scale });
        }

        if next == AreaState::InFluid && buoyancy > 0.0 && self.last_force_tick != Some(tick) {
            if physics.velocity().y <= tuning.rest_speed {
                let force = tuning.rest_force * buoyancy * physics.body_mass();
                physics.add_force(Vec2::new(0.0, force));
            }
            self.last_force_tick = Some(tick);
        }

        let wetted = next == AreaState::InFluid;
        if self.wetted != Some(wetted) {
            self.wetted = Some(wetted);
            events.push(PositionEvent::FluidStateChanged { wetted });
        }
    }
}
