//! Entity position tracking
//!
//! Each tracked entity owns a `PositionTracker`. Once per tick the tracker
//! reads the entity's physics reference point, resolves it against the world
//! partition and reconciles chunk, tile, plane, collision cell and fluid
//! state. Physics and rendering are reached through the traits in `handles`.

mod area_state;
mod events;
pub mod handles;
mod id;
mod lifetime;
pub mod plane_switch;
mod position;
#[cfg(feature = "rapier")]
mod rapier_body;
mod tracker;
pub mod unstuck;

pub use area_state::{AreaState, AreaTracker};
pub use events::PositionEvent;
pub use handles::{
    DestroyQueue, EntityBackend, EntityHandles, Lifecycle, MovementState, PhysicsHandle,
    PointBackend, PointBody, PointEntity, RenderHandle, RenderState,
};
pub use id::EntityId;
pub use lifetime::{LifeExpiry, LifeTimer};
pub use position::{Footprint, WorldMapPosition};
#[cfg(feature = "rapier")]
pub use rapier_body::{plane_filter, plane_interaction_groups};
pub use tracker::{PlaneSwitch, PositionTracker, TickReport, TrackerSettings, UpdateMode};
pub use unstuck::{UnstuckPlan, is_footprint_free, plan_unstuck};
