//! Strata core: world partition and entity position tracking
//!
//! - `world`: chunk storage, world geometry, overlays, view planes and the
//!   per-tick `PositionSystem`
//! - `entity`: the per-entity `PositionTracker` with unstuck recovery, plane
//!   switching and fluid/gravity state
//! - `config`: engine tuning loaded from RON

pub mod config;
pub mod entity;
pub mod error;
pub mod world;

pub use config::EngineConfig;
pub use entity::{EntityId, PositionTracker, WorldMapPosition};
pub use error::{ConfigError, GeometryError, PositionError, UnstuckError};
pub use world::{PositionSystem, WorldPartition};

// Re-export the terrain crate so downstream users need a single dependency
pub mod terrain {
    pub use strata_terrain::*;
}
