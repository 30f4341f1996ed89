//! Error types for the position engine

use crate::entity::EntityId;
use thiserror::Error;

/// World-point conversion failures
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeometryError {
    #[error("world point is not a number")]
    NotANumber,
    #[error("world point ({x}, {y}) is outside the world bounds")]
    OutOfBounds { x: f32, y: f32 },
}

/// Reasons an embedded entity could not be relocated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UnstuckError {
    #[error("no direction leads out of the blocked area")]
    NoClearNeighbor,
    #[error("footprint does not fit along the {axis} axis")]
    FootprintDoesNotFit { axis: char },
    #[error("relocated footprint still overlaps blocked cells")]
    StillBlocked,
}

/// Fatal position failures. The entity is destroyed when one is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PositionError {
    #[error("{entity} has an invalid world position")]
    InvalidPosition { entity: EntityId },
    #[error("{entity} left the world at ({x}, {y})")]
    OutOfWorld { entity: EntityId, x: f32, y: f32 },
    #[error("{entity} is stuck in terrain: {source}")]
    Unstuck {
        entity: EntityId,
        #[source]
        source: UnstuckError,
    },
    #[error("{entity} was already destroyed")]
    Destroyed { entity: EntityId },
}

impl PositionError {
    pub fn entity(&self) -> EntityId {
        match self {
            PositionError::InvalidPosition { entity }
            | PositionError::OutOfWorld { entity, .. }
            | PositionError::Unstuck { entity, .. }
            | PositionError::Destroyed { entity } => *entity,
        }
    }
}

/// Engine configuration problems
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("failed to parse engine config: {0}")]
    Parse(String),
    #[error("invalid engine config: {0}")]
    Invalid(String),
}
