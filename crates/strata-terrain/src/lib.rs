//! Terrain data for Strata
//!
//! This crate provides the foundational data types shared by the world and
//! the position engine:
//! - Depth planes (PlaneId, PlaneTable)
//! - Tile features painted on each plane (FeatureKind)
//! - Fluid/collision cells and their neighbor graph (FluidCell, FluidGrid)

mod cell;
mod feature;
mod grid;
mod plane;

pub use cell::{CellIndex, CellKind, Direction, FluidCell};
pub use feature::FeatureKind;
pub use grid::FluidGrid;
pub use plane::{PlaneId, PlaneTable};
