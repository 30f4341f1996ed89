//! Notifications produced by position updates

use glam::IVec2;
use strata_terrain::PlaneId;

use super::area_state::AreaState;

#[derive(Debug, Clone, PartialEq)]
pub enum PositionEvent {
    /// The entity crossed into another chunk
    ChunkChanged { from: IVec2, to: IVec2 },
    /// A plane switch was committed
    PlaneChanged { from: Option<PlaneId>, to: PlaneId },
    /// The entity entered or left fluid
    FluidStateChanged { wetted: bool },
    AreaChanged { state: AreaState },
    GravityChanged { scale: f32 },
    /// The chunk the entity was waiting for became available
    Appeared { chunk: IVec2 },
    /// The entity was pushed out of solid terrain
    Unstuck { offset: IVec2 },
}
