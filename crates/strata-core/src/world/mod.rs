//! World management - chunks, overlays, view planes and the position system

mod chunk;
mod chunk_status;
pub mod geometry;
mod overlay;
mod partition;
mod position_system;
mod view_planes;

pub use chunk::Chunk;
pub use chunk_status::ChunkStatus;
pub use geometry::{TileFix, WorldGeometry};
pub use overlay::{Overlay, OverlayId};
pub use partition::WorldPartition;
pub use position_system::{NoopListener, PositionListener, PositionSystem, TickSummary};
pub use view_planes::{ViewPlanes, Viewport};
