//! Chunk lifecycle status

use serde::{Deserialize, Serialize};

/// Loading state of a chunk. Ordered: an entity waits while its chunk is
/// at or before `Creating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum ChunkStatus {
    #[default]
    Uninitialized,
    Creating,
    Available,
    Unloading,
}

impl ChunkStatus {
    /// Entities may resolve cells and planes against the chunk
    pub fn is_available(self) -> bool {
        self == ChunkStatus::Available
    }

    /// Still being generated or loaded
    pub fn is_pending(self) -> bool {
        self <= ChunkStatus::Creating
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_order() {
        assert!(ChunkStatus::Uninitialized < ChunkStatus::Creating);
        assert!(ChunkStatus::Creating < ChunkStatus::Available);
        assert!(ChunkStatus::Available < ChunkStatus::Unloading);
    }

    #[test]
    fn test_pending_and_available() {
        assert!(ChunkStatus::Creating.is_pending());
        assert!(!ChunkStatus::Creating.is_available());
        assert!(ChunkStatus::Available.is_available());
        assert!(!ChunkStatus::Unloading.is_pending());
        assert!(!ChunkStatus::Unloading.is_available());
    }
}
