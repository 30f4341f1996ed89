//! Depth planes
//!
//! A chunk is stacked back-to-front into depth planes. Entities walk on the
//! inner or the outer plane; the back plane only carries decoration and
//! structure.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a depth plane. Larger values are closer to the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaneId(pub i32);

impl PlaneId {
    pub const BACK: PlaneId = PlaneId(40);
    pub const INNER: PlaneId = PlaneId(70);
    pub const OUTER: PlaneId = PlaneId(100);

    /// Render layer bit for this plane
    pub fn layer_mask(self) -> u32 {
        match self {
            PlaneId::BACK => 1 << 0,
            PlaneId::INNER => 1 << 1,
            PlaneId::OUTER => 1 << 2,
            _ => 1 << 3,
        }
    }

    /// The plane an entity toggles to through a door or window
    pub fn opposite(self) -> PlaneId {
        if self == PlaneId::INNER {
            PlaneId::OUTER
        } else {
            PlaneId::INNER
        }
    }
}

impl fmt::Display for PlaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PlaneId::BACK => write!(f, "back"),
            PlaneId::INNER => write!(f, "inner"),
            PlaneId::OUTER => write!(f, "outer"),
            PlaneId(z) => write!(f, "plane#{}", z),
        }
    }
}

/// Ordered set of planes present in a chunk (back to front)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaneTable {
    planes: Vec<PlaneId>,
}

impl PlaneTable {
    /// Build a table from any plane list; duplicates are dropped and the
    /// result is sorted back to front.
    pub fn new(planes: impl IntoIterator<Item = PlaneId>) -> Self {
        let mut planes: Vec<PlaneId> = planes.into_iter().collect();
        planes.sort();
        planes.dedup();
        Self { planes }
    }

    /// Back, inner and outer planes
    pub fn standard() -> Self {
        Self::new([PlaneId::BACK, PlaneId::INNER, PlaneId::OUTER])
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    pub fn index_of(&self, plane: PlaneId) -> Option<usize> {
        self.planes.binary_search(&plane).ok()
    }

    pub fn get(&self, index: usize) -> Option<PlaneId> {
        self.planes.get(index).copied()
    }

    /// Frontmost plane, or `PlaneId::OUTER` for an empty table
    pub fn outermost(&self) -> PlaneId {
        self.planes.last().copied().unwrap_or(PlaneId::OUTER)
    }

    /// Planes at or behind `plane`, nearest first
    pub fn at_or_behind(&self, plane: PlaneId) -> impl Iterator<Item = PlaneId> + '_ {
        self.planes.iter().rev().copied().filter(move |p| *p <= plane)
    }

    /// Planes at or in front of `plane`, nearest first
    pub fn at_or_in_front(&self, plane: PlaneId) -> impl Iterator<Item = PlaneId> + '_ {
        self.planes.iter().copied().filter(move |p| *p >= plane)
    }

    pub fn iter(&self) -> impl Iterator<Item = PlaneId> + '_ {
        self.planes.iter().copied()
    }
}

impl Default for PlaneTable {
    fn default() -> Self {
        Self::standard()
    }
}
