//! Tile features painted on depth planes

use serde::{Deserialize, Serialize};

/// What occupies a tile on a given plane.
///
/// The declaration order is significant: everything ranked above
/// `NoRender` is structure, and `Door` is treated as structure too.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum FeatureKind {
    #[default]
    None = 0,
    InnerSpace,
    Door,
    Window,
    OuterSpace,
    Threshold,
    NoRender,
    Roof,
    Floor,
    Wall,
    Platform,
}

impl FeatureKind {
    /// Walls, floors, roofs, platforms and doors
    pub fn is_structural(self) -> bool {
        self > FeatureKind::NoRender || self == FeatureKind::Door
    }

    /// Empty tile or a door frame
    pub fn is_passage(self) -> bool {
        self <= FeatureKind::Door
    }

    /// Single-character form used by text maps
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            '.' | ' ' => FeatureKind::None,
            'i' => FeatureKind::InnerSpace,
            'D' => FeatureKind::Door,
            'W' => FeatureKind::Window,
            'o' => FeatureKind::OuterSpace,
            't' => FeatureKind::Threshold,
            'n' => FeatureKind::NoRender,
            'R' => FeatureKind::Roof,
            'F' => FeatureKind::Floor,
            '#' => FeatureKind::Wall,
            'P' => FeatureKind::Platform,
            _ => return None,
        })
    }
}
