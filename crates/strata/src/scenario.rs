//! Scenario definition and RON file loading
//!
//! A scenario describes a small world (chunks with per-plane cell and
//! feature rows, optional overlays), the entities placed in it, actions
//! applied at given ticks and the checks to run at the end. Rows are written
//! top row first.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use strata_core::config::GeometryConfig;
use strata_core::entity::TrackerSettings;
use strata_core::world::ChunkStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Ticks to run, falls back to the runner setting
    #[serde(default)]
    pub ticks: Option<u64>,

    /// Replaces the configured gravity
    #[serde(default)]
    pub gravity: Option<f32>,

    /// Replaces the configured world geometry
    #[serde(default)]
    pub geometry: Option<GeometryConfig>,

    #[serde(default)]
    pub chunks: Vec<ChunkSpec>,

    #[serde(default)]
    pub overlays: Vec<OverlaySpec>,

    #[serde(default)]
    pub entities: Vec<EntitySpec>,

    #[serde(default)]
    pub actions: Vec<TimedAction>,

    #[serde(default)]
    pub verify: Vec<Expectation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSpec {
    pub coord: (i32, i32),

    /// Tick at which the chunk becomes available, 0 for immediately
    #[serde(default)]
    pub available_at: u64,

    #[serde(default)]
    pub planes: Vec<PlaneSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaneSpec {
    pub plane: i32,

    /// Cell rows: `#` block, `.` air, `_` `,` `~` fluid surface
    #[serde(default)]
    pub cells: Vec<String>,

    /// Feature rows, one character per tile
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlaySpec {
    pub origin: (f32, f32),
    pub cells: Vec<String>,

    #[serde(default)]
    pub features: Vec<String>,

    #[serde(default = "default_true")]
    pub switchable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySpec {
    /// Name used by actions and checks
    pub name: String,
    pub position: (f32, f32),

    #[serde(default)]
    pub velocity: (f32, f32),

    #[serde(default = "default_mass")]
    pub mass: f32,

    /// Fixed bodies are tracked but never simulated
    #[serde(default)]
    pub fixed: bool,

    /// Preferred starting plane
    #[serde(default)]
    pub plane: Option<i32>,

    #[serde(default)]
    pub settings: TrackerSettings,

    /// Name of the entity this one rides on
    #[serde(default)]
    pub rides: Option<String>,

    /// Viewport that follows this entity
    #[serde(default)]
    pub focus: Option<usize>,

    /// Seconds until the entity is destroyed
    #[serde(default)]
    pub life_time: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedAction {
    pub at: u64,
    pub action: ScenarioAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScenarioAction {
    SetFeature {
        chunk: (i32, i32),
        tile: (i32, i32),
        plane: i32,
        feature: char,
    },
    SetCell {
        chunk: (i32, i32),
        tile: (i32, i32),
        plane: i32,
        cell: char,
    },
    SetChunkStatus {
        chunk: (i32, i32),
        status: ChunkStatus,
    },
    SetVelocity {
        entity: String,
        velocity: (f32, f32),
    },
    /// Movement controller flags; climbing disables gravity
    SetMovement {
        entity: String,
        #[serde(default)]
        climb_wall: bool,
        #[serde(default)]
        climb_roof: bool,
        #[serde(default)]
        on_ground: bool,
    },
    Teleport {
        entity: String,
        position: (f32, f32),
        plane: i32,
    },
    MoveOverlay {
        index: usize,
        origin: (f32, f32),
    },
    Destroy {
        entity: String,
    },
    Log {
        message: String,
    },
}

/// End-of-run checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expectation {
    Plane { entity: String, plane: i32 },
    Chunk { entity: String, chunk: (i32, i32) },
    Tile { entity: String, tile: (i32, i32) },
    Wetted { entity: String, wetted: bool },
    Destroyed { entity: String },
    Alive { entity: String },
    ViewportPlane { viewport: usize, plane: i32 },
}

fn default_true() -> bool {
    true
}

fn default_mass() -> f32 {
    1.0
}

impl ScenarioDefinition {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;
        Self::from_ron_str(&content)
            .with_context(|| format!("Failed to parse RON scenario: {}", path.display()))
    }

    pub fn from_ron_str(content: &str) -> Result<Self> {
        Ok(ron::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_scenario() {
        let scenario = ScenarioDefinition::from_ron_str(
            r#"(
                name: "minimal",
                chunks: [(coord: (0, 0))],
                entities: [(name: "crate", position: (1.5, 1.5))],
                actions: [(at: 2, action: SetFeature(chunk: (0, 0), tile: (1, 1), plane: 70, feature: 'D'))],
                verify: [Plane(entity: "crate", plane: 70)],
            )"#,
        )
        .unwrap();

        assert_eq!(scenario.name, "minimal");
        assert_eq!(scenario.chunks[0].available_at, 0);
        assert_eq!(scenario.entities[0].mass, 1.0);
        assert!(scenario.entities[0].settings.check_unstuck);
        assert!(matches!(
            scenario.actions[0].action,
            ScenarioAction::SetFeature { feature: 'D', .. }
        ));
    }

    #[test]
    fn test_sample_scenarios_parse() {
        for file in ["door_walk.ron", "splash.ron"] {
            let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file);
            ScenarioDefinition::from_file(&path).unwrap();
        }
    }
}
