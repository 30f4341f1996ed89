//! Engine configuration - serializable tuning for geometry, fluids and gravity
//!
//! Loaded from RON. Every section has defaults so a config file only needs to
//! list the values it overrides.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Whether this process is authoritative for entity lifetimes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionMode {
    /// Out-of-bounds entities are destroyed
    #[default]
    Local,
    /// Positions are replicated from a server; out-of-bounds entities wait
    Remote,
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub geometry: GeometryConfig,
    pub session: SessionMode,
    /// Disables all fluid checks when false
    pub fluid_enabled: bool,
    pub gravity: GravityScales,
    pub buoyancy: BuoyancyTuning,
    /// How deep plane switches propagate to riders
    pub max_rider_depth: u32,
    /// Default for newly tracked entities
    pub check_unstuck: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            geometry: GeometryConfig::default(),
            session: SessionMode::Local,
            fluid_enabled: true,
            gravity: GravityScales::default(),
            buoyancy: BuoyancyTuning::default(),
            max_rider_depth: 4,
            check_unstuck: true,
        }
    }
}

/// Tile and chunk dimensions plus the chunk range that makes up the world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// World units per tile (x, y)
    pub tile_size: (f32, f32),
    /// Tiles per chunk (width, height)
    pub chunk_tiles: (u32, u32),
    /// Inclusive chunk bounds
    pub min_chunk: (i32, i32),
    pub max_chunk: (i32, i32),
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            tile_size: (1.0, 1.0),
            chunk_tiles: (64, 64),
            min_chunk: (-8, -8),
            max_chunk: (7, 7),
        }
    }
}

/// Gravity multipliers per area state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GravityScales {
    pub none: f32,
    pub air: f32,
    pub fluid: f32,
}

impl Default for GravityScales {
    fn default() -> Self {
        Self {
            none: 0.0,
            air: 1.0,
            fluid: 0.2,
        }
    }
}

/// Water entry and floating behaviour
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuoyancyTuning {
    /// Downward speed above which entering fluid counts as a splash
    pub entry_speed: f32,
    /// Vertical velocity multiplier on splash
    pub entry_damping: f32,
    /// Splash impulse per unit of buoyancy and mass
    pub entry_impulse: f32,
    /// Upward speed under which the floating force is applied
    pub rest_speed: f32,
    /// Floating force per unit of buoyancy and mass
    pub rest_force: f32,
}

impl Default for BuoyancyTuning {
    fn default() -> Self {
        Self {
            entry_speed: 1.0,
            entry_damping: 0.25,
            entry_impulse: 2.0,
            rest_speed: 0.5,
            rest_force: 3.0,
        }
    }
}

impl EngineConfig {
    /// Parse a RON document and validate it
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            ron::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.geometry;
        if !(g.tile_size.0 > 0.0 && g.tile_size.1 > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "tile size must be positive, got {:?}",
                g.tile_size
            )));
        }
        if g.chunk_tiles.0 == 0 || g.chunk_tiles.1 == 0 {
            return Err(ConfigError::Invalid(format!(
                "chunks need at least one tile, got {:?}",
                g.chunk_tiles
            )));
        }
        if g.min_chunk.0 > g.max_chunk.0 || g.min_chunk.1 > g.max_chunk.1 {
            return Err(ConfigError::Invalid(format!(
                "chunk bounds are inverted: {:?} > {:?}",
                g.min_chunk, g.max_chunk
            )));
        }
        if self.gravity.air < 0.0 || self.gravity.fluid < 0.0 {
            return Err(ConfigError::Invalid("gravity scales must not be negative".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gravity.fluid, 0.2);
        assert_eq!(config.max_rider_depth, 4);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = EngineConfig::from_ron_str(
            "(session: Remote, geometry: (chunk_tiles: (16, 8)))",
        )
        .unwrap();
        assert_eq!(config.session, SessionMode::Remote);
        assert_eq!(config.geometry.chunk_tiles, (16, 8));
        assert_eq!(config.geometry.tile_size, (1.0, 1.0));
        assert!(config.fluid_enabled);
    }

    #[test]
    fn test_ron_round_trip() {
        let mut config = EngineConfig::default();
        config.fluid_enabled = false;
        config.buoyancy.rest_force = 5.0;
        let text = config.to_ron_string().unwrap();
        let parsed = EngineConfig::from_ron_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_rejects_invalid_geometry() {
        let err = EngineConfig::from_ron_str("(geometry: (chunk_tiles: (0, 4)))").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_ron_str("(geometry: (min_chunk: (2, 0), max_chunk: (1, 0)))")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_malformed_ron() {
        let err = EngineConfig::from_ron_str("(geometry: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
