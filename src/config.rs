//! Engine configuration
//!
//! Passed explicitly to the solver and the view builder. Persisted as JSON;
//! missing fields take their defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts;

/// How simultaneous crossings within one sub-step are ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TieBreak {
    /// First pair found while scanning movables then portals
    #[default]
    DiscoveryOrder,
    /// Lowest node id, then lowest portal id
    StableId,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read or write config: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Solver and view tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How far past a portal line things are placed and clipped
    pub min_entry_distance: f32,
    /// Closest a node may rest to a portal after a step
    pub entity_min_distance: f32,
    /// Levels of nested portal views
    pub max_view_depth: u32,
    /// Crossings resolved per step before the rest of the motion is dropped
    pub max_sub_steps: u32,
    /// Sub-steps for bulk mode
    pub bulk_iterations: u32,
    pub tie_break: TieBreak,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_entry_distance: consts::MIN_ENTRY_DISTANCE,
            entity_min_distance: consts::MIN_ENTRY_DISTANCE * 2.0,
            max_view_depth: consts::MAX_VIEW_DEPTH,
            max_sub_steps: consts::MAX_SUB_STEPS,
            bulk_iterations: consts::BULK_ITERATIONS,
            tie_break: TieBreak::DiscoveryOrder,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.to_json()?)?;
        log::info!("Config saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Load from `path`, falling back to defaults if it is missing or bad
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::info!("Using default config ({e})");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_entry_distance.is_finite() && self.min_entry_distance > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "min_entry_distance must be positive, got {}",
                self.min_entry_distance
            )));
        }
        if !(self.entity_min_distance.is_finite() && self.entity_min_distance >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "entity_min_distance must be non-negative, got {}",
                self.entity_min_distance
            )));
        }
        if self.max_sub_steps == 0 {
            return Err(ConfigError::Invalid("max_sub_steps must be at least 1".into()));
        }
        if self.bulk_iterations == 0 {
            return Err(ConfigError::Invalid("bulk_iterations must be at least 1".into()));
        }
        Ok(())
    }
}
