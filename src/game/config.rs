//! Engine configuration.
//!
//! Defaults reproduce the classic layout. Players can override any field by
//! dropping a JSON file in the user's config directory; missing fields keep
//! their defaults.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::{cluster::FLOATER_BONUS, hex::HexLayout};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunable parameters of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rows: usize,
    pub cols: usize,
    /// Bubble radius in pixels.
    pub bubble_radius: f32,
    /// Gap added to the radius when spacing cells.
    pub cell_margin: f32,
    pub top_offset: f32,
    pub left_offset: f32,
    /// Projectile speed in pixels per second.
    pub projectile_speed: f32,
    /// Rows filled when a game starts.
    pub starting_rows: usize,
    /// Delay between two pops of a cascade.
    pub pop_interval_ms: u64,
    /// Misses allowed before the first row injection.
    pub max_shot_threshold: u32,
    /// The allowance never drops below this.
    pub min_shot_threshold: u32,
    /// Points per floating bubble dropped right after a match.
    pub floater_bonus: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rows: 15,
            cols: 17,
            bubble_radius: 15.0,
            cell_margin: 3.0,
            top_offset: 50.0,
            left_offset: 50.0,
            projectile_speed: 500.0,
            starting_rows: 11,
            pop_interval_ms: 60,
            max_shot_threshold: 6,
            min_shot_threshold: 2,
            floater_bonus: FLOATER_BONUS,
        }
    }
}

impl EngineConfig {
    pub fn pop_interval(&self) -> Duration {
        Duration::from_millis(self.pop_interval_ms)
    }

    /// The grid geometry these settings describe.
    pub fn layout(&self) -> HexLayout {
        HexLayout::new(
            self.rows,
            self.cols,
            self.bubble_radius,
            self.cell_margin,
            Vec2::new(self.left_offset, self.top_offset),
        )
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.rows < 2 {
            return invalid("grid needs at least two rows");
        }
        if self.cols == 0 {
            return invalid("grid needs at least one column");
        }
        if self.bubble_radius <= 2.0 {
            return invalid("bubble_radius must be greater than 2");
        }
        if self.cell_margin < 0.0 {
            return invalid("cell_margin cannot be negative");
        }
        if self.projectile_speed <= 0.0 {
            return invalid("projectile_speed must be positive");
        }
        if self.starting_rows > self.rows {
            return invalid("starting_rows exceeds rows");
        }
        if self.min_shot_threshold == 0 {
            return invalid("min_shot_threshold must be at least 1");
        }
        if self.min_shot_threshold > self.max_shot_threshold {
            return invalid("min_shot_threshold exceeds max_shot_threshold");
        }
        Ok(())
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a config file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Get the file path for the user's config overrides.
    pub fn file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hexpop").join("engine.json"))
    }

    /// Load the user's config, falling back to defaults on any problem.
    pub fn load() -> Self {
        let Some(path) = Self::file_path() else {
            warn!("Could not determine config directory, using default engine config");
            return Self::default();
        };

        if !path.exists() {
            info!("No engine config at {:?}, using defaults", path);
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => {
                info!("Loaded engine config from {:?}", path);
                config
            }
            Err(e) => {
                warn!("Failed to load engine config: {}", e);
                Self::default()
            }
        }
    }
}
