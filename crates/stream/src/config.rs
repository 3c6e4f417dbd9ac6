use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use terrascope_geo::{Lod, MAX_ZOOM};

/// Largest accepted `ring_limit`. A tick walks a square of `(2n + 1)^2` tiles.
pub const MAX_RING_LIMIT: u32 = 64;

/// Errors from loading or validating a [`StreamConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid stream config: {0}")]
    Invalid(String),
}

/// Streaming configuration: candidate neighbourhood, distance cutoffs and LOD tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Zoom level at which tiles are addressed.
    pub reference_zoom: u8,
    /// Number of rings around the center tile considered as candidates.
    pub ring_limit: u32,
    /// Tiles farther than this (meters) from the camera target are not wanted.
    pub scene_radius: f64,
    /// Tiles and camera both within this distance (meters) get the detailed tier.
    pub high_detail_radius: f64,
    /// Tier requested for every wanted tile outside the high-detail radius.
    pub base_lod: Lod,
    /// Tier requested near a close camera.
    pub detailed_lod: Lod,
    /// Interval between scheduler ticks, in milliseconds.
    pub tick_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reference_zoom: 15,
            ring_limit: 10,
            scene_radius: 5_000.0,
            high_detail_radius: 1_000.0,
            base_lod: Lod(1),
            detailed_lod: Lod(3),
            tick_interval_ms: 1_000,
        }
    }
}

impl StreamConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        let config: Self = serde_json::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reference_zoom > MAX_ZOOM {
            return Err(ConfigError::Invalid(format!(
                "reference_zoom {} exceeds {MAX_ZOOM}",
                self.reference_zoom
            )));
        }
        if self.ring_limit > MAX_RING_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "ring_limit {} exceeds {MAX_RING_LIMIT}",
                self.ring_limit
            )));
        }
        if !(self.scene_radius.is_finite() && self.scene_radius > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "scene_radius must be positive, got {}",
                self.scene_radius
            )));
        }
        if !(self.high_detail_radius.is_finite() && self.high_detail_radius >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "high_detail_radius must not be negative, got {}",
                self.high_detail_radius
            )));
        }
        if self.detailed_lod <= self.base_lod {
            return Err(ConfigError::Invalid(format!(
                "detailed_lod {} must be above base_lod {}",
                self.detailed_lod, self.base_lod
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be positive".into()));
        }
        Ok(())
    }
}
