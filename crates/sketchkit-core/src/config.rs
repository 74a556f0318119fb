//! Engine configuration.

use crate::error::{EngineError, EngineResult};
use crate::group_transform::GROUP_ROTATION_INCREMENT;
use crate::hit_test::HitTolerance;
use crate::snap::{GridSettings, SNAP_THRESHOLD, SnapMode};
use crate::spatial::SpatialIndexConfig;
use crate::transform::{HandleMetrics, MIN_ELEMENT_SIZE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Tunables for indexing, hit-testing, snapping and transforms.
///
/// Pixel values are screen-space and are divided by the zoom before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub spatial: SpatialIndexConfig,
    pub grid: GridSettings,
    pub snap_mode: SnapMode,
    /// Object snap threshold in world units.
    pub snap_threshold: f64,
    /// Smallest width/height a resize may produce.
    pub min_element_size: f64,
    pub handles: HandleMetrics,
    pub hit_tolerance: HitTolerance,
    /// Group rotation increment in radians (0 disables snapping).
    pub rotation_increment: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            spatial: SpatialIndexConfig::default(),
            grid: GridSettings::default(),
            snap_mode: SnapMode::default(),
            snap_threshold: SNAP_THRESHOLD,
            min_element_size: MIN_ELEMENT_SIZE,
            handles: HandleMetrics::default(),
            hit_tolerance: HitTolerance::default(),
            rotation_increment: GROUP_ROTATION_INCREMENT,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Load a configuration file, falling back to defaults when it is missing or invalid.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Using default engine config ({}): {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Reject non-positive sizes and negative thresholds.
    pub fn validate(&self) -> EngineResult<()> {
        let positive = [
            ("spatial.max_elements", self.spatial.max_elements as f64),
            ("grid.size", self.grid.size),
            ("min_element_size", self.min_element_size),
            ("handles.hit_tolerance", self.handles.hit_tolerance),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        let non_negative = [
            ("grid.snap_distance", self.grid.snap_distance),
            ("snap_threshold", self.snap_threshold),
            ("handles.rotation_offset", self.handles.rotation_offset),
            ("hit_tolerance.line", self.hit_tolerance.line),
            ("hit_tolerance.pen", self.hit_tolerance.pen),
            ("rotation_increment", self.rotation_increment),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must not be negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}
