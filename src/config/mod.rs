//! Configuration types for the burn event pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default spatial search radius, in grid cells.
pub const DEFAULT_SPATIAL_PARAM: usize = 5;

/// Default temporal search radius, in days.
pub const DEFAULT_TEMPORAL_PARAM: u32 = 11;

/// Errors raised when a configuration cannot be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("spatial_param must be at least 1 cell, got {0}")]
    InvalidSpatialParam(usize),

    #[error("invalid tile pattern '{pattern}': {source}")]
    InvalidTilePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("workers must be at least 1 when set")]
    InvalidWorkers,
}

/// Space-time thresholds used to group detections into events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Half-width of the square search window, in grid cells
    #[serde(default = "default_spatial_param")]
    pub spatial_param: usize,

    /// Maximum absolute difference between burn days, in days
    #[serde(default = "default_temporal_param")]
    pub temporal_param: u32,
}

fn default_spatial_param() -> usize {
    DEFAULT_SPATIAL_PARAM
}

fn default_temporal_param() -> u32 {
    DEFAULT_TEMPORAL_PARAM
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            spatial_param: default_spatial_param(),
            temporal_param: default_temporal_param(),
        }
    }
}

impl ClassificationConfig {
    pub fn new(spatial_param: usize, temporal_param: u32) -> Self {
        Self {
            spatial_param,
            temporal_param,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spatial_param == 0 {
            return Err(ConfigError::InvalidSpatialParam(self.spatial_param));
        }
        Ok(())
    }

    /// Cross-tile adjacency distance in map units for a given pixel size.
    #[inline]
    pub fn spatial_buffer(&self, resolution: f64) -> f64 {
        self.spatial_param as f64 * resolution
    }
}

/// Input and output locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding `<tile>.yaml` manifests and `<tile>.csv` detections
    #[serde(default = "default_burn_dir")]
    pub burn_dir: PathBuf,

    /// Directory for per-tile event tables
    #[serde(default = "default_tables_dir")]
    pub tables_dir: PathBuf,

    /// Merged event table
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

fn default_burn_dir() -> PathBuf {
    PathBuf::from("rasters/burn_area")
}

fn default_tables_dir() -> PathBuf {
    PathBuf::from("tables/events")
}

fn default_output() -> PathBuf {
    PathBuf::from("tables/fired_events.csv")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            burn_dir: default_burn_dir(),
            tables_dir: default_tables_dir(),
            output: default_output(),
        }
    }
}

/// Tile selection and parallelism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Tiles to process; empty means every tile found in `burn_dir`
    #[serde(default)]
    pub tiles: Vec<String>,

    /// Number of tiles classified concurrently (rayon default when unset)
    #[serde(default)]
    pub workers: Option<usize>,

    /// Regex matched against file stems when discovering tiles
    #[serde(default = "default_tile_pattern")]
    pub tile_pattern: String,
}

fn default_tile_pattern() -> String {
    r"^h\d{2}v\d{2}$".to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tiles: Vec::new(),
            workers: None,
            tile_pattern: default_tile_pattern(),
        }
    }
}

impl RunConfig {
    pub fn tile_regex(&self) -> Result<regex::Regex, ConfigError> {
        regex::Regex::new(&self.tile_pattern).map_err(|e| ConfigError::InvalidTilePattern {
            pattern: self.tile_pattern.clone(),
            source: e,
        })
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub classification: ClassificationConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub run: RunConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check every section before a run starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.classification.validate()?;
        self.run.tile_regex()?;
        if self.run.workers == Some(0) {
            return Err(ConfigError::InvalidWorkers);
        }
        Ok(())
    }
}
