//! Row types for per-tile and merged event tables.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::grid::TileGeometry;
use crate::config::ClassificationConfig;

/// Errors raised while converting detections into table rows.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("burn day {0} cannot be represented as a calendar date")]
    InvalidDay(i32),
}

/// One pixel-day of a tile-local event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileEventRow {
    /// Tile-local event id
    pub id: u64,
    pub date: NaiveDate,
    pub x: f64,
    pub y: f64,
    /// Set on every row of an event that touches the tile border band
    pub edge: bool,
    pub tile: String,
}

/// Sidecar stored next to a tile's rows.
///
/// The thresholds are recorded so a table built under different ones is
/// never mistaken for a current result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub geometry: TileGeometry,
    pub classification: ClassificationConfig,
}

/// Everything a tile contributes to the stitching pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TileEventTable {
    pub tile_id: String,
    pub geometry: TileGeometry,
    /// Thresholds the rows were classified with
    pub classification: ClassificationConfig,
    pub rows: Vec<TileEventRow>,
}

impl TileEventTable {
    pub fn metadata(&self) -> TableMetadata {
        TableMetadata {
            geometry: self.geometry.clone(),
            classification: self.classification,
        }
    }

    /// Number of distinct local events in the table.
    pub fn event_count(&self) -> usize {
        let mut ids: Vec<u64> = self.rows.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}

/// One pixel-day of a stitched, chronologically numbered event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub id: u64,
    pub tile: String,
    pub date: NaiveDate,
    pub x: f64,
    pub y: f64,
}
