//! Loaders for burn tiles and persisted event tables.
//!
//! A burn tile `<id>` lives in two files:
//! - `<id>.yaml`: a [`TileManifest`] with the layer count and georeferencing
//! - `<id>.csv`: sparse detections with columns `layer,row,col,day`
//!
//! A persisted event table `<id>` is `<id>.csv` (rows) plus `<id>.yaml`
//! (a [`TableMetadata`]: the tile's geometry and the thresholds used).

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::grid::{checked_grid_len, BurnGrid, GridError, TileGeometry};
use super::tables::{TableMetadata, TileEventRow, TileEventTable};

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("failed to open '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parsing error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("YAML parsing error in '{path}': {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("manifest '{path}' declares an unusable grid shape: {source}")]
    BadManifest {
        path: PathBuf,
        #[source]
        source: GridError,
    },

    #[error("invalid burn grid in '{path}': {source}")]
    Grid {
        path: PathBuf,
        #[source]
        source: GridError,
    },

    #[error("manifest '{path}' describes tile '{found}', expected '{expected}'")]
    TileMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Shape and georeferencing of one burn tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileManifest {
    pub tile_id: String,
    /// Number of time layers in the tile's series
    pub layers: usize,
    pub geometry: TileGeometry,
}

/// One sparse detection in a burn tile CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub layer: usize,
    pub row: usize,
    pub col: usize,
    pub day: i32,
}

/// `(manifest, detections)` paths of a burn tile.
pub fn burn_tile_paths(burn_dir: &Path, tile_id: &str) -> (PathBuf, PathBuf) {
    (
        burn_dir.join(format!("{tile_id}.yaml")),
        burn_dir.join(format!("{tile_id}.csv")),
    )
}

/// `(rows, metadata)` paths of a persisted event table.
pub fn tile_table_paths(tables_dir: &Path, tile_id: &str) -> (PathBuf, PathBuf) {
    (
        tables_dir.join(format!("{tile_id}.csv")),
        tables_dir.join(format!("{tile_id}.yaml")),
    )
}

/// Whether both input files of a burn tile are present.
pub fn burn_tile_exists(burn_dir: &Path, tile_id: &str) -> bool {
    let (manifest, detections) = burn_tile_paths(burn_dir, tile_id);
    manifest.is_file() && detections.is_file()
}

/// Whether a complete event table has already been persisted for a tile.
pub fn tile_table_exists(tables_dir: &Path, tile_id: &str) -> bool {
    let (rows, metadata) = tile_table_paths(tables_dir, tile_id);
    rows.is_file() && metadata.is_file()
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|e| LoaderError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(BufReader::new(file))
}

fn read_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    serde_yaml::from_reader(open(path)?).map_err(|e| LoaderError::Yaml {
        path: path.to_path_buf(),
        source: e,
    })
}

fn read_csv<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(open(path)?);

    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(|e| LoaderError::Csv {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Load a tile manifest.
pub fn load_manifest<P: AsRef<Path>>(path: P) -> Result<TileManifest> {
    read_yaml(path.as_ref())
}

/// Load a burn tile into a dense [`BurnGrid`].
///
/// # Errors
///
/// Fails if either file is missing or malformed, if the manifest names a
/// different tile, or if a detection falls outside the declared grid.
pub fn load_burn_tile(burn_dir: &Path, tile_id: &str) -> Result<(TileManifest, BurnGrid)> {
    let (manifest_path, detections_path) = burn_tile_paths(burn_dir, tile_id);

    let manifest = load_manifest(&manifest_path)?;
    if manifest.tile_id != tile_id {
        return Err(LoaderError::TileMismatch {
            path: manifest_path,
            expected: tile_id.to_string(),
            found: manifest.tile_id,
        });
    }
    let geometry = &manifest.geometry;
    checked_grid_len(manifest.layers, geometry.ny, geometry.nx).map_err(|e| {
        LoaderError::BadManifest {
            path: manifest_path.clone(),
            source: e,
        }
    })?;

    let records: Vec<DetectionRecord> = read_csv(&detections_path)?;
    let detections: Vec<(usize, usize, usize, i32)> = records
        .iter()
        .map(|r| (r.layer, r.row, r.col, r.day))
        .collect();

    let grid = BurnGrid::from_detections(manifest.layers, &manifest.geometry, &detections)
        .map_err(|e| LoaderError::Grid {
            path: detections_path.clone(),
            source: e,
        })?;

    log::debug!(
        "{}: {} detections over {} layers of {}x{}",
        tile_id,
        records.len(),
        manifest.layers,
        manifest.geometry.ny,
        manifest.geometry.nx
    );

    Ok((manifest, grid))
}

/// Load only the sidecar of a persisted table.
pub fn load_table_metadata(tables_dir: &Path, tile_id: &str) -> Result<TableMetadata> {
    let (_, metadata_path) = tile_table_paths(tables_dir, tile_id);
    read_yaml(&metadata_path)
}

/// Load a persisted per-tile event table.
pub fn load_tile_table(tables_dir: &Path, tile_id: &str) -> Result<TileEventTable> {
    let (rows_path, _) = tile_table_paths(tables_dir, tile_id);
    let metadata = load_table_metadata(tables_dir, tile_id)?;
    let rows: Vec<TileEventRow> = read_csv(&rows_path)?;

    Ok(TileEventTable {
        tile_id: tile_id.to_string(),
        geometry: metadata.geometry,
        classification: metadata.classification,
        rows,
    })
}
