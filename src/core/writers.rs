//! Writers for per-tile and merged event tables.
//!
//! Every file is written to a temporary file in its destination directory and
//! renamed into place, so readers never see a partial table. A tile's
//! metadata sidecar is written before its rows; the rows file appearing is
//! what marks the tile as complete.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;

use super::loaders::tile_table_paths;
use super::tables::{EventRow, TileEventTable};

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create the temporary file next to the destination.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// YAML serialisation error.
    #[error("YAML write error for '{path}': {source}")]
    YamlError {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// Failed to move the finished file into place.
    #[error("failed to persist '{path}': {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a temporary file in the destination's directory.
fn create_staging_file(path: &Path) -> Result<NamedTempFile> {
    ensure_parent_dirs(path)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    NamedTempFile::new_in(&dir).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })
}

fn persist(staging: NamedTempFile, path: &Path) -> Result<()> {
    staging.persist(path).map_err(|e| WriteError::Persist {
        path: path.display().to_string(),
        source: e.error,
    })?;
    Ok(())
}

/// Serialise `rows` as CSV with a header and atomically move it to `path`.
fn write_csv_atomic<T: Serialize>(path: &Path, rows: &[T], header: &[&str]) -> Result<()> {
    let staging = create_staging_file(path)?;
    let path_str = path.display().to_string();

    {
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(staging.as_file()));

        csv_writer
            .write_record(header)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;

        for row in rows {
            csv_writer.serialize(row).map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
        }

        csv_writer.flush().map_err(|e| WriteError::WriteFile {
            path: path_str.clone(),
            source: e,
        })?;
    }

    staging.as_file().sync_all().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;
    persist(staging, path)
}

/// Serialise `value` as YAML and atomically move it to `path`.
fn write_yaml_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let staging = create_staging_file(path)?;
    let path_str = path.display().to_string();

    let content = serde_yaml::to_string(value).map_err(|e| WriteError::YamlError {
        path: path_str.clone(),
        source: e,
    })?;

    let mut writer = BufWriter::new(staging.as_file());
    writer
        .write_all(content.as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|e| WriteError::WriteFile {
            path: path_str,
            source: e,
        })?;
    drop(writer);

    persist(staging, path)
}

/// Persist one tile's event table.
///
/// Writes `<id>.yaml` (geometry and thresholds) then `<id>.csv` (rows) into
/// `tables_dir`.
/// The header is written even for a tile with no events.
///
/// # Returns
///
/// Path of the rows file.
pub fn write_tile_table(tables_dir: &Path, table: &TileEventTable) -> Result<PathBuf> {
    let (rows_path, metadata_path) = tile_table_paths(tables_dir, &table.tile_id);

    write_yaml_atomic(&metadata_path, &table.metadata())?;
    write_csv_atomic(&rows_path, &table.rows, &["id", "date", "x", "y", "edge", "tile"])?;

    Ok(rows_path)
}

/// Write the merged event table with columns `id,tile,date,x,y`.
pub fn write_event_table(path: &Path, rows: &[EventRow]) -> Result<()> {
    write_csv_atomic(path, rows, &["id", "tile", "date", "x", "y"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassificationConfig;
    use crate::core::grid::{day_to_date, TileGeometry};
    use crate::core::loaders::{load_tile_table, tile_table_exists};
    use crate::core::tables::TileEventRow;
    use tempfile::tempdir;

    fn create_test_table(rows: usize) -> TileEventTable {
        TileEventTable {
            tile_id: "h10v04".to_string(),
            geometry: TileGeometry {
                crs: "sinusoidal".to_string(),
                resolution: 463.3127,
                x_origin: -8895604.16,
                y_origin: 5559752.6,
                nx: 2400,
                ny: 2400,
            },
            classification: ClassificationConfig::new(5, 11),
            rows: (0..rows)
                .map(|i| TileEventRow {
                    id: i as u64 + 1,
                    date: day_to_date(17_000 + i as i32).unwrap(),
                    x: -8895372.5 + i as f64,
                    y: 5559521.0,
                    edge: i % 2 == 0,
                    tile: "h10v04".to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_write_tile_table_round_trips() {
        let dir = tempdir().unwrap();
        let table = create_test_table(3);

        let path = write_tile_table(dir.path(), &table).unwrap();

        assert_eq!(path, dir.path().join("h10v04.csv"));
        assert!(tile_table_exists(dir.path(), "h10v04"));
        let loaded = load_tile_table(dir.path(), "h10v04").unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_write_tile_table_header() {
        let dir = tempdir().unwrap();
        write_tile_table(dir.path(), &create_test_table(1)).unwrap();

        let content = fs::read_to_string(dir.path().join("h10v04.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "id,date,x,y,edge,tile");
        assert!(lines[1].starts_with("1,2016-07-18,"));
        assert!(lines[1].ends_with(",true,h10v04"));
    }

    #[test]
    fn test_write_empty_tile_table() {
        let dir = tempdir().unwrap();
        write_tile_table(dir.path(), &create_test_table(0)).unwrap();

        let content = fs::read_to_string(dir.path().join("h10v04.csv")).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(load_tile_table(dir.path(), "h10v04").unwrap().rows.is_empty());
    }

    #[test]
    fn test_write_creates_parent_dirs_and_leaves_no_staging_files() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("tables").join("events");

        write_tile_table(&nested, &create_test_table(2)).unwrap();

        let mut names: Vec<String> = fs::read_dir(&nested)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["h10v04.csv", "h10v04.yaml"]);
    }

    #[test]
    fn test_write_event_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("events.csv");
        let rows = vec![
            EventRow {
                id: 1,
                tile: "h10v04".to_string(),
                date: day_to_date(17_000).unwrap(),
                x: 1.5,
                y: -2.5,
            },
            EventRow {
                id: 2,
                tile: "h11v04".to_string(),
                date: day_to_date(17_004).unwrap(),
                x: 3.0,
                y: 4.0,
            },
        ];

        write_event_table(&path, &rows).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "id,tile,date,x,y");
        assert_eq!(lines[1], "1,h10v04,2016-07-18,1.5,-2.5");
        assert_eq!(lines.len(), 3);
    }
}
