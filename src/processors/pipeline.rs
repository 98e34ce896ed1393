//! Multi-tile event building.
//!
//! Tiles are classified in parallel, each with its own assigner, and each
//! persisted as its own table. A tile whose table already exists is reused; a
//! tile that fails is reported and left without a table so the next run
//! retries it. Stitching starts only after every tile has finished.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use regex::Regex;
use thiserror::Error;

use crate::config::{ClassificationConfig, PipelineConfig};
use crate::core::loaders::{
    burn_tile_exists, load_burn_tile, load_table_metadata, load_tile_table, tile_table_exists,
    LoaderError,
};
use crate::core::tables::{TableError, TileEventTable};
use crate::core::writers::{write_event_table, write_tile_table, WriteError};

use super::events::{build_tile_table, classify_grid};
use super::perimeters::PerimeterError;
use super::stitching::{StitchOutput, StitchSummary, TileStitcher};

/// Errors that fail a single tile without affecting the others.
#[derive(Debug, Error)]
pub enum TileError {
    #[error("failed to load tile: {0}")]
    Load(#[from] LoaderError),

    #[error("classification invariant violated: {0}")]
    Classify(#[from] PerimeterError),

    #[error("failed to build event table: {0}")]
    Table(#[from] TableError),

    #[error("failed to persist event table: {0}")]
    Write(#[from] WriteError),

    #[error("tile worker panicked: {0}")]
    Panicked(String),
}

/// What happened to one tile during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileStatus {
    /// Classified and persisted in this run
    Computed { events: usize, rows: usize },
    /// Table already on disk
    Cached,
    /// No burn input for the tile
    Missing,
    /// Classification failed; retried on the next run
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileOutcome {
    pub tile_id: String,
    pub status: TileStatus,
}

/// Result of a full build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub outcomes: Vec<TileOutcome>,
    pub stitch: StitchSummary,
    pub rows: usize,
    pub output: PathBuf,
}

impl BuildReport {
    fn count(&self, pred: impl Fn(&TileStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    pub fn computed(&self) -> usize {
        self.count(|s| matches!(s, TileStatus::Computed { .. }))
    }

    pub fn cached(&self) -> usize {
        self.count(|s| matches!(s, TileStatus::Cached))
    }

    pub fn missing(&self) -> usize {
        self.count(|s| matches!(s, TileStatus::Missing))
    }

    /// Tiles to retry, with their error messages.
    pub fn failed(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.status {
                TileStatus::Failed(msg) => Some((o.tile_id.as_str(), msg.as_str())),
                _ => None,
            })
            .collect()
    }
}

/// Tile ids among the `.yaml` manifests in `burn_dir` whose stem matches
/// `pattern`, sorted.
pub fn discover_tiles(burn_dir: &Path, pattern: &Regex) -> Vec<String> {
    let mut tiles: Vec<String> = fs::read_dir(burn_dir)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("yaml"))
                .unwrap_or(false)
        })
        .filter_map(|path| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
        })
        .filter(|stem| pattern.is_match(stem))
        .collect();

    tiles.sort();
    tiles.dedup();
    tiles
}

/// Tiles to process: the configured list, or every tile found on disk.
pub fn select_tiles(config: &PipelineConfig) -> Result<Vec<String>> {
    if !config.run.tiles.is_empty() {
        let mut tiles = config.run.tiles.clone();
        tiles.sort();
        tiles.dedup();
        return Ok(tiles);
    }
    let pattern = config.run.tile_regex()?;
    Ok(discover_tiles(&config.paths.burn_dir, &pattern))
}

/// Load, classify and persist one tile.
pub fn classify_tile(
    burn_dir: &Path,
    tables_dir: &Path,
    tile_id: &str,
    config: &ClassificationConfig,
) -> std::result::Result<TileEventTable, TileError> {
    let (manifest, grid) = load_burn_tile(burn_dir, tile_id)?;
    let perimeters = classify_grid(&grid, config)?;
    let table = build_tile_table(tile_id, &grid, &manifest.geometry, &perimeters, config)?;
    write_tile_table(tables_dir, &table)?;
    Ok(table)
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Whether `tile_id` has a persisted table built with `config`'s thresholds.
///
/// A table from other thresholds, or with an unreadable sidecar, counts as
/// absent so it gets recomputed.
pub fn table_is_current(tables_dir: &Path, tile_id: &str, config: &ClassificationConfig) -> bool {
    if !tile_table_exists(tables_dir, tile_id) {
        return false;
    }
    match load_table_metadata(tables_dir, tile_id) {
        Ok(metadata) if metadata.classification == *config => true,
        Ok(metadata) => {
            log::info!(
                "{}: table was built with spatial_param={}, temporal_param={}; stale",
                tile_id,
                metadata.classification.spatial_param,
                metadata.classification.temporal_param
            );
            false
        }
        Err(e) => {
            log::warn!("{}: unreadable table metadata, treating as stale: {}", tile_id, e);
            false
        }
    }
}

fn process_tile(config: &PipelineConfig, tile_id: &str) -> TileStatus {
    let paths = &config.paths;

    if table_is_current(&paths.tables_dir, tile_id, &config.classification) {
        log::info!("{}: event table exists, skipping", tile_id);
        return TileStatus::Cached;
    }
    if !burn_tile_exists(&paths.burn_dir, tile_id) {
        log::warn!("{}: no burn input in {}", tile_id, paths.burn_dir.display());
        return TileStatus::Missing;
    }

    log::info!("{}: classifying", tile_id);
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        classify_tile(
            &paths.burn_dir,
            &paths.tables_dir,
            tile_id,
            &config.classification,
        )
    }))
    .unwrap_or_else(|payload| Err(TileError::Panicked(panic_message(payload))));

    match result {
        Ok(table) => {
            let status = TileStatus::Computed {
                events: table.event_count(),
                rows: table.rows.len(),
            };
            log::info!("{}: {} events, {} rows", tile_id, table.event_count(), table.rows.len());
            status
        }
        Err(e) => {
            log::warn!("{}: failed, will retry on next run: {}", tile_id, e);
            TileStatus::Failed(e.to_string())
        }
    }
}

/// Classify every tile that does not have a table yet.
///
/// Tiles run concurrently on a rayon pool bounded by `run.workers`. One
/// tile failing never stops the others.
pub fn classify_tiles(config: &PipelineConfig, tiles: &[String]) -> Result<Vec<TileOutcome>> {
    config.validate()?;

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(workers) = config.run.workers {
        builder = builder.num_threads(workers);
    }
    let pool = builder.build().context("failed to start tile worker pool")?;

    let outcomes: Vec<TileOutcome> = pool.install(|| {
        tiles
            .par_iter()
            .map(|tile_id| TileOutcome {
                tile_id: tile_id.clone(),
                status: process_tile(config, tile_id),
            })
            .collect()
    });

    Ok(outcomes)
}

/// Load the persisted tables of `tiles` and stitch them.
///
/// Tiles without a table are left out with a warning.
pub fn stitch_tables(config: &PipelineConfig, tiles: &[String]) -> Result<StitchOutput> {
    config.validate()?;
    let tables_dir = &config.paths.tables_dir;

    let mut tables = Vec::with_capacity(tiles.len());
    for tile_id in tiles {
        if !tile_table_exists(tables_dir, tile_id) {
            log::warn!("{}: no event table, left out of stitching", tile_id);
            continue;
        }
        let table = load_tile_table(tables_dir, tile_id)
            .with_context(|| format!("failed to read event table for {}", tile_id))?;
        tables.push(table);
    }

    let stitcher = TileStitcher::new(config.classification);
    let output = stitcher.stitch(&tables)?;
    Ok(output)
}

/// Classify all selected tiles, then stitch and write the merged table.
pub fn build_events(config: &PipelineConfig) -> Result<BuildReport> {
    let tiles = select_tiles(config)?;
    log::info!("{} tiles selected", tiles.len());

    let outcomes = classify_tiles(config, &tiles)?;
    let failed = outcomes
        .iter()
        .filter(|o| matches!(o.status, TileStatus::Failed(_)))
        .count();
    if failed > 0 {
        log::warn!("{} tiles failed and are excluded from stitching", failed);
    }

    let stitched = stitch_tables(config, &tiles)?;
    let output = config.paths.output.clone();
    write_event_table(&output, &stitched.rows)
        .with_context(|| format!("failed to write {}", output.display()))?;
    log::info!("merged event table -> {}", output.display());

    Ok(BuildReport {
        outcomes,
        stitch: stitched.summary,
        rows: stitched.rows.len(),
        output,
    })
}
