//! Wildfire event building from gridded burn-date rasters.
//!
//! This crate provides tools for:
//! - Loading burn tiles (a stack of day-of-burn layers over one grid)
//! - Grouping burned cells into fire events by space-time proximity
//! - Persisting per-tile event tables and reusing them across runs
//! - Stitching events that cross tile seams into one global table
//!
//! # Example
//!
//! ```no_run
//! use burn_events::{core::loaders::load_burn_tile, processors::classify_grid, ClassificationConfig};
//! use std::path::Path;
//!
//! let (_, grid) = load_burn_tile(Path::new("rasters/burn_area"), "h08v05").unwrap();
//! let events = classify_grid(&grid, &ClassificationConfig::new(5, 11)).unwrap();
//! println!("{} events", events.active().count());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{ClassificationConfig, PathsConfig, PipelineConfig, RunConfig};
pub use core::grid::{BurnGrid, Point, TileGeometry};
pub use processors::{EventAssigner, PerimeterStore, TileStitcher};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
