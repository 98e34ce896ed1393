//! Core data types and I/O operations.

pub mod grid;
pub mod loaders;
pub mod tables;
pub mod writers;

pub use grid::{BurnGrid, Point, TileGeometry};
pub use loaders::{load_burn_tile, load_tile_table, LoaderError, TileManifest};
pub use tables::{EventRow, TileEventRow, TileEventTable};
pub use writers::{write_event_table, write_tile_table, WriteError};
