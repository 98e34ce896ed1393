//! Event classification and reconciliation.

pub mod active_cells;
pub mod events;
pub mod perimeters;
pub mod pipeline;
pub mod stitching;
pub mod window;

// Re-export key types for convenience
pub use active_cells::active_cells;
pub use events::{build_tile_table, classify_grid, EventAssigner};
pub use perimeters::{EventGridMap, EventId, EventPerimeter, PerimeterError, PerimeterStore};
pub use pipeline::{
    build_events, classify_tile, classify_tiles, discover_tiles, select_tiles, stitch_tables,
    BuildReport, TileError, TileOutcome, TileStatus,
};
pub use stitching::{StitchError, StitchOutput, StitchSummary, TileStitcher};
pub use window::{locate_window, SpatialWindow};
