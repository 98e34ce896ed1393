//! Single-tile event classification.
//!
//! Active cells are visited in row-major order. For every burn day at a cell,
//! the clipped window around it is searched for detections within
//! `temporal_param` days; those candidates either start a new event, extend
//! the single event they already belong to, or fuse every event they touch.
//!
//! # Determinism
//!
//! Ids depend only on visiting order: cells row-major, detections at a cell in
//! layer order, window candidates layer-major then row then column. When
//! several events meet, the first one discovered in that order survives.

use crate::config::ClassificationConfig;
use crate::core::grid::{day_to_date, BurnGrid, Point, TileGeometry};
use crate::core::tables::{TableError, TileEventRow, TileEventTable};

use super::active_cells::active_cells;
use super::perimeters::{EventGridMap, EventId, PerimeterError, PerimeterStore};
use super::window::{locate_window, SpatialWindow};

/// Incremental space-time clustering state for one tile.
///
/// Each tile owns its own assigner; nothing is shared between tiles.
pub struct EventAssigner<'a> {
    grid: &'a BurnGrid,
    config: ClassificationConfig,
    perimeters: PerimeterStore,
    grid_map: EventGridMap,
    next_id: EventId,
}

impl<'a> EventAssigner<'a> {
    pub fn new(grid: &'a BurnGrid, config: ClassificationConfig) -> Self {
        Self {
            grid,
            config,
            perimeters: PerimeterStore::new(),
            grid_map: EventGridMap::new(),
            next_id: 1,
        }
    }

    /// Classify every active cell of the grid.
    pub fn run(mut self) -> Result<PerimeterStore, PerimeterError> {
        let cells = active_cells(self.grid);
        log::debug!("{} active cells", cells.len());

        for (row, col) in cells {
            self.process_cell(row, col)?;
        }

        log::debug!(
            "{} perimeters created, {} live",
            self.perimeters.len(),
            self.perimeters.active().count()
        );
        Ok(self.perimeters)
    }

    /// Assign every detection at `(row, col)`.
    pub fn process_cell(&mut self, row: usize, col: usize) -> Result<(), PerimeterError> {
        let window = locate_window(row, col, self.config.spatial_param, self.grid.dims());
        let (center_row, center_col) = window.to_grid(window.center.0, window.center.1);

        let detections: Vec<i32> = self
            .grid
            .series(center_row, center_col)
            .filter(|&day| day > 0)
            .collect();
        if detections.is_empty() {
            return Ok(());
        }

        // One pass over the window serves every detection at this cell
        let window_points = self.window_points(&window);

        for burn in detections {
            let candidates: Vec<Point> = window_points
                .iter()
                .filter(|p| p.day.abs_diff(burn) <= self.config.temporal_param)
                .copied()
                .collect();
            self.assign(candidates)?;
        }

        Ok(())
    }

    /// Positive cells of the window, layer-major then row-major.
    fn window_points(&self, window: &SpatialWindow) -> Vec<Point> {
        let mut points = Vec::with_capacity(window.height() * window.width());
        for layer in 0..self.grid.layers() {
            for (row, col) in window.cells() {
                let day = self.grid.value(layer, row, col);
                if day > 0 {
                    points.push(Point::new(row, col, day));
                }
            }
        }
        points
    }

    fn assign(&mut self, candidates: Vec<Point>) -> Result<(), PerimeterError> {
        let mut touched: Vec<EventId> = Vec::new();
        let mut new_points: Vec<Point> = Vec::new();

        for point in candidates {
            match self.grid_map.get(&point) {
                Some(id) => {
                    if !touched.contains(&id) {
                        touched.push(id);
                    }
                }
                None => new_points.push(point),
            }
        }

        match touched.as_slice() {
            [] => {
                let id = self.next_id;
                self.grid_map.assign(id, &new_points);
                self.perimeters.create(id, new_points)?;
                self.next_id += 1;
            }
            [id] => {
                if !new_points.is_empty() {
                    self.perimeters.add_points(*id, &new_points)?;
                    self.grid_map.assign(*id, &new_points);
                }
            }
            [survivor, others @ ..] => {
                for &obsolete in others {
                    log::trace!("merging event {} into {}", obsolete, survivor);
                    self.perimeters
                        .merge(*survivor, obsolete, &mut self.grid_map)?;
                    debug_assert_eq!(self.perimeters.resolve(obsolete), Some(*survivor));
                }
                if !new_points.is_empty() {
                    self.perimeters.add_points(*survivor, &new_points)?;
                    self.grid_map.assign(*survivor, &new_points);
                }
            }
        }

        Ok(())
    }

    #[inline]
    pub fn perimeters(&self) -> &PerimeterStore {
        &self.perimeters
    }

    #[inline]
    pub fn grid_map(&self) -> &EventGridMap {
        &self.grid_map
    }

    /// Id the next new event will receive.
    #[inline]
    pub fn next_id(&self) -> EventId {
        self.next_id
    }
}

/// Classify a whole grid into event perimeters.
pub fn classify_grid(
    grid: &BurnGrid,
    config: &ClassificationConfig,
) -> Result<PerimeterStore, PerimeterError> {
    EventAssigner::new(grid, *config).run()
}

/// Whether a cell lies within `band` cells of any tile border.
#[inline]
fn in_edge_band(row: usize, col: usize, band: usize, dims: (usize, usize)) -> bool {
    let (ny, nx) = dims;
    row < band || row >= ny.saturating_sub(band) || col < band || col >= nx.saturating_sub(band)
}

/// Flatten live perimeters into table rows.
///
/// An event with any point in the border band is flagged edge on every row.
pub fn build_tile_table(
    tile_id: &str,
    grid: &BurnGrid,
    geometry: &TileGeometry,
    perimeters: &PerimeterStore,
    config: &ClassificationConfig,
) -> Result<TileEventTable, TableError> {
    let dims = grid.dims();
    let mut rows = Vec::new();

    for perimeter in perimeters.active() {
        let points = perimeter.points().unwrap_or_default();
        let edge = points
            .iter()
            .any(|p| in_edge_band(p.row, p.col, config.spatial_param, dims));

        for point in points {
            let date = day_to_date(point.day).ok_or(TableError::InvalidDay(point.day))?;
            let (y, x) = grid.coords_of(point);
            rows.push(TileEventRow {
                id: perimeter.id(),
                date,
                x,
                y,
                edge,
                tile: tile_id.to_string(),
            });
        }
    }

    Ok(TileEventTable {
        tile_id: tile_id.to_string(),
        geometry: geometry.clone(),
        classification: *config,
        rows,
    })
}
