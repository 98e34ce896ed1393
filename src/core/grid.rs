//! Burn grid data model.
//!
//! A tile is a dense `[layer, row, col]` array of burn days. A value of zero or
//! less means no detection; a positive value is a day index counted from
//! 1970-01-01.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building a grid.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("grid data has {found} values, expected {layers} x {ny} x {nx} = {expected}")]
    ShapeMismatch {
        layers: usize,
        ny: usize,
        nx: usize,
        expected: usize,
        found: usize,
    },

    #[error("a {layers} x {ny} x {nx} grid exceeds the {max} value limit")]
    ShapeOverflow {
        layers: usize,
        ny: usize,
        nx: usize,
        max: usize,
    },

    #[error("cannot allocate {len} grid values: {source}")]
    Allocation {
        len: usize,
        #[source]
        source: std::collections::TryReserveError,
    },

    #[error("{axis} coordinate vector has {found} values, expected {expected}")]
    CoordinateMismatch {
        axis: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("detection at layer {layer}, row {row}, col {col} is outside a {layers} x {ny} x {nx} grid")]
    OutOfBounds {
        layer: usize,
        row: usize,
        col: usize,
        layers: usize,
        ny: usize,
        nx: usize,
    },
}

/// Largest number of values a grid may hold, counting every layer and
/// treating empty axes as length one.
pub const MAX_GRID_VALUES: usize = 1 << 32;

/// Number of values in a `layers x ny x nx` grid, refusing shapes that
/// overflow or exceed [`MAX_GRID_VALUES`].
pub fn checked_grid_len(layers: usize, ny: usize, nx: usize) -> Result<usize, GridError> {
    let overflow = || GridError::ShapeOverflow {
        layers,
        ny,
        nx,
        max: MAX_GRID_VALUES,
    };
    let bound = layers
        .max(1)
        .checked_mul(ny.max(1))
        .and_then(|v| v.checked_mul(nx.max(1)))
        .ok_or_else(overflow)?;
    if bound > MAX_GRID_VALUES {
        return Err(overflow());
    }
    Ok(layers * ny * nx)
}

/// `len` copies of `value`, failing instead of aborting when memory runs out.
fn try_filled<T: Clone>(len: usize, value: T) -> Result<Vec<T>, GridError> {
    let mut out = Vec::new();
    out.try_reserve_exact(len)
        .map_err(|source| GridError::Allocation { len, source })?;
    out.resize(len, value);
    Ok(out)
}

/// The epoch burn day indices are counted from.
#[inline]
pub fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Convert a day index into a calendar date.
pub fn day_to_date(day: i32) -> Option<NaiveDate> {
    if day >= 0 {
        epoch().checked_add_days(Days::new(day as u64))
    } else {
        epoch().checked_sub_days(Days::new(day.unsigned_abs() as u64))
    }
}

/// Convert a calendar date back into a day index.
#[inline]
pub fn date_to_day(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

/// A single burn detection addressed by grid position and burn day.
///
/// Within a tile `(row, col)` maps one-to-one onto the real `(y, x)`
/// coordinates, so this is the key used for event membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Point {
    pub row: usize,
    pub col: usize,
    pub day: i32,
}

impl Point {
    #[inline]
    pub fn new(row: usize, col: usize, day: i32) -> Self {
        Self { row, col, day }
    }
}

/// Georeferencing of a tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileGeometry {
    /// Coordinate reference system identifier or WKT
    pub crs: String,
    /// Pixel size in map units
    pub resolution: f64,
    /// Map x of the left edge of column 0
    pub x_origin: f64,
    /// Map y of the top edge of row 0
    pub y_origin: f64,
    pub nx: usize,
    pub ny: usize,
}

impl TileGeometry {
    /// Pixel-centre y of `row`; rows run top to bottom.
    #[inline]
    pub fn y_centre(&self, row: usize) -> f64 {
        self.y_origin - (row as f64 + 0.5) * self.resolution
    }

    #[inline]
    pub fn x_centre(&self, col: usize) -> f64 {
        self.x_origin + (col as f64 + 0.5) * self.resolution
    }
}

/// Immutable time series of burn days for one tile.
#[derive(Debug, Clone)]
pub struct BurnGrid {
    layers: usize,
    ny: usize,
    nx: usize,
    data: Vec<i32>,
    y_coords: Vec<f64>,
    x_coords: Vec<f64>,
}

impl BurnGrid {
    /// Build a grid from dense layer-major data.
    pub fn new(
        layers: usize,
        ny: usize,
        nx: usize,
        data: Vec<i32>,
        y_coords: Vec<f64>,
        x_coords: Vec<f64>,
    ) -> Result<Self, GridError> {
        let expected = checked_grid_len(layers, ny, nx)?;
        if data.len() != expected {
            return Err(GridError::ShapeMismatch {
                layers,
                ny,
                nx,
                expected,
                found: data.len(),
            });
        }
        if y_coords.len() != ny {
            return Err(GridError::CoordinateMismatch {
                axis: "y",
                expected: ny,
                found: y_coords.len(),
            });
        }
        if x_coords.len() != nx {
            return Err(GridError::CoordinateMismatch {
                axis: "x",
                expected: nx,
                found: x_coords.len(),
            });
        }
        Ok(Self {
            layers,
            ny,
            nx,
            data,
            y_coords,
            x_coords,
        })
    }

    /// Build a grid from sparse `(layer, row, col, day)` detections.
    pub fn from_detections(
        layers: usize,
        geometry: &TileGeometry,
        detections: &[(usize, usize, usize, i32)],
    ) -> Result<Self, GridError> {
        let (ny, nx) = (geometry.ny, geometry.nx);
        let mut data = try_filled(checked_grid_len(layers, ny, nx)?, 0i32)?;
        for &(layer, row, col, day) in detections {
            if layer >= layers || row >= ny || col >= nx {
                return Err(GridError::OutOfBounds {
                    layer,
                    row,
                    col,
                    layers,
                    ny,
                    nx,
                });
            }
            data[(layer * ny + row) * nx + col] = day;
        }
        let mut y_coords = try_filled(ny, 0.0)?;
        for (row, y) in y_coords.iter_mut().enumerate() {
            *y = geometry.y_centre(row);
        }
        let mut x_coords = try_filled(nx, 0.0)?;
        for (col, x) in x_coords.iter_mut().enumerate() {
            *x = geometry.x_centre(col);
        }
        Self::new(layers, ny, nx, data, y_coords, x_coords)
    }

    #[inline]
    pub fn layers(&self) -> usize {
        self.layers
    }

    /// Spatial dimensions as `(ny, nx)`.
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.ny, self.nx)
    }

    #[inline]
    pub fn value(&self, layer: usize, row: usize, col: usize) -> i32 {
        self.data[(layer * self.ny + row) * self.nx + col]
    }

    /// All layer values at one cell, in time order.
    pub fn series(&self, row: usize, col: usize) -> impl Iterator<Item = i32> + '_ {
        (0..self.layers).map(move |layer| self.value(layer, row, col))
    }

    #[inline]
    pub fn y_coords(&self) -> &[f64] {
        &self.y_coords
    }

    #[inline]
    pub fn x_coords(&self) -> &[f64] {
        &self.x_coords
    }

    /// Real `(y, x)` coordinates of a point.
    #[inline]
    pub fn coords_of(&self, point: &Point) -> (f64, f64) {
        (self.y_coords[point.row], self.x_coords[point.col])
    }
}
