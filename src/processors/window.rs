//! Clipped search windows around a grid cell.

/// A square neighbourhood clipped to the grid, never wrapped.
///
/// Rows `row_start..row_end` and columns `col_start..col_end` of the full grid.
/// Near tile borders the window is asymmetric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialWindow {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
    /// Position of the target cell inside the window as `(row, col)`
    pub center: (usize, usize),
}

impl SpatialWindow {
    /// Full-grid position of the window's top-left cell.
    #[inline]
    pub fn origin(&self) -> (usize, usize) {
        (self.row_start, self.col_start)
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.row_end - self.row_start
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.col_end - self.col_start
    }

    /// Translate a window-local position to full-grid coordinates.
    #[inline]
    pub fn to_grid(&self, local_row: usize, local_col: usize) -> (usize, usize) {
        (self.row_start + local_row, self.col_start + local_col)
    }

    /// Full-grid cells covered by the window in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.row_start..self.row_end)
            .flat_map(move |row| (self.col_start..self.col_end).map(move |col| (row, col)))
    }
}

/// Compute the window of half-width `radius` around `(row, col)` on a grid of
/// `dims = (ny, nx)`.
///
/// The unclipped window spans `row - radius ..= row + radius`; clipping keeps
/// it inside `[0, ny) x [0, nx)`.
pub fn locate_window(row: usize, col: usize, radius: usize, dims: (usize, usize)) -> SpatialWindow {
    let (ny, nx) = dims;
    debug_assert!(row < ny && col < nx, "cell ({row}, {col}) outside {ny} x {nx} grid");

    let row_start = row.saturating_sub(radius);
    let row_end = row.saturating_add(radius).saturating_add(1).min(ny);
    let col_start = col.saturating_sub(radius);
    let col_end = col.saturating_add(radius).saturating_add(1).min(nx);

    SpatialWindow {
        row_start,
        row_end,
        col_start,
        col_end,
        center: (row - row_start, col - col_start),
    }
}
