//! Selection of grid cells that burned at least once.

use crate::core::grid::BurnGrid;

/// Cells whose maximum value over all layers is positive, in row-major
/// order (row ascending, then column ascending).
///
/// The order is part of the contract: event ids are handed out in the order
/// cells are visited.
pub fn active_cells(grid: &BurnGrid) -> Vec<(usize, usize)> {
    let (ny, nx) = grid.dims();
    let mut cells = Vec::new();

    for row in 0..ny {
        for col in 0..nx {
            let max = grid.series(row, col).max().unwrap_or(0);
            if max > 0 {
                cells.push((row, col));
            }
        }
    }

    cells
}
