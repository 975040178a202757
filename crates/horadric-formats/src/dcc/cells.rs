//! Cell decomposition
//!
//! A direction's bounding box is cut into a grid of 4x4 cells anchored at its
//! top-left corner. Each frame is decoded cell by cell over the grid cells
//! its box touches, with the cells clipped to the frame.

use super::direction::Bounds;

/// Nominal cell edge length in pixels
pub const CELL_SIZE: i32 = 4;

/// One cell of a frame, in direction coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// Index of the grid cell, row-major
    pub grid_index: usize,
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width after clipping
    pub width: u32,
    /// Height after clipping
    pub height: u32,
}

impl Cell {
    /// Number of pixels in the clipped cell
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Grid of cells over a direction's bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellGrid {
    origin_x: i32,
    origin_y: i32,
    columns: usize,
    rows: usize,
}

impl CellGrid {
    /// Grid covering `bounds`
    pub fn new(bounds: &Bounds) -> Self {
        Self {
            origin_x: bounds.min_x,
            origin_y: bounds.min_y,
            columns: bounds.width().div_ceil(CELL_SIZE as u32) as usize,
            rows: bounds.height().div_ceil(CELL_SIZE as u32) as usize,
        }
    }

    /// Cells across
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Cells down
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of grid cells
    pub fn len(&self) -> usize {
        self.columns * self.rows
    }

    /// Whether the grid has no cells
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cells of a frame box, row-major, clipped to the box
    ///
    /// `frame` must lie inside the grid's bounds.
    pub fn frame_cells(&self, frame: &Bounds) -> Vec<Cell> {
        if frame.is_empty() {
            return Vec::new();
        }

        let cell = i64::from(CELL_SIZE);
        let (origin_x, origin_y) = (i64::from(self.origin_x), i64::from(self.origin_y));
        let (min_x, max_x) = (i64::from(frame.min_x), i64::from(frame.max_x));
        let (min_y, max_y) = (i64::from(frame.min_y), i64::from(frame.max_y));

        let first_column = (min_x - origin_x) / cell;
        let last_column = (max_x - 1 - origin_x) / cell;
        let first_row = (min_y - origin_y) / cell;
        let last_row = (max_y - 1 - origin_y) / cell;

        let mut cells = Vec::new();
        for row in first_row..=last_row {
            let cell_top = origin_y + row * cell;
            let y0 = cell_top.max(min_y);
            let y1 = (cell_top + cell).min(max_y);
            for column in first_column..=last_column {
                let cell_left = origin_x + column * cell;
                let x0 = cell_left.max(min_x);
                let x1 = (cell_left + cell).min(max_x);
                cells.push(Cell {
                    grid_index: row as usize * self.columns + column as usize,
                    x: x0 as i32,
                    y: y0 as i32,
                    width: (x1 - x0) as u32,
                    height: (y1 - y0) as u32,
                });
            }
        }
        cells
    }
}
