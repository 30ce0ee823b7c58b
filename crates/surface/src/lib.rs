//! The grid of cells shown in a tile window.
//!
//! `GridSurface` owns the cell array. Mutators take `&self` and may be called
//! from any thread; a single mutex serializes them against the snapshot taken
//! at the start of each render pass. Every mutation asks the `RepaintSink` for
//! a repaint after the lock is released and never waits for the paint.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tiles::{Color, PaintSurface, Tile};
use view::{Affine2, GridTransform, Rect};

pub const MIN_GRID_DIMENSION: usize = 1;
pub const MAX_GRID_DIMENSION: usize = 100;

const DEFAULT_GRID_LINE: Color = Color::rgb(192, 192, 192);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridError {
    Config {
        rows: usize,
        cols: usize,
    },
    Index {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
}

impl fmt::Display for GridError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::Config { rows, cols } => write!(
                formatter,
                "grid must be between {MIN_GRID_DIMENSION} and {MAX_GRID_DIMENSION} cells on each axis, got {rows}x{cols}"
            ),
            GridError::Index {
                row,
                col,
                rows,
                cols,
            } => write!(
                formatter,
                "cell ({row}, {col}) is outside the {rows}x{cols} grid"
            ),
        }
    }
}

impl std::error::Error for GridError {}

/// Receives "contents changed" notifications. Implementations must return
/// promptly; coalescing is up to them.
pub trait RepaintSink: Send + Sync {
    fn request_repaint(&self);
}

impl<F> RepaintSink for F
where
    F: Fn() + Send + Sync,
{
    fn request_repaint(&self) {
        self()
    }
}

/// Sink for surfaces that are only rendered on demand.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRepaint;

impl RepaintSink for NoRepaint {
    fn request_repaint(&self) {}
}

#[derive(Clone, Default)]
pub struct Cell {
    tile: Option<Arc<dyn Tile>>,
    rotation_radians: f64,
}

impl Cell {
    pub fn tile(&self) -> Option<&Arc<dyn Tile>> {
        self.tile.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.tile.is_none()
    }

    pub fn rotation_radians(&self) -> f64 {
        self.rotation_radians
    }

    pub fn rotation_degrees(&self) -> f64 {
        self.rotation_radians.to_degrees()
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Cell")
            .field("occupied", &self.tile.is_some())
            .field("rotation_radians", &self.rotation_radians)
            .finish()
    }
}

#[derive(Clone)]
struct GridState {
    cells: Vec<Cell>,
    background: Color,
    letterbox: Color,
    grid_line: Color,
    show_grid: bool,
}

pub struct GridSurface {
    rows: usize,
    cols: usize,
    state: Mutex<GridState>,
    repaint: Arc<dyn RepaintSink>,
}

impl GridSurface {
    pub fn new(rows: usize, cols: usize, repaint: Arc<dyn RepaintSink>) -> Result<Self, GridError> {
        let valid = MIN_GRID_DIMENSION..=MAX_GRID_DIMENSION;
        if !valid.contains(&rows) || !valid.contains(&cols) {
            return Err(GridError::Config { rows, cols });
        }
        Ok(Self {
            rows,
            cols,
            state: Mutex::new(GridState {
                cells: vec![Cell::default(); rows * cols],
                background: Color::WHITE,
                letterbox: Color::BLACK,
                grid_line: DEFAULT_GRID_LINE,
                show_grid: false,
            }),
            repaint,
        })
    }

    /// `(rows, cols)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn set_cell(
        &self,
        row: usize,
        col: usize,
        tile: Option<Arc<dyn Tile>>,
        rotation_degrees: f64,
    ) -> Result<(), GridError> {
        let index = self.index(row, col)?;
        {
            let mut state = self.lock_state();
            state.cells[index] = Cell {
                tile,
                rotation_radians: rotation_degrees.to_radians(),
            };
        }
        self.repaint.request_repaint();
        Ok(())
    }

    pub fn clear_cell(&self, row: usize, col: usize) -> Result<(), GridError> {
        self.set_cell(row, col, None, 0.0)
    }

    pub fn cell(&self, row: usize, col: usize) -> Result<Cell, GridError> {
        let index = self.index(row, col)?;
        Ok(self.lock_state().cells[index].clone())
    }

    pub fn set_background(&self, color: Color) {
        self.update(|state| state.background = color);
    }

    pub fn set_letterbox(&self, color: Color) {
        self.update(|state| state.letterbox = color);
    }

    pub fn set_grid_line(&self, color: Color) {
        self.update(|state| state.grid_line = color);
    }

    pub fn set_show_grid(&self, show_grid: bool) {
        self.update(|state| state.show_grid = show_grid);
    }

    /// Paints one frame. Viewports with a zero dimension draw nothing.
    pub fn render(&self, surface: &mut dyn PaintSurface, viewport_width: u32, viewport_height: u32) {
        let Ok(transform) = GridTransform::new(viewport_width, viewport_height, self.rows, self.cols)
        else {
            return;
        };
        let snapshot = self.lock_state().clone();

        surface.set_transform(Affine2::IDENTITY);
        surface.fill_rect(
            Rect::new(
                0.0,
                0.0,
                f64::from(viewport_width),
                f64::from(viewport_height),
            ),
            snapshot.letterbox,
        );

        surface.set_transform(transform.to_affine());
        surface.fill_rect(
            Rect::new(0.0, 0.0, self.cols as f64, self.rows as f64),
            snapshot.background,
        );

        for (index, cell) in snapshot.cells.iter().enumerate() {
            let Some(tile) = &cell.tile else {
                continue;
            };
            let (row, col) = (index / self.cols, index % self.cols);
            let saved = surface.transform();
            surface.translate(col as f64, row as f64);
            surface.rotate_about(cell.rotation_radians, 0.5, 0.5);
            tile.draw(surface, Rect::UNIT);
            surface.set_transform(saved);
        }

        if snapshot.show_grid {
            draw_grid_lines(surface, &transform, snapshot.grid_line);
        }
        surface.set_transform(Affine2::IDENTITY);
    }

    fn index(&self, row: usize, col: usize) -> Result<usize, GridError> {
        if row >= self.rows || col >= self.cols {
            return Err(GridError::Index {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(row * self.cols + col)
    }

    fn update(&self, change: impl FnOnce(&mut GridState)) {
        change(&mut self.lock_state());
        self.repaint.request_repaint();
    }

    fn lock_state(&self) -> MutexGuard<'_, GridState> {
        self.state
            .lock()
            .unwrap_or_else(|_| panic!("grid state lock poisoned"))
    }
}

/// One device pixel wide lines on the interior cell boundaries.
fn draw_grid_lines(surface: &mut dyn PaintSurface, transform: &GridTransform, color: Color) {
    let (offset_x, offset_y) = transform.offset();
    let cell = transform.cell_pixel_size();
    let grid_width = cell * transform.cols() as f64;
    let grid_height = cell * transform.rows() as f64;

    surface.set_transform(Affine2::IDENTITY);
    for col in 1..transform.cols() {
        let x = offset_x + col as f64 * cell;
        surface.fill_rect(Rect::new(x - 0.5, offset_y, 1.0, grid_height), color);
    }
    for row in 1..transform.rows() {
        let y = offset_y + row as f64 * cell;
        surface.fill_rect(Rect::new(offset_x, y - 0.5, grid_width, 1.0), color);
    }
}

#[cfg(test)]
mod tests;
