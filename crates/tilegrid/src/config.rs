use std::path::Path;
use std::time::Duration;

use images::PyramidConfig;
use serde::{Deserialize, Serialize};
use surface::{GridError, MAX_GRID_DIMENSION, MIN_GRID_DIMENSION};
use tiles::Color;

use crate::TileGridError;

pub const DEFAULT_MIN_DIMENSION: u32 = 400;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// What happens when the user closes the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseBehavior {
    /// Terminate the whole process.
    #[default]
    ExitProcess,
    /// Dispose the window and interrupt readers blocked on input.
    Dispose,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub rows: usize,
    pub cols: usize,
    pub title: String,
    /// Logical pixels given to the longer grid axis; also the minimum size.
    pub min_dimension: u32,
    pub background: Color,
    pub letterbox: Color,
    pub grid_line: Color,
    pub show_grid: bool,
    pub poll_interval_ms: u64,
    pub verbosity: u8,
    pub close_behavior: CloseBehavior,
    pub pyramid: PyramidConfig,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            rows: 8,
            cols: 8,
            title: "tilegrid".to_owned(),
            min_dimension: DEFAULT_MIN_DIMENSION,
            background: Color::WHITE,
            letterbox: Color::BLACK,
            grid_line: Color::rgb(192, 192, 192),
            show_grid: false,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            verbosity: 0,
            close_behavior: CloseBehavior::default(),
            pyramid: PyramidConfig::default(),
        }
    }
}

impl WindowConfig {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, TileGridError> {
        let config: Self = serde_json::from_str(json).map_err(TileGridError::ConfigParse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, TileGridError> {
        let json = std::fs::read_to_string(path).map_err(TileGridError::Io)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), TileGridError> {
        let valid = MIN_GRID_DIMENSION..=MAX_GRID_DIMENSION;
        if !valid.contains(&self.rows) || !valid.contains(&self.cols) {
            return Err(GridError::Config {
                rows: self.rows,
                cols: self.cols,
            }
            .into());
        }
        if self.min_dimension == 0 {
            return Err(TileGridError::InvalidConfig(
                "min_dimension must be positive",
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(TileGridError::InvalidConfig(
                "poll_interval_ms must be positive",
            ));
        }
        if self.pyramid.max_dimension == 0 {
            return Err(TileGridError::InvalidConfig(
                "pyramid.max_dimension must be positive",
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Initial (and minimum) window size in logical pixels. The longer grid
    /// axis gets `min_dimension`; the shorter one keeps the grid's aspect.
    pub fn window_size(&self) -> (f64, f64) {
        let long_side = f64::from(self.min_dimension);
        let rows = self.rows as f64;
        let cols = self.cols as f64;
        if self.cols >= self.rows {
            (long_side, long_side * rows / cols)
        } else {
            (long_side * cols / rows, long_side)
        }
    }
}
