//! A small window that shows images in the cells of a fixed grid and hands
//! key presses to a separate owner thread.
//!
//! The display side (winit event loop, paint, key delivery) runs on its own
//! thread; the owner mutates cells and blocks in [`TileWindow::next_input`].
//! Dropping the [`TileWindow`], or the owner thread exiting, closes the window.
//!
//! winit allows one event loop per process, so at most one window can be
//! opened per process.

use std::fmt;

mod config;
mod display;
mod registry;
mod window;

pub use config::{CloseBehavior, DEFAULT_MIN_DIMENSION, DEFAULT_POLL_INTERVAL_MS, WindowConfig};
pub use registry::TileId;
pub use window::{TileWindow, run};

pub use images::{LevelSpacing, LoadError, PadPolicy, PyramidConfig, Rgba, RgbaImage};
pub use lifecycle::{DisposeReason, LifecycleError, LifecycleState};
pub use surface::GridError;
pub use threads::InputError;
pub use tiles::{Color, ColorTile, ImagePyramidTile, PaintSurface, Tile};
pub use view::Rect;

#[derive(Debug)]
pub enum TileGridError {
    Grid(GridError),
    InvalidConfig(&'static str),
    ConfigParse(serde_json::Error),
    Io(std::io::Error),
    Load(LoadError),
    UnknownTile(TileId),
    Input(InputError),
    Lifecycle(LifecycleError),
    Present(renderer::PresentError),
    EventLoop(winit::error::EventLoopError),
    Window(winit::error::OsError),
    UnsupportedPlatform,
    DisplayExited,
    OwnerPanicked,
}

impl fmt::Display for TileGridError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileGridError::Grid(error) => write!(formatter, "{error}"),
            TileGridError::InvalidConfig(message) => {
                write!(formatter, "invalid window config: {message}")
            }
            TileGridError::ConfigParse(error) => {
                write!(formatter, "failed to parse window config: {error}")
            }
            TileGridError::Io(error) => write!(formatter, "i/o error: {error}"),
            TileGridError::Load(error) => write!(formatter, "{error}"),
            TileGridError::UnknownTile(id) => write!(formatter, "unknown tile id {id:?}"),
            TileGridError::Input(error) => write!(formatter, "{error}"),
            TileGridError::Lifecycle(error) => write!(formatter, "{error}"),
            TileGridError::Present(error) => write!(formatter, "{error}"),
            TileGridError::EventLoop(error) => write!(formatter, "event loop error: {error}"),
            TileGridError::Window(error) => {
                write!(formatter, "failed to create window: {error}")
            }
            TileGridError::UnsupportedPlatform => write!(
                formatter,
                "this platform cannot run the event loop off the main thread; use tilegrid::run"
            ),
            TileGridError::DisplayExited => {
                write!(formatter, "display thread exited before the window was realized")
            }
            TileGridError::OwnerPanicked => write!(formatter, "owner thread panicked"),
        }
    }
}

impl std::error::Error for TileGridError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TileGridError::Grid(error) => Some(error),
            TileGridError::ConfigParse(error) => Some(error),
            TileGridError::Io(error) => Some(error),
            TileGridError::Load(error) => Some(error),
            TileGridError::Input(error) => Some(error),
            TileGridError::Lifecycle(error) => Some(error),
            TileGridError::Present(error) => Some(error),
            TileGridError::EventLoop(error) => Some(error),
            TileGridError::Window(error) => Some(error),
            _ => None,
        }
    }
}

impl From<GridError> for TileGridError {
    fn from(error: GridError) -> Self {
        TileGridError::Grid(error)
    }
}

impl From<LoadError> for TileGridError {
    fn from(error: LoadError) -> Self {
        TileGridError::Load(error)
    }
}

impl From<InputError> for TileGridError {
    fn from(error: InputError) -> Self {
        TileGridError::Input(error)
    }
}

impl From<LifecycleError> for TileGridError {
    fn from(error: LifecycleError) -> Self {
        TileGridError::Lifecycle(error)
    }
}

impl From<renderer::PresentError> for TileGridError {
    fn from(error: renderer::PresentError) -> Self {
        TileGridError::Present(error)
    }
}

impl From<winit::error::EventLoopError> for TileGridError {
    fn from(error: winit::error::EventLoopError) -> Self {
        TileGridError::EventLoop(error)
    }
}

impl From<winit::error::OsError> for TileGridError {
    fn from(error: winit::error::OsError) -> Self {
        TileGridError::Window(error)
    }
}

impl From<std::io::Error> for TileGridError {
    fn from(error: std::io::Error) -> Self {
        TileGridError::Io(error)
    }
}

#[cfg(test)]
mod tests;
