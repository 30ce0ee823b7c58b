//! Renderer crate root.
//!
//! - `canvas`: CPU rasterizer implementing `tiles::PaintSurface`. Every frame
//!   is composed here so the draw path is testable without a GPU.
//! - `presenter`: uploads a finished frame to a wgpu texture and blits it to
//!   the window surface.

use std::fmt;

mod canvas;
mod presenter;

pub use canvas::PixelCanvas;
pub use presenter::FramePresenter;
pub use wgpu::SurfaceError;

#[derive(Debug)]
pub enum PresentError {
    CreateSurface(wgpu::CreateSurfaceError),
    RequestAdapter(wgpu::RequestAdapterError),
    RequestDevice(wgpu::RequestDeviceError),
    NoSurfaceFormat,
    Surface(wgpu::SurfaceError),
}

impl fmt::Display for PresentError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresentError::CreateSurface(error) => {
                write!(formatter, "failed to create wgpu surface: {error}")
            }
            PresentError::RequestAdapter(error) => {
                write!(formatter, "failed to request wgpu adapter: {error}")
            }
            PresentError::RequestDevice(error) => {
                write!(formatter, "failed to request wgpu device: {error}")
            }
            PresentError::NoSurfaceFormat => {
                write!(formatter, "surface reports no supported texture formats")
            }
            PresentError::Surface(error) => write!(formatter, "surface error: {error}"),
        }
    }
}

impl std::error::Error for PresentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PresentError::CreateSurface(error) => Some(error),
            PresentError::RequestAdapter(error) => Some(error),
            PresentError::RequestDevice(error) => Some(error),
            PresentError::Surface(error) => Some(error),
            PresentError::NoSurfaceFormat => None,
        }
    }
}

impl From<wgpu::SurfaceError> for PresentError {
    fn from(error: wgpu::SurfaceError) -> Self {
        PresentError::Surface(error)
    }
}
