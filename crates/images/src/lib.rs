//! Decoded RGBA images and the mip pyramids built from them.

use std::fmt;
use std::path::{Path, PathBuf};

pub use image::{Rgba, RgbaImage};

mod pyramid;

pub use pyramid::{LevelSpacing, MipLevel, MipPyramid, PadPolicy, PyramidConfig};

#[derive(Debug)]
pub enum LoadError {
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    EmptyImage {
        width: u32,
        height: u32,
    },
}

impl fmt::Display for LoadError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Open { path, source } => {
                write!(formatter, "failed to open \"{}\": {source}", path.display())
            }
            LoadError::Decode { path, source } => {
                write!(formatter, "failed to decode \"{}\": {source}", path.display())
            }
            LoadError::EmptyImage { width, height } => {
                write!(formatter, "image has no contents ({width}x{height})")
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Open { source, .. } => Some(source),
            LoadError::Decode { source, .. } => Some(source),
            LoadError::EmptyImage { .. } => None,
        }
    }
}

/// Reads and decodes an image file, converting it to RGBA8.
pub fn load_rgba(path: impl AsRef<Path>) -> Result<RgbaImage, LoadError> {
    let path = path.as_ref();
    let reader = image::ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    let decoded = reader.decode().map_err(|source| LoadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let rgba = decoded.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(LoadError::EmptyImage {
            width: rgba.width(),
            height: rgba.height(),
        });
    }
    Ok(rgba)
}
