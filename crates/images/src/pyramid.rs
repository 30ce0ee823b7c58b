use std::path::Path;

use image::RgbaImage;
use image::imageops;
use serde::{Deserialize, Serialize};
use view::{Affine2, Rect};

use crate::LoadError;

pub const DEFAULT_MAX_DIMENSION: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadPolicy {
    /// Pad to a square with transparent pixels before building levels.
    Square,
    /// Keep the source shape; placement letterboxes inside the destination.
    PreserveAspect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelSpacing {
    /// Each level is the previous one with both axes halved (floor).
    Halving,
    /// Each level's long side is the largest power of two below the previous one.
    PowerOfTwo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PyramidConfig {
    pub pad: PadPolicy,
    pub spacing: LevelSpacing,
    /// Sources whose long side exceeds this are scaled down once before
    /// levels are generated.
    pub max_dimension: u32,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            pad: PadPolicy::PreserveAspect,
            spacing: LevelSpacing::Halving,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl PyramidConfig {
    /// Square padding, power-of-two spacing, 256 px cap.
    pub fn compact() -> Self {
        Self {
            pad: PadPolicy::Square,
            spacing: LevelSpacing::PowerOfTwo,
            max_dimension: 256,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MipLevel {
    image: RgbaImage,
}

impl MipLevel {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn long_side(&self) -> u32 {
        self.width().max(self.height())
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// Pre-filtered copies of one image, largest first. Never empty.
#[derive(Debug, Clone)]
pub struct MipPyramid {
    levels: Vec<MipLevel>,
    aspect_ratio: f64,
}

impl MipPyramid {
    pub fn load(path: impl AsRef<Path>, config: PyramidConfig) -> Result<Self, LoadError> {
        let image = crate::load_rgba(path)?;
        Self::build(image, config)
    }

    pub fn build(source: RgbaImage, config: PyramidConfig) -> Result<Self, LoadError> {
        let (width, height) = source.dimensions();
        if width == 0 || height == 0 {
            return Err(LoadError::EmptyImage { width, height });
        }

        let padded = match config.pad {
            PadPolicy::Square => pad_to_square(source),
            PadPolicy::PreserveAspect => source,
        };
        let first = clamp_to_max_dimension(padded, config.max_dimension.max(1));
        let aspect_ratio = f64::from(first.width()) / f64::from(first.height());

        let mut levels = vec![MipLevel { image: first }];
        loop {
            let previous = &levels[levels.len() - 1].image;
            let Some((next_width, next_height)) =
                next_level_size(previous.width(), previous.height(), config.spacing)
            else {
                break;
            };
            let image = imageops::thumbnail(previous, next_width, next_height);
            levels.push(MipLevel { image });
        }

        Ok(Self {
            levels,
            aspect_ratio,
        })
    }

    pub fn levels(&self) -> &[MipLevel] {
        &self.levels
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn largest(&self) -> &MipLevel {
        &self.levels[0]
    }

    pub fn smallest(&self) -> &MipLevel {
        &self.levels[self.levels.len() - 1]
    }

    /// Width over height of the largest level.
    pub fn aspect_ratio(&self) -> f64 {
        self.aspect_ratio
    }

    /// Smallest level whose long side covers `requested_px`. Requests larger
    /// than the source clamp to the largest level.
    pub fn select(&self, requested_px: f64) -> &MipLevel {
        self.ceiling_by(requested_px, MipLevel::long_side)
    }

    /// Picks a level for drawing `dest` through `transform` by measuring the
    /// device-space length of the destination's horizontal edge.
    pub fn select_for_transform(&self, transform: &Affine2, dest: &Rect) -> &MipLevel {
        assert!(
            transform.is_similarity(),
            "mip selection requires a rotation + uniform scale transform, got {transform:?}"
        );
        assert!(!dest.is_empty(), "mip selection requires a non-empty destination");

        let (dx, dy) = transform.apply_vector(dest.width, 0.0);
        self.ceiling_by(dx.hypot(dy), MipLevel::width)
    }

    /// Maps level pixel space into `dest`, filling the constrained axis and
    /// centering the other.
    pub fn placement(&self, level: &MipLevel, dest: &Rect) -> Affine2 {
        let mut transform = Affine2::translation(dest.x, dest.y);
        let scale = if dest.aspect_ratio() > self.aspect_ratio {
            let actual_width = self.aspect_ratio * dest.height;
            transform.translate((dest.width - actual_width) / 2.0, 0.0);
            dest.height / f64::from(level.height())
        } else {
            let actual_height = dest.width / self.aspect_ratio;
            transform.translate(0.0, (dest.height - actual_height) / 2.0);
            dest.width / f64::from(level.width())
        };
        transform.scale(scale, scale);
        transform
    }

    fn ceiling_by(&self, requested_px: f64, measure: fn(&MipLevel) -> u32) -> &MipLevel {
        self.levels
            .iter()
            .rev()
            .find(|level| f64::from(measure(level)) >= requested_px)
            .unwrap_or(&self.levels[0])
    }
}

fn pad_to_square(source: RgbaImage) -> RgbaImage {
    let (width, height) = source.dimensions();
    if width == height {
        return source;
    }
    let size = width.max(height);
    let mut canvas = RgbaImage::new(size, size);
    let x = (size - width) / 2;
    let y = (size - height) / 2;
    imageops::replace(&mut canvas, &source, i64::from(x), i64::from(y));
    canvas
}

fn clamp_to_max_dimension(source: RgbaImage, max_dimension: u32) -> RgbaImage {
    let (width, height) = source.dimensions();
    let long_side = width.max(height);
    if long_side <= max_dimension {
        return source;
    }
    let scaled_width = scale_side(width, max_dimension, long_side);
    let scaled_height = scale_side(height, max_dimension, long_side);
    imageops::thumbnail(&source, scaled_width, scaled_height)
}

fn scale_side(side: u32, target_long: u32, long_side: u32) -> u32 {
    let scaled = (u64::from(side) * u64::from(target_long) + u64::from(long_side) / 2)
        / u64::from(long_side);
    (scaled as u32).max(1)
}

fn next_level_size(width: u32, height: u32, spacing: LevelSpacing) -> Option<(u32, u32)> {
    let (next_width, next_height) = match spacing {
        LevelSpacing::Halving => (width / 2, height / 2),
        LevelSpacing::PowerOfTwo => {
            let long_side = width.max(height);
            let next_long = power_of_two_below(long_side);
            let ratio = |side: u32| {
                (u64::from(side) * u64::from(next_long) / u64::from(long_side)) as u32
            };
            (ratio(width), ratio(height))
        }
    };
    if next_width == 0 || next_height == 0 {
        return None;
    }
    Some((next_width, next_height))
}

fn power_of_two_below(size: u32) -> u32 {
    if size <= 1 {
        return 0;
    }
    1 << (31 - (size - 1).leading_zeros())
}
