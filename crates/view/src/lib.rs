//! Coordinate-space math for the grid surface.
//!
//! `Affine2` is the transform carried by every paint surface; `GridTransform`
//! maps a logical `rows x cols` grid onto a device-pixel viewport so that one
//! cell is one unit, letterboxing the axis that does not fit.

use std::fmt;

/// Aspect ratios closer than this are treated as identical. Viewport sizes
/// jitter by fractions of a pixel while a window is being resized.
pub const ASPECT_EPSILON: f64 = 1e-4;

const SIMILARITY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewTransformError {
    InvalidViewport,
    InvalidGrid,
    NonFiniteValue,
    Singular,
}

impl fmt::Display for ViewTransformError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewTransformError::InvalidViewport => {
                write!(formatter, "viewport width and height must be positive")
            }
            ViewTransformError::InvalidGrid => {
                write!(formatter, "grid rows and columns must be positive")
            }
            ViewTransformError::NonFiniteValue => {
                write!(formatter, "transform produced a non-finite value")
            }
            ViewTransformError::Singular => write!(formatter, "transform is not invertible"),
        }
    }
}

impl std::error::Error for ViewTransformError {}

/// Axis-aligned rectangle in whatever space the caller is drawing in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const UNIT: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }

    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.x, self.y),
            (self.x + self.width, self.y),
            (self.x + self.width, self.y + self.height),
            (self.x, self.y + self.height),
        ]
    }
}

/// 2-D affine transform, row-major:
///
/// ```text
/// | m00 m01 m02 |   x' = m00 * x + m01 * y + m02
/// | m10 m11 m12 |   y' = m10 * x + m11 * y + m12
/// ```
///
/// The mutating helpers (`translate`, `scale`, `rotate_about`) concatenate in
/// local space: the new operation applies to coordinates *before* the
/// existing transform, the same order a retained graphics context uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine2 {
    m00: f64,
    m01: f64,
    m02: f64,
    m10: f64,
    m11: f64,
    m12: f64,
}

impl Default for Affine2 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine2 {
    pub const IDENTITY: Affine2 = Affine2 {
        m00: 1.0,
        m01: 0.0,
        m02: 0.0,
        m10: 0.0,
        m11: 1.0,
        m12: 0.0,
    };

    pub fn from_rows(m00: f64, m01: f64, m02: f64, m10: f64, m11: f64, m12: f64) -> Self {
        Self {
            m00,
            m01,
            m02,
            m10,
            m11,
            m12,
        }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::from_rows(1.0, 0.0, tx, 0.0, 1.0, ty)
    }

    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self::from_rows(sx, 0.0, 0.0, 0.0, sy, 0.0)
    }

    /// Positive angles turn +x toward +y, which is clockwise on a y-down screen.
    pub fn rotation(radians: f64) -> Self {
        let (sine, cosine) = radians.sin_cos();
        Self::from_rows(cosine, -sine, 0.0, sine, cosine, 0.0)
    }

    pub fn rotation_about(radians: f64, center_x: f64, center_y: f64) -> Self {
        Self::translation(center_x, center_y)
            .then_local(&Self::rotation(radians))
            .then_local(&Self::translation(-center_x, -center_y))
    }

    /// `self * local`: apply `local` first, then `self`.
    pub fn then_local(&self, local: &Affine2) -> Affine2 {
        Affine2 {
            m00: self.m00 * local.m00 + self.m01 * local.m10,
            m01: self.m00 * local.m01 + self.m01 * local.m11,
            m02: self.m00 * local.m02 + self.m01 * local.m12 + self.m02,
            m10: self.m10 * local.m00 + self.m11 * local.m10,
            m11: self.m10 * local.m01 + self.m11 * local.m11,
            m12: self.m10 * local.m02 + self.m11 * local.m12 + self.m12,
        }
    }

    pub fn translate(&mut self, tx: f64, ty: f64) {
        *self = self.then_local(&Self::translation(tx, ty));
    }

    pub fn scale(&mut self, sx: f64, sy: f64) {
        *self = self.then_local(&Self::scaling(sx, sy));
    }

    pub fn rotate_about(&mut self, radians: f64, center_x: f64, center_y: f64) {
        *self = self.then_local(&Self::rotation_about(radians, center_x, center_y));
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.m00 * x + self.m01 * y + self.m02,
            self.m10 * x + self.m11 * y + self.m12,
        )
    }

    /// Maps a displacement; translation does not apply.
    pub fn apply_vector(&self, dx: f64, dy: f64) -> (f64, f64) {
        (self.m00 * dx + self.m01 * dy, self.m10 * dx + self.m11 * dy)
    }

    pub fn determinant(&self) -> f64 {
        self.m00 * self.m11 - self.m01 * self.m10
    }

    pub fn inverse(&self) -> Result<Affine2, ViewTransformError> {
        let det = self.determinant();
        if !det.is_finite() {
            return Err(ViewTransformError::NonFiniteValue);
        }
        if det.abs() <= f64::EPSILON {
            return Err(ViewTransformError::Singular);
        }

        let inv00 = self.m11 / det;
        let inv01 = -self.m01 / det;
        let inv10 = -self.m10 / det;
        let inv11 = self.m00 / det;
        let inv02 = -(inv00 * self.m02 + inv01 * self.m12);
        let inv12 = -(inv10 * self.m02 + inv11 * self.m12);
        let inverse = Affine2::from_rows(inv00, inv01, inv02, inv10, inv11, inv12);
        if !inverse.is_finite() {
            return Err(ViewTransformError::NonFiniteValue);
        }
        Ok(inverse)
    }

    pub fn is_finite(&self) -> bool {
        [self.m00, self.m01, self.m02, self.m10, self.m11, self.m12]
            .iter()
            .all(|value| value.is_finite())
    }

    /// Length of the image of the unit x vector.
    pub fn scale_x(&self) -> f64 {
        self.m00.hypot(self.m10)
    }

    /// Length of the image of the unit y vector.
    pub fn scale_y(&self) -> f64 {
        self.m01.hypot(self.m11)
    }

    /// True when the transform is rotation + uniform scale + translation:
    /// both basis vectors keep equal length and stay perpendicular.
    pub fn is_similarity(&self) -> bool {
        let scale_x = self.scale_x();
        let scale_y = self.scale_y();
        let reference = scale_x.max(scale_y).max(1.0);
        let skew = self.m00 * self.m01 + self.m10 * self.m11;
        (scale_x - scale_y).abs() <= SIMILARITY_TOLERANCE * reference
            && skew.abs() <= SIMILARITY_TOLERANCE * reference * reference
    }

    pub fn to_matrix3x3(&self) -> [[f64; 3]; 3] {
        [
            [self.m00, self.m01, self.m02],
            [self.m10, self.m11, self.m12],
            [0.0, 0.0, 1.0],
        ]
    }

    /// Device-space bounding box of `rect` under this transform.
    pub fn bounds_of(&self, rect: &Rect) -> Rect {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for (x, y) in rect.corners() {
            let (px, py) = self.apply(x, y);
            min_x = min_x.min(px);
            min_y = min_y.min(py);
            max_x = max_x.max(px);
            max_y = max_y.max(py);
        }
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

/// Letterboxed mapping of a `rows x cols` grid onto a pixel viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTransform {
    rows: usize,
    cols: usize,
    viewport_width: u32,
    viewport_height: u32,
    used_width: u32,
    used_height: u32,
    offset_x: f64,
    offset_y: f64,
    scale: f64,
}

impl GridTransform {
    pub fn new(
        viewport_width: u32,
        viewport_height: u32,
        rows: usize,
        cols: usize,
    ) -> Result<Self, ViewTransformError> {
        if viewport_width == 0 || viewport_height == 0 {
            return Err(ViewTransformError::InvalidViewport);
        }
        if rows == 0 || cols == 0 {
            return Err(ViewTransformError::InvalidGrid);
        }

        let width = f64::from(viewport_width);
        let height = f64::from(viewport_height);
        let aspect_ratio = width / height;
        let desired_aspect_ratio = cols as f64 / rows as f64;

        let mut used_width = viewport_width;
        let mut used_height = viewport_height;
        if (aspect_ratio - desired_aspect_ratio).abs() > ASPECT_EPSILON {
            if desired_aspect_ratio > aspect_ratio {
                used_height = round_to_pixels(width / desired_aspect_ratio)?;
            } else {
                used_width = round_to_pixels(height * desired_aspect_ratio)?;
            }
        }

        // Rounding can make one axis a little long; the cell size follows the
        // tighter axis so the grid never leaves the viewport.
        let scale = (f64::from(used_width) / cols as f64).min(f64::from(used_height) / rows as f64);
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ViewTransformError::NonFiniteValue);
        }
        let offset_x = (width - cols as f64 * scale) / 2.0;
        let offset_y = (height - rows as f64 * scale) / 2.0;

        Ok(Self {
            rows,
            cols,
            viewport_width,
            viewport_height,
            used_width,
            used_height,
            offset_x,
            offset_y,
            scale,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn viewport_size(&self) -> (u32, u32) {
        (self.viewport_width, self.viewport_height)
    }

    /// Letterboxed area in whole pixels. The grid itself spans
    /// `cols * cell_pixel_size()` by `rows * cell_pixel_size()` and may be up
    /// to a pixel smaller on one axis.
    pub fn used_size(&self) -> (u32, u32) {
        (self.used_width, self.used_height)
    }

    pub fn offset(&self) -> (f64, f64) {
        (self.offset_x, self.offset_y)
    }

    /// Device pixels per cell edge.
    pub fn cell_pixel_size(&self) -> f64 {
        self.scale
    }

    /// Cell space (one unit per cell, origin at the grid's top-left) to
    /// device pixels.
    pub fn to_affine(&self) -> Affine2 {
        Affine2::from_rows(self.scale, 0.0, self.offset_x, 0.0, self.scale, self.offset_y)
    }

    pub fn cell_rect(&self, row: usize, col: usize) -> Option<Rect> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some(Rect::new(
            self.offset_x + col as f64 * self.scale,
            self.offset_y + row as f64 * self.scale,
            self.scale,
            self.scale,
        ))
    }

    /// Cell under a device pixel position, or `None` in the letterbox.
    pub fn cell_at(&self, pixel_x: f64, pixel_y: f64) -> Option<(usize, usize)> {
        if !pixel_x.is_finite() || !pixel_y.is_finite() {
            return None;
        }
        let cell_x = ((pixel_x - self.offset_x) / self.scale).floor();
        let cell_y = ((pixel_y - self.offset_y) / self.scale).floor();
        if cell_x < 0.0 || cell_y < 0.0 {
            return None;
        }
        let (col, row) = (cell_x as usize, cell_y as usize);
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some((row, col))
    }
}

fn round_to_pixels(value: f64) -> Result<u32, ViewTransformError> {
    if !value.is_finite() {
        return Err(ViewTransformError::NonFiniteValue);
    }
    Ok((value.round() as u32).max(1))
}
