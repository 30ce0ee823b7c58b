//! Drawing capabilities shared by the grid surface and its tiles.

use std::fmt;
use std::path::Path;

use images::{LoadError, MipPyramid, PyramidConfig, RgbaImage};
use serde::{Deserialize, Serialize};
use view::{Affine2, Rect};

/// Straight (non-premultiplied) RGBA8 color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default = "opaque_alpha")]
    pub a: u8,
}

fn opaque_alpha() -> u8 {
    u8::MAX
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: u8::MAX }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl From<[u8; 4]> for Color {
    fn from(value: [u8; 4]) -> Self {
        Color::rgba(value[0], value[1], value[2], value[3])
    }
}

impl fmt::Display for Color {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r, self.g, self.b, self.a
        )
    }
}

/// A 2-D paint target with a current transform from local space to device
/// pixels. Callers save a transform with [`PaintSurface::transform`] and
/// restore it with [`PaintSurface::set_transform`].
pub trait PaintSurface {
    fn transform(&self) -> Affine2;
    fn set_transform(&mut self, transform: Affine2);

    /// Fills `rect` (local space) through the current transform.
    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Blits `image` after mapping its pixel space through `image_to_local`
    /// and then the current transform. Source pixels are blended over the
    /// existing contents.
    fn draw_image(&mut self, image: &RgbaImage, image_to_local: &Affine2);

    fn translate(&mut self, tx: f64, ty: f64) {
        let mut transform = self.transform();
        transform.translate(tx, ty);
        self.set_transform(transform);
    }

    fn scale(&mut self, sx: f64, sy: f64) {
        let mut transform = self.transform();
        transform.scale(sx, sy);
        self.set_transform(transform);
    }

    fn rotate_about(&mut self, radians: f64, center_x: f64, center_y: f64) {
        let mut transform = self.transform();
        transform.rotate_about(radians, center_x, center_y);
        self.set_transform(transform);
    }
}

/// Something that can draw itself into a destination rectangle.
///
/// Implementations draw through the surface's current transform and must
/// leave that transform as they found it.
pub trait Tile: Send + Sync {
    fn draw(&self, surface: &mut dyn PaintSurface, dest: Rect);
}

/// An image drawn from the mip level that best matches its on-screen size.
#[derive(Debug, Clone)]
pub struct ImagePyramidTile {
    pyramid: MipPyramid,
}

impl ImagePyramidTile {
    pub fn new(pyramid: MipPyramid) -> Self {
        Self { pyramid }
    }

    pub fn load(path: impl AsRef<Path>, config: PyramidConfig) -> Result<Self, LoadError> {
        MipPyramid::load(path, config).map(Self::new)
    }

    pub fn from_image(image: RgbaImage, config: PyramidConfig) -> Result<Self, LoadError> {
        MipPyramid::build(image, config).map(Self::new)
    }

    pub fn pyramid(&self) -> &MipPyramid {
        &self.pyramid
    }
}

impl Tile for ImagePyramidTile {
    fn draw(&self, surface: &mut dyn PaintSurface, dest: Rect) {
        let level = self.pyramid.select_for_transform(&surface.transform(), &dest);
        let placement = self.pyramid.placement(level, &dest);
        surface.draw_image(level.image(), &placement);
    }
}

/// Flat color filling the whole destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTile(pub Color);

impl Tile for ColorTile {
    fn draw(&self, surface: &mut dyn PaintSurface, dest: Rect) {
        surface.fill_rect(dest, self.0);
    }
}
