use images::{Rgba, RgbaImage};
use tiles::{Color, PaintSurface};
use view::{Affine2, Rect};

/// Software paint surface backed by an RGBA8 frame.
///
/// Coverage is decided per pixel center: a pixel is painted when its center,
/// mapped back through the inverse transform, lands inside the source shape.
/// Images are sampled nearest-neighbour since mip selection already picked a
/// level close to the on-screen size.
#[derive(Debug, Clone)]
pub struct PixelCanvas {
    pixels: RgbaImage,
    transform: Affine2,
}

impl PixelCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        assert!(width > 0 && height > 0, "canvas size must be positive");
        Self {
            pixels: RgbaImage::new(width, height),
            transform: Affine2::IDENTITY,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Reallocates when the size changes; contents are unspecified afterwards.
    pub fn resize(&mut self, width: u32, height: u32) {
        assert!(width > 0 && height > 0, "canvas size must be positive");
        if self.pixels.dimensions() != (width, height) {
            self.pixels = RgbaImage::new(width, height);
        }
    }

    pub fn clear(&mut self, color: Color) {
        let pixel = Rgba(color.to_array());
        for destination in self.pixels.pixels_mut() {
            *destination = pixel;
        }
        self.transform = Affine2::IDENTITY;
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        Color::from(self.pixels.get_pixel(x, y).0)
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Visits every pixel whose center maps inside `local_bounds` under
    /// `to_device`, passing the pixel and the local-space sample point.
    fn for_each_covered_pixel(
        &mut self,
        to_device: &Affine2,
        local_bounds: &Rect,
        mut paint: impl FnMut(&mut Rgba<u8>, f64, f64),
    ) {
        if local_bounds.is_empty() || !to_device.is_finite() {
            return;
        }
        let Ok(to_local) = to_device.inverse() else {
            return;
        };

        let device_bounds = to_device.bounds_of(local_bounds);
        let width = f64::from(self.pixels.width());
        let height = f64::from(self.pixels.height());
        let min_x = device_bounds.x.floor().clamp(0.0, width) as u32;
        let min_y = device_bounds.y.floor().clamp(0.0, height) as u32;
        let max_x = (device_bounds.x + device_bounds.width).ceil().clamp(0.0, width) as u32;
        let max_y = (device_bounds.y + device_bounds.height).ceil().clamp(0.0, height) as u32;

        for y in min_y..max_y {
            for x in min_x..max_x {
                let (local_x, local_y) =
                    to_local.apply(f64::from(x) + 0.5, f64::from(y) + 0.5);
                if local_bounds.contains(local_x, local_y) {
                    paint(self.pixels.get_pixel_mut(x, y), local_x, local_y);
                }
            }
        }
    }
}

impl PaintSurface for PixelCanvas {
    fn transform(&self) -> Affine2 {
        self.transform
    }

    fn set_transform(&mut self, transform: Affine2) {
        self.transform = transform;
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        if color.a == 0 {
            return;
        }
        let to_device = self.transform;
        let source = color.to_array();
        self.for_each_covered_pixel(&to_device, &rect, |pixel, _, _| {
            blend_over(pixel, source);
        });
    }

    fn draw_image(&mut self, image: &RgbaImage, image_to_local: &Affine2) {
        let to_device = self.transform.then_local(image_to_local);
        let bounds = Rect::new(
            0.0,
            0.0,
            f64::from(image.width()),
            f64::from(image.height()),
        );
        self.for_each_covered_pixel(&to_device, &bounds, |pixel, source_x, source_y| {
            let sample_x = (source_x.floor() as u32).min(image.width() - 1);
            let sample_y = (source_y.floor() as u32).min(image.height() - 1);
            blend_over(pixel, image.get_pixel(sample_x, sample_y).0);
        });
    }
}

/// Source-over compositing of straight-alpha colors.
fn blend_over(destination: &mut Rgba<u8>, source: [u8; 4]) {
    let source_alpha = source[3];
    if source_alpha == u8::MAX {
        destination.0 = source;
        return;
    }
    if source_alpha == 0 {
        return;
    }

    let sa = f32::from(source_alpha) / 255.0;
    let da = f32::from(destination.0[3]) / 255.0;
    let out_alpha = sa + da * (1.0 - sa);
    let mut out = [0u8; 4];
    for channel in 0..3 {
        let sc = f32::from(source[channel]) / 255.0;
        let dc = f32::from(destination.0[channel]) / 255.0;
        let value = (sc * sa + dc * da * (1.0 - sa)) / out_alpha;
        out[channel] = (value * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8;
    destination.0 = out;
}
