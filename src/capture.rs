//! Signature capture: per-field transparent drawing surfaces and the rasters
//! they produce.
//!
//! A [`CaptureSurface`] is the off-screen equivalent of the drawing pad a
//! front end shows next to each field: a fully transparent RGBA canvas that
//! freehand strokes are painted onto in black. Once the user is happy, the
//! surface is frozen into a [`CapturedSignature`] (PNG bytes) and handed to
//! the session.

use crate::pipeline::encode;
use image::error::{ParameterError, ParameterErrorKind};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_circle_mut;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Pen colour: opaque black.
const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// One freehand stroke as a polyline of surface pixel coordinates.
pub type Stroke = Vec<(f32, f32)>;

/// A recorded drawing: the strokes made on one surface, in order.
///
/// Serialises as `[[[x, y], …], …]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrokeSet(pub Vec<Stroke>);

impl StrokeSet {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Transparent drawing surface for one field.
#[derive(Debug, Clone)]
pub struct CaptureSurface {
    image: RgbaImage,
    stroke_width: f32,
    pen: Option<(f32, f32)>,
}

impl CaptureSurface {
    /// A blank surface `width` × `height` pixels.
    pub fn new(width: u32, height: u32, stroke_width: f32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0])),
            stroke_width,
            pen: None,
        }
    }

    /// Replay a recorded drawing onto a fresh surface.
    pub fn from_strokes(width: u32, height: u32, stroke_width: f32, strokes: &StrokeSet) -> Self {
        let mut surface = Self::new(width, height, stroke_width);
        for stroke in &strokes.0 {
            let mut points = stroke.iter();
            if let Some(&(x, y)) = points.next() {
                surface.begin_stroke(x, y);
                for &(x, y) in points {
                    surface.line_to(x, y);
                }
                surface.end_stroke();
            }
        }
        debug!(
            "Replayed {} strokes onto {}x{} surface",
            strokes.0.len(),
            width,
            height
        );
        surface
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Put the pen down. A stroke that never moves still leaves a dot.
    /// Non-finite coordinates are ignored.
    pub fn begin_stroke(&mut self, x: f32, y: f32) {
        if !(x.is_finite() && y.is_finite()) {
            return;
        }
        self.dab(x, y);
        self.pen = Some((x, y));
    }

    /// Drag the pen to `(x, y)`. Ignored when the pen is up or the point is
    /// not finite. Only the part of the segment near the surface is inked.
    pub fn line_to(&mut self, x: f32, y: f32) {
        let Some((x0, y0)) = self.pen else {
            return;
        };
        if !(x.is_finite() && y.is_finite()) {
            return;
        }
        let margin = self.brush_radius() as f32 + 1.0;
        let bounds = (
            -margin,
            -margin,
            self.width() as f32 + margin,
            self.height() as f32 + margin,
        );
        if let Some(((ax, ay), (bx, by))) = clip_segment((x0, y0), (x, y), bounds) {
            let len = ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt();
            let max_steps = 2 * (self.width() + self.height()).max(1);
            let steps = ((len * 2.0).ceil().max(1.0) as u32).min(max_steps);
            for i in 0..=steps {
                let t = i as f32 / steps as f32;
                self.dab(ax + (bx - ax) * t, ay + (by - ay) * t);
            }
        }
        self.pen = Some((x, y));
    }

    /// Lift the pen.
    pub fn end_stroke(&mut self) {
        self.pen = None;
    }

    /// Wipe every stroke.
    pub fn clear(&mut self) {
        for px in self.image.pixels_mut() {
            *px = Rgba([0, 0, 0, 0]);
        }
        self.pen = None;
    }

    /// True while nothing has been drawn.
    pub fn is_blank(&self) -> bool {
        is_blank(&self.image)
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    fn brush_radius(&self) -> i32 {
        ((self.stroke_width - 1.0) / 2.0).round().max(0.0) as i32
    }

    fn dab(&mut self, x: f32, y: f32) {
        let radius = self.brush_radius();
        let (cx, cy) = (x.round() as i32, y.round() as i32);
        if radius == 0 {
            if cx >= 0 && cy >= 0 && (cx as u32) < self.image.width() && (cy as u32) < self.image.height() {
                self.image.put_pixel(cx as u32, cy as u32, INK);
            }
        } else {
            draw_filled_circle_mut(&mut self.image, (cx, cy), radius, INK);
        }
    }
}

/// Clip the segment `a`..`b` to `(x_min, y_min, x_max, y_max)`
/// (Liang-Barsky). `None` when it misses the box entirely.
fn clip_segment(
    a: (f32, f32),
    b: (f32, f32),
    (x_min, y_min, x_max, y_max): (f32, f32, f32, f32),
) -> Option<((f32, f32), (f32, f32))> {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    for (p, q) in [
        (-dx, a.0 - x_min),
        (dx, x_max - a.0),
        (-dy, a.1 - y_min),
        (dy, y_max - a.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
        }
    }
    if t0 > t1 {
        return None;
    }
    Some((
        (a.0 + dx * t0, a.1 + dy * t0),
        (a.0 + dx * t1, a.1 + dy * t1),
    ))
}

/// True when every pixel is fully transparent.
pub fn is_blank(img: &RgbaImage) -> bool {
    img.pixels().all(|p| p[3] == 0)
}

/// A confirmed capture: PNG bytes plus the pixel size of the surface it came
/// from. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedSignature {
    png: Arc<[u8]>,
    width: u32,
    height: u32,
}

impl CapturedSignature {
    /// Freeze an RGBA raster. A raster with no pixels is refused.
    pub fn from_image(img: &RgbaImage) -> Result<Self, image::ImageError> {
        if img.width() == 0 || img.height() == 0 {
            return Err(image::ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            )));
        }
        let png = encode::encode_png(img)?;
        Ok(Self {
            png: png.into(),
            width: img.width(),
            height: img.height(),
        })
    }

    /// Freeze a drawing surface.
    pub fn from_surface(surface: &CaptureSurface) -> Result<Self, image::ImageError> {
        Self::from_image(surface.image())
    }

    /// Wrap existing PNG bytes, checking that they decode.
    pub fn from_png(bytes: impl Into<Vec<u8>>) -> Result<Self, image::ImageError> {
        let bytes = bytes.into();
        let img = encode::decode_rgba(&bytes)?;
        Ok(Self {
            png: bytes.into(),
            width: img.width(),
            height: img.height(),
        })
    }

    pub fn png(&self) -> &[u8] {
        &self.png
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Decode back to RGBA.
    pub fn decode(&self) -> Result<RgbaImage, image::ImageError> {
        encode::decode_rgba(&self.png)
    }

    /// True when the captured raster has no visible pixel.
    pub fn is_blank(&self) -> Result<bool, image::ImageError> {
        Ok(is_blank(&self.decode()?))
    }
}
