//! Field registry: named rectangles on PDF pages, plus the point↔pixel
//! coordinate transform shared by capture sizing, preview and stamping.
//!
//! PDF user space puts the origin at the bottom-left of a page and measures
//! in points; rasterised pages put the origin at the top-left and measure in
//! pixels. [`Field::pixel_rect`] is the single place that flip happens.

use crate::error::FormStampError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// A named rectangular region on one page, in PDF points (origin bottom-left).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Unique identifier, e.g. `"sign"`.
    pub key: String,
    /// Display name.
    pub label: String,
    /// 1-based page number.
    pub page: usize,
    /// Bottom-left corner, x.
    pub x: f32,
    /// Bottom-left corner, y.
    pub y: f32,
    /// Width in points.
    pub w: f32,
    /// Height in points.
    pub h: f32,
}

/// A rectangle in raster pixels (origin top-left).
///
/// `x`/`y` are signed: a field that sticks out past the top of the page maps
/// to a negative row, and overlay code clips it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// A rectangle in PDF points (origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Field {
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        page: usize,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            page,
            x,
            y,
            w,
            h,
        }
    }

    /// Pixel rectangle of this field on a page `page_height_pt` points tall
    /// rasterised at `scale` pixels per point.
    pub fn pixel_rect(&self, page_height_pt: f32, scale: f32) -> PixelRect {
        PixelRect {
            x: (self.x * scale).round() as i64,
            y: ((page_height_pt - self.y - self.h) * scale).round() as i64,
            width: (self.w * scale).round().max(0.0) as u32,
            height: (self.h * scale).round().max(0.0) as u32,
        }
    }

    /// Size of the drawing surface offered for this field at `scale`.
    ///
    /// Tiny fields still get a usable pad: each side is at least
    /// `min_width` × `min_height` pixels.
    pub fn surface_size(&self, scale: f32, min_width: u32, min_height: u32) -> (u32, u32) {
        let w = (self.w * scale).round().max(0.0) as u32;
        let h = (self.h * scale).round().max(0.0) as u32;
        (w.max(min_width), h.max(min_height))
    }

    fn validate(&self) -> Result<(), FormStampError> {
        let invalid = |reason: String| FormStampError::InvalidField {
            key: self.key.clone(),
            reason,
        };
        if self.key.trim().is_empty() {
            return Err(invalid("key must not be empty".into()));
        }
        if self.page < 1 {
            return Err(invalid("page numbers start at 1".into()));
        }
        for (name, v) in [("x", self.x), ("y", self.y), ("w", self.w), ("h", self.h)] {
            if !v.is_finite() || v < 0.0 {
                return Err(invalid(format!("{name} must be a non-negative number, got {v}")));
            }
        }
        Ok(())
    }
}

impl PixelRect {
    /// Map this pixel rectangle back to points on a page `page_height_pt`
    /// tall rendered at `scale`. Inverse of [`Field::pixel_rect`] up to
    /// rounding (half a pixel, i.e. `0.5 / scale` points).
    pub fn to_document(&self, page_height_pt: f32, scale: f32) -> DocRect {
        let w = self.width as f32 / scale;
        let h = self.height as f32 / scale;
        DocRect {
            x: self.x as f32 / scale,
            y: page_height_pt - self.y as f32 / scale - h,
            w,
            h,
        }
    }

    /// True when the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Immutable, validated table of fields in display order.
///
/// Order matters: when two fields overlap on a preview, the later one is
/// drawn on top.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRegistry {
    fields: Vec<Field>,
}

impl FieldRegistry {
    /// Validate and wrap a list of fields.
    pub fn new(fields: Vec<Field>) -> Result<Self, FormStampError> {
        let mut seen = HashSet::new();
        for f in &fields {
            f.validate()?;
            if !seen.insert(f.key.as_str()) {
                return Err(FormStampError::InvalidField {
                    key: f.key.clone(),
                    reason: "duplicate key".into(),
                });
            }
        }
        Ok(Self { fields })
    }

    /// The six-field consent form shipped with the application.
    pub fn default_form() -> Self {
        Self {
            fields: vec![
                Field::new("name", "Name", 1, 482.0, 479.0, 59.0, 41.0),
                Field::new("phone", "Phone", 1, 120.0, 630.0, 260.0, 40.0),
                Field::new("birth", "Birth date", 1, 120.0, 580.0, 260.0, 40.0),
                Field::new("userid", "User ID", 1, 120.0, 530.0, 220.0, 40.0),
                Field::new("consent", "Consent", 1, 120.0, 120.0, 120.0, 40.0),
                Field::new("sign", "Signature", 1, 380.0, 360.0, 220.0, 60.0),
            ],
        }
    }

    /// Parse a JSON array of fields.
    pub fn from_json(json: &str) -> Result<Self, FormStampError> {
        let fields: Vec<Field> = serde_json::from_str(json)
            .map_err(|e| FormStampError::InvalidConfig(format!("field table: {e}")))?;
        Self::new(fields)
    }

    /// Read a JSON field table from disk.
    pub fn from_path(path: &Path) -> Result<Self, FormStampError> {
        let json = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FormStampError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => FormStampError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => FormStampError::InvalidConfig(format!("{}: {e}", path.display())),
        })?;
        Self::from_json(&json)
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields anchored to `page` (1-based), in registry order.
    pub fn fields_on_page(&self, page: usize) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(move |f| f.page == page)
    }

    /// Distinct page numbers referenced by any field, ascending.
    pub fn pages(&self) -> Vec<usize> {
        let mut pages: Vec<usize> = self.fields.iter().map(|f| f.page).collect();
        pages.sort_unstable();
        pages.dedup();
        pages
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::default_form()
    }
}
