//! Preview compositing: draw captured signatures onto rendered pages.
//!
//! The output is for display only. It is rebuilt from the page raster and a
//! capture snapshot on every call and never written back anywhere, so
//! compositing the same inputs twice gives the same pixels.

use crate::error::FormStampError;
use crate::fields::FieldRegistry;
use crate::output::RenderedPage;
use crate::session::CaptureSnapshot;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::debug;

/// Overlay every captured field that lives on `page`.
///
/// Fields are drawn in registry order, so a later field covers an earlier
/// one where they overlap. Fields without a capture are skipped; captures
/// whose key has no field are never looked at.
pub fn composite_page(
    page: &RenderedPage,
    registry: &FieldRegistry,
    captures: &CaptureSnapshot,
) -> Result<RgbaImage, FormStampError> {
    let mut base = page.image.clone();

    for field in registry.fields_on_page(page.page) {
        let Some(capture) = captures.get(&field.key) else {
            continue;
        };
        let rect = page.field_rect(field);
        if rect.is_empty() {
            debug!("Field '{}' is smaller than a pixel at scale {}", field.key, page.scale);
            continue;
        }

        let sig = capture.decode().map_err(|e| FormStampError::ImageCodec {
            key: field.key.clone(),
            detail: e.to_string(),
        })?;
        let resized = imageops::resize(&sig, rect.width, rect.height, FilterType::Lanczos3);
        imageops::overlay(&mut base, &resized, rect.x, rect.y);
        debug!(
            "Composited '{}' at ({}, {}) {}x{} on page {}",
            field.key, rect.x, rect.y, rect.width, rect.height, page.page
        );
    }

    Ok(base)
}

/// Composite every page of one render pass.
pub fn composite_pages(
    pages: &[RenderedPage],
    registry: &FieldRegistry,
    captures: &CaptureSnapshot,
) -> Result<Vec<RgbaImage>, FormStampError> {
    pages
        .iter()
        .map(|p| composite_page(p, registry, captures))
        .collect()
}
