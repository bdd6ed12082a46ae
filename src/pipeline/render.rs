//! PDF rasterisation: render every page at one fixed scale via pdfium.
//!
//! The whole document is rendered in a single pass with a single scale
//! factor, and that factor is stored on each [`RenderedPage`]. Overlays and
//! capture-surface sizing read the scale back from the page, so they cannot
//! drift from the raster they are drawn on.
//!
//! pdfium is CPU-bound and not async-safe, so the work runs inside
//! `tokio::task::spawn_blocking`.

use crate::engine;
use crate::error::FormStampError;
use crate::output::RenderedPage;
use pdfium_render::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

/// Rasterise all pages of `pdf` at `scale` pixels per point.
pub async fn render_pages(pdf: Arc<[u8]>, scale: f32) -> Result<Vec<RenderedPage>, FormStampError> {
    tokio::task::spawn_blocking(move || {
        engine::with_pdfium(|pdfium| render_pages_blocking(pdfium, &pdf, scale))
    })
    .await
    .map_err(|e| FormStampError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of page rendering.
pub fn render_pages_blocking(
    pdfium: &Pdfium,
    pdf: &[u8],
    scale: f32,
) -> Result<Vec<RenderedPage>, FormStampError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(FormStampError::InvalidConfig(format!(
            "render scale must be positive, got {scale}"
        )));
    }

    let document = engine::open_document(pdfium, pdf)?;
    let pages = document.pages();
    info!("PDF loaded: {} pages, rendering at {}x", pages.len(), scale);

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let mut results = Vec::with_capacity(pages.len() as usize);

    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            FormStampError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image().to_rgba8();
        debug!(
            "Rendered page {} → {}x{} px ({}x{} pt)",
            idx + 1,
            image.width(),
            image.height(),
            page.width().value,
            page.height().value
        );

        results.push(RenderedPage {
            page: idx + 1,
            image,
            w_pt: page.width().value,
            h_pt: page.height().value,
            scale,
        });
    }

    Ok(results)
}

/// Page count of a document held in memory, without rendering.
pub async fn page_count(pdf: Arc<[u8]>) -> Result<usize, FormStampError> {
    tokio::task::spawn_blocking(move || {
        engine::with_pdfium(|pdfium| {
            let document = engine::open_document(pdfium, &pdf)?;
            Ok(document.pages().len() as usize)
        })
    })
    .await
    .map_err(|e| FormStampError::Internal(format!("Page-count task panicked: {}", e)))?
}
