//! Document stamping: embed captured rasters into the PDF at field rectangles.
//!
//! Field rectangles are already in PDF user space (origin bottom-left), which
//! is what pdfium expects, so no coordinate flip happens here. Each image is
//! stretched to exactly `w` × `h` points; the field decides the final size,
//! not the capture's aspect ratio.
//!
//! The original bytes are only ever read. pdfium parses them into a fresh
//! in-memory document, every embed happens on that copy, and the copy is
//! dropped without being saved if any embed fails. Callers get either a
//! complete stamped document or an error.

use crate::engine;
use crate::error::FormStampError;
use crate::fields::FieldRegistry;
use crate::output::StampedDocument;
use crate::session::CaptureSnapshot;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

/// Stamp every captured field of `registry` into `original`.
pub async fn stamp_document(
    original: Arc<[u8]>,
    registry: Arc<FieldRegistry>,
    captures: CaptureSnapshot,
) -> Result<StampedDocument, FormStampError> {
    tokio::task::spawn_blocking(move || {
        engine::with_pdfium(|pdfium| stamp_document_blocking(pdfium, &original, &registry, &captures))
    })
    .await
    .map_err(|e| FormStampError::Internal(format!("Stamp task panicked: {}", e)))?
}

/// Blocking implementation of stamping.
pub fn stamp_document_blocking(
    pdfium: &Pdfium,
    original: &[u8],
    registry: &FieldRegistry,
    captures: &CaptureSnapshot,
) -> Result<StampedDocument, FormStampError> {
    let document = engine::open_document(pdfium, original)?;
    let total_pages = document.pages().len() as usize;
    let mut stamped_keys = Vec::new();

    for field in registry.iter() {
        let Some(capture) = captures.get(&field.key) else {
            continue;
        };
        if field.w <= 0.0 || field.h <= 0.0 {
            debug!("Skipping zero-area field '{}'", field.key);
            continue;
        }
        if field.page > total_pages {
            return Err(FormStampError::PageOutOfRange {
                page: field.page,
                total: total_pages,
            });
        }

        let raster = capture.decode().map_err(|e| FormStampError::ImageCodec {
            key: field.key.clone(),
            detail: e.to_string(),
        })?;

        let stamp_failed = |e: PdfiumError| FormStampError::StampFailed {
            key: field.key.clone(),
            page: field.page,
            detail: format!("{:?}", e),
        };

        let mut page = document
            .pages()
            .get((field.page - 1) as u16)
            .map_err(stamp_failed)?;

        page.objects_mut()
            .create_image_object(
                PdfPoints::new(field.x),
                PdfPoints::new(field.y),
                &DynamicImage::ImageRgba8(raster),
                Some(PdfPoints::new(field.w)),
                Some(PdfPoints::new(field.h)),
            )
            .map_err(stamp_failed)?;

        debug!(
            "Stamped '{}' on page {} at ({}, {}) {}x{} pt",
            field.key, field.page, field.x, field.y, field.w, field.h
        );
        stamped_keys.push(field.key.clone());
    }

    let bytes = document
        .save_to_bytes()
        .map_err(|e| FormStampError::Internal(format!("Failed to serialise stamped PDF: {:?}", e)))?;

    info!(
        "Stamped {} field(s) → {} bytes",
        stamped_keys.len(),
        bytes.len()
    );

    Ok(StampedDocument {
        bytes,
        stamped_keys,
    })
}
