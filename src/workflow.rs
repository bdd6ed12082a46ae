//! Session-level operations: one call per user action.
//!
//! [`FormSession`] is the explicit context every operation runs against:
//! the injected field table, the configuration, the loaded document and its
//! rendered pages, and the capture mapping. Each method either completes and
//! updates the session, or fails and leaves the session exactly as it was.
//! Nothing here runs concurrently with anything else in the same session.

use crate::capture::{CaptureSurface, CapturedSignature};
use crate::config::{normalise_folder_id, StampConfig};
use crate::drive::RemoteUploader;
use crate::error::FormStampError;
use crate::fields::FieldRegistry;
use crate::output::{FinalizeOutcome, RenderedPage, StampedDocument};
use crate::pipeline::source::DocumentSource;
use crate::pipeline::{composite, render, stamp};
use crate::session::{CaptureSession, CaptureSnapshot};
use image::RgbaImage;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// State of one interactive signing session.
pub struct FormSession {
    registry: Arc<FieldRegistry>,
    config: StampConfig,
    document: Option<Arc<[u8]>>,
    pages: Vec<RenderedPage>,
    captures: CaptureSession,
}

impl FormSession {
    pub fn new(registry: Arc<FieldRegistry>, config: StampConfig) -> Self {
        Self {
            registry,
            config,
            document: None,
            pages: Vec::new(),
            captures: CaptureSession::new(),
        }
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn config(&self) -> &StampConfig {
        &self.config
    }

    pub fn pages(&self) -> &[RenderedPage] {
        &self.pages
    }

    pub fn document(&self) -> Option<&[u8]> {
        self.document.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    /// Fetch a document and render it at the configured zoom.
    ///
    /// On success the document, its pages and an empty capture mapping
    /// replace whatever the session held. On failure nothing changes.
    pub async fn load(&mut self, source: &dyn DocumentSource) -> Result<(), FormStampError> {
        let start = Instant::now();
        info!("Loading PDF from {}", source.describe());

        let bytes: Arc<[u8]> = source.fetch().await?.into();
        let pages = render::render_pages(Arc::clone(&bytes), self.config.zoom).await?;

        for field in self.registry.iter() {
            if field.page > pages.len() {
                warn!(
                    "Field '{}' targets page {} but the document has {} page(s)",
                    field.key,
                    field.page,
                    pages.len()
                );
            }
        }

        self.document = Some(bytes);
        self.pages = pages;
        self.captures.reset();
        info!(
            "Loaded {} page(s) in {}ms",
            self.pages.len(),
            start.elapsed().as_millis()
        );
        Ok(())
    }

    /// Re-render the loaded document at a new zoom. Captures are kept: they
    /// are stored at surface resolution and rescaled on every composite.
    pub async fn rerender(&mut self, zoom: f32) -> Result<(), FormStampError> {
        let bytes = self.document.clone().ok_or(FormStampError::NoDocumentLoaded)?;
        let config = StampConfig::builder().zoom(zoom).build()?;
        let pages = render::render_pages(bytes, config.zoom).await?;
        self.config.zoom = config.zoom;
        self.pages = pages;
        Ok(())
    }

    /// The rendered page with number `page`, if loaded.
    pub fn page(&self, page: usize) -> Option<&RenderedPage> {
        self.pages.iter().find(|p| p.page == page)
    }

    /// A blank drawing surface sized for `key` at the current render scale.
    pub fn surface_for(&self, key: &str) -> Result<CaptureSurface, FormStampError> {
        let field = self
            .registry
            .get(key)
            .ok_or_else(|| FormStampError::UnknownField { key: key.to_string() })?;
        let scale = self
            .page(field.page)
            .map(|p| p.scale)
            .unwrap_or(self.config.zoom);
        let (w, h) = field.surface_size(
            scale,
            self.config.min_surface_width,
            self.config.min_surface_height,
        );
        Ok(CaptureSurface::new(w, h, self.config.stroke_width))
    }

    /// Apply a drawing to field `key`.
    pub fn confirm(&mut self, key: &str, signature: CapturedSignature) -> Result<(), FormStampError> {
        if !self.registry.contains(key) {
            return Err(FormStampError::UnknownField { key: key.to_string() });
        }
        self.captures.confirm(key, signature)
    }

    /// Apply a drawing surface to field `key`.
    pub fn confirm_surface(&mut self, key: &str, surface: &CaptureSurface) -> Result<(), FormStampError> {
        if surface.is_blank() {
            return Err(FormStampError::EmptyCapture { key: key.to_string() });
        }
        let signature = CapturedSignature::from_surface(surface).map_err(|e| {
            FormStampError::ImageCodec {
                key: key.to_string(),
                detail: e.to_string(),
            }
        })?;
        self.confirm(key, signature)
    }

    /// Remove the drawing for `key`; absent keys are ignored.
    pub fn clear(&mut self, key: &str) -> bool {
        self.captures.clear(key)
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        self.captures.snapshot()
    }

    /// Composited preview of every page.
    pub fn preview(&self) -> Result<Vec<RgbaImage>, FormStampError> {
        if self.document.is_none() {
            return Err(FormStampError::NoDocumentLoaded);
        }
        composite::composite_pages(&self.pages, &self.registry, &self.snapshot())
    }

    /// Embed every capture into a fresh copy of the loaded document.
    pub async fn stamp(&self) -> Result<StampedDocument, FormStampError> {
        let bytes = self.document.clone().ok_or(FormStampError::NoDocumentLoaded)?;
        let captures = self.snapshot();
        if captures.is_empty() {
            return Err(FormStampError::NoCaptures);
        }
        stamp::stamp_document(bytes, Arc::clone(&self.registry), captures).await
    }

    /// Stamp, then upload. Either both succeed or the error is returned.
    ///
    /// `filename` falls back to the configured output name. `folder_id`
    /// falls back to the configured folder only when it is `None`; an
    /// explicit blank folder uploads to the Drive root.
    pub async fn finalize(
        &self,
        uploader: &dyn RemoteUploader,
        filename: Option<&str>,
        folder_id: Option<&str>,
    ) -> Result<FinalizeOutcome, FormStampError> {
        let document = self.stamp().await?;
        self.upload(document, uploader, filename, folder_id).await
    }

    /// Stamp, write the result to `local`, then upload the same bytes.
    ///
    /// The local copy is written before the upload starts, so it survives
    /// an upload failure.
    pub async fn finalize_with_copy(
        &self,
        uploader: &dyn RemoteUploader,
        filename: Option<&str>,
        folder_id: Option<&str>,
        local: &Path,
    ) -> Result<FinalizeOutcome, FormStampError> {
        let document = self.stamp().await?;
        save_atomic(local, &document.bytes)?;
        self.upload(document, uploader, filename, folder_id).await
    }

    /// Upload folder for an explicit `folder_id` argument.
    fn resolve_folder(&self, folder_id: Option<&str>) -> Option<String> {
        match folder_id {
            Some(f) => normalise_folder_id(f),
            None => self.config.folder_id.clone(),
        }
    }

    async fn upload(
        &self,
        document: StampedDocument,
        uploader: &dyn RemoteUploader,
        filename: Option<&str>,
        folder_id: Option<&str>,
    ) -> Result<FinalizeOutcome, FormStampError> {
        let filename = filename
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(&self.config.output_filename);
        let folder = self.resolve_folder(folder_id);

        let receipt = uploader
            .upload(&document.bytes, filename, folder.as_deref())
            .await?;
        Ok(FinalizeOutcome { document, receipt })
    }
}

/// Write `bytes` to `path` atomically (temp file in the same directory, then
/// rename), so a failed write never leaves a truncated PDF behind.
pub fn save_atomic(path: &Path, bytes: &[u8]) -> Result<(), FormStampError> {
    let write_failed = |source: std::io::Error| FormStampError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_failed)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_failed)?;
    tmp.write_all(bytes).map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;
    info!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
