//! # formstamp
//!
//! Stamp hand-drawn signatures and handwriting into fixed fields of a PDF
//! form, then optionally upload the result to Google Drive.
//!
//! ## How it works
//!
//! A form is described by a [`FieldRegistry`]: named rectangles on pages,
//! in PDF points with the origin at the bottom-left. The document is
//! rasterised once per zoom level, drawings are captured at a resolution
//! matched to each field, and the two meet in one of two places:
//!
//! - **preview**: drawings are scaled onto the rendered page images
//!   (display only, nothing written);
//! - **stamp**: drawings are embedded as image objects into a fresh copy of
//!   the original PDF, which keeps its vector content.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Source     bundled file, uploaded bytes, or Drive download
//!  ├─ 2. Render     rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Capture    strokes → RGBA surface → PNG, one per field
//!  ├─ 4. Preview    composite captures onto rendered pages
//!  ├─ 5. Stamp      embed captures into a copy of the document
//!  └─ 6. Upload     multipart upload to a Drive folder
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use formstamp::{BundledFile, CaptureSurface, FieldRegistry, FormSession, StampConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = FormSession::new(
//!         Arc::new(FieldRegistry::default_form()),
//!         StampConfig::default(),
//!     );
//!     session.load(&BundledFile::new("form.pdf")).await?;
//!
//!     let mut pad: CaptureSurface = session.surface_for("sign")?;
//!     pad.begin_stroke(10.0, 60.0);
//!     pad.line_to(200.0, 40.0);
//!     pad.end_stroke();
//!     session.confirm_surface("sign", &pad)?;
//!
//!     let stamped = session.stamp().await?;
//!     formstamp::save_atomic("form_stamped.pdf".as_ref(), &stamped.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `formstamp` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! formstamp = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod capture;
pub mod config;
pub mod drive;
pub mod engine;
pub mod error;
pub mod fields;
pub mod output;
pub mod pipeline;
pub mod session;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use capture::{CaptureSurface, CapturedSignature, StrokeSet};
pub use config::{DriveEndpoints, StampConfig, StampConfigBuilder};
pub use drive::{DriveClient, RemoteUploader};
pub use error::{ErrorCategory, FormStampError};
pub use fields::{DocRect, Field, FieldRegistry, PixelRect};
pub use output::{FinalizeOutcome, PageInfo, RenderedPage, StampedDocument, UploadReceipt};
pub use pipeline::source::{BundledFile, DocumentSource, DriveFile, SourceSpec, UploadedBytes};
pub use session::{CaptureSession, CaptureSnapshot};
pub use workflow::{save_atomic, FormSession};
