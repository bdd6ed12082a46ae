//! Error types for the formstamp library.
//!
//! Every operation that touches the outside world (loading a document,
//! stamping, talking to Drive) returns `Err(FormStampError)` instead of
//! panicking. Callers turn the error into a user-visible message and keep
//! their session in its pre-operation state; nothing here is fatal to the
//! process.
//!
//! [`ErrorCategory`] groups the variants into the five families a front end
//! cares about (configuration, not-found, validation, transport,
//! composition) so it can pick an icon or wording without matching on every
//! variant.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the formstamp library.
#[derive(Debug, Error)]
pub enum FormStampError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// The service-account credential variable is unset or empty.
    #[error("Environment variable {var} is required for Google Drive access.\nExport the service-account JSON into it and retry.")]
    MissingCredentials { var: String },

    /// The credential blob was present but could not be used.
    #[error("Invalid service-account credentials: {detail}")]
    InvalidCredentials { detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A field descriptor violates the registry invariants.
    #[error("Invalid field '{key}': {reason}")]
    InvalidField { key: String, reason: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Place libpdfium next to the binary, install it system-wide, or set\n\
PDFIUM_LIB_PATH=/path/to/libpdfium (a file or the directory containing it).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Not-found errors ──────────────────────────────────────────────────
    /// Bundled or local document was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The Drive file identifier does not resolve to a readable file.
    #[error("Drive file '{file_id}' was not found or is not shared with the service account")]
    DriveFileNotFound { file_id: String },

    /// A field points at a page the document does not have.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Validation errors ─────────────────────────────────────────────────
    /// The input string is not a usable document source.
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// The bytes obtained from a source are not a PDF.
    #[error("Document from {origin} is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { origin: String, magic: Vec<u8> },

    /// A capture was confirmed without anything drawn on it.
    #[error("Nothing was drawn for field '{key}'; draw a signature before applying it")]
    EmptyCapture { key: String },

    /// A capture was confirmed for a key the registry does not know.
    #[error("No field with key '{key}' exists in the registry")]
    UnknownField { key: String },

    /// Stamping was requested with no captured signatures at all.
    #[error("No signatures have been applied yet")]
    NoCaptures,

    /// An operation needs a loaded document but none is loaded.
    #[error("No PDF is loaded; load a document first")]
    NoDocumentLoaded,

    // ── Transport errors ──────────────────────────────────────────────────
    /// Token exchange or Drive API rejected the credentials.
    #[error("Google Drive authentication failed: {detail}")]
    AuthFailed { detail: String },

    /// Remote fetch failed.
    #[error("Failed to download Drive file '{file_id}': {reason}")]
    DownloadFailed { file_id: String, reason: String },

    /// Remote upload failed.
    #[error("Failed to upload '{filename}' to Google Drive: {reason}")]
    UploadFailed { filename: String, reason: String },

    // ── Composition errors ────────────────────────────────────────────────
    /// pdfium could not parse the document.
    #[error("PDF is corrupt or unreadable: {detail}")]
    CorruptPdf { detail: String },

    /// pdfium returned an error while rasterising a page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// A captured raster could not be decoded or encoded.
    #[error("Image for field '{key}' is unusable: {detail}")]
    ImageCodec { key: String, detail: String },

    /// Embedding a capture into the document failed; no output was produced.
    #[error("Failed to stamp field '{key}' on page {page}: {detail}")]
    StampFailed {
        key: String,
        page: usize,
        detail: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write a local output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse grouping of [`FormStampError`] variants for user-facing reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    NotFound,
    Validation,
    Transport,
    Composition,
    Internal,
}

impl FormStampError {
    /// Which family this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        use FormStampError::*;
        match self {
            MissingCredentials { .. }
            | InvalidCredentials { .. }
            | InvalidConfig(_)
            | InvalidField { .. }
            | PdfiumBindingFailed(_) => ErrorCategory::Configuration,
            FileNotFound { .. }
            | PermissionDenied { .. }
            | DriveFileNotFound { .. }
            | PageOutOfRange { .. } => ErrorCategory::NotFound,
            InvalidInput { .. }
            | NotAPdf { .. }
            | EmptyCapture { .. }
            | UnknownField { .. }
            | NoCaptures
            | NoDocumentLoaded => ErrorCategory::Validation,
            AuthFailed { .. } | DownloadFailed { .. } | UploadFailed { .. } => {
                ErrorCategory::Transport
            }
            CorruptPdf { .. }
            | RasterisationFailed { .. }
            | ImageCodec { .. }
            | StampFailed { .. } => ErrorCategory::Composition,
            OutputWriteFailed { .. } | Internal(_) => ErrorCategory::Internal,
        }
    }
}
