//! pdfium binding.
//!
//! pdfium keeps process-global state: `FPDF_InitLibrary` runs when a
//! [`Pdfium`] is bound and `FPDF_DestroyLibrary` when it is dropped. Two
//! overlapping instances would tear each other down, so every use goes
//! through [`with_pdfium`], which holds a process-wide lock for the
//! lifetime of the binding.
//!
//! Library lookup order:
//!
//! 1. `PDFIUM_LIB_PATH`: a library file, or a directory containing one
//! 2. the current working directory
//! 3. the `pdfium-auto` cache, downloading the pinned pdfium build on first
//!    use (`PDFIUM_AUTO_CACHE_DIR` moves the cache)
//! 4. the system library search path, when the download is not possible

use crate::error::FormStampError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Environment variable pointing at a pdfium library (file or directory).
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

static PDFIUM_LOCK: Mutex<()> = Mutex::new(());

/// Bind to pdfium and run `f` with exclusive access to it.
pub fn with_pdfium<T>(
    f: impl FnOnce(&Pdfium) -> Result<T, FormStampError>,
) -> Result<T, FormStampError> {
    let _guard = PDFIUM_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    let pdfium = bind_pdfium()?;
    f(&pdfium)
}

/// True when a pdfium library can be bound right now.
pub fn is_available() -> bool {
    with_pdfium(|_| Ok(())).is_ok()
}

fn bind_pdfium() -> Result<Pdfium, FormStampError> {
    if let Some(lib) = std::env::var(PDFIUM_LIB_PATH_ENV)
        .ok()
        .and_then(|raw| library_override(&raw))
    {
        debug!("Binding pdfium from {}={}", PDFIUM_LIB_PATH_ENV, lib.display());
        return bind_from_path(&lib);
    }

    let local = Pdfium::pdfium_platform_library_name_at_path("./");
    if local.exists() {
        debug!("Binding pdfium from {}", local.display());
        return bind_from_path(&local);
    }

    match pdfium_auto::bind_pdfium_silent() {
        Ok(pdfium) => Ok(pdfium),
        Err(auto_err) => {
            debug!("pdfium-auto unavailable ({}), trying system library", auto_err);
            Pdfium::bind_to_system_library()
                .map(Pdfium::new)
                .map_err(|e| {
                    FormStampError::PdfiumBindingFailed(format!(
                        "{auto_err}; system library: {e:?}"
                    ))
                })
        }
    }
}

/// Resolve a `PDFIUM_LIB_PATH` value to a library file. A directory maps to
/// the platform library name inside it; blank values are ignored.
fn library_override(raw: &str) -> Option<PathBuf> {
    let path = PathBuf::from(raw.trim());
    if path.as_os_str().is_empty() {
        return None;
    }
    if path.is_dir() {
        Some(Pdfium::pdfium_platform_library_name_at_path(&path))
    } else {
        Some(path)
    }
}

fn bind_from_path(lib: &Path) -> Result<Pdfium, FormStampError> {
    pdfium_auto::bind_pdfium_from_path(lib)
        .map_err(|e| FormStampError::PdfiumBindingFailed(e.to_string()))
}

/// Open a document held in memory. pdfium only reads `bytes`.
pub(crate) fn open_document<'a>(
    pdfium: &'a Pdfium,
    bytes: &'a [u8],
) -> Result<PdfDocument<'a>, FormStampError> {
    pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
        let detail = format!("{:?}", e);
        if detail.contains("Password") || detail.contains("password") {
            FormStampError::CorruptPdf {
                detail: format!("document is encrypted ({detail})"),
            }
        } else {
            FormStampError::CorruptPdf { detail }
        }
    })
}
