//! Image encoding: `RgbaImage` ⇄ PNG bytes, and base64 data-URIs for display.
//!
//! Captures are kept as PNG bytes (lossless, alpha preserved) so a session
//! can hold them cheaply and hand them to either the compositor or the
//! stamper. Preview pages are handed to front ends as `data:image/png` URIs.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// Encode an RGBA raster as PNG.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img.clone()).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    debug!("Encoded {}x{} image → {} PNG bytes", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// Decode PNG (or any format `image` was built with) into RGBA.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, image::ImageError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Wrap PNG bytes in a `data:image/png;base64,…` URI.
pub fn png_data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}
