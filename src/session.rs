//! Per-session capture state: the latest confirmed signature for each field.
//!
//! Readers never see a half-applied edit. [`CaptureSession::snapshot`] hands
//! out an immutable, reference-counted view of the mapping; later `confirm`
//! or `clear` calls copy-on-write a new map instead of mutating the one an
//! in-flight preview or stamp pass is holding.

use crate::capture::CapturedSignature;
use crate::error::FormStampError;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Immutable view of every confirmed capture, keyed by field key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureSnapshot(Arc<BTreeMap<String, CapturedSignature>>);

impl CaptureSnapshot {
    pub fn get(&self, key: &str) -> Option<&CapturedSignature> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CapturedSignature)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, CapturedSignature)> for CaptureSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, CapturedSignature)>>(iter: I) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

/// Mutable capture mapping owned by one session.
#[derive(Debug, Clone, Default)]
pub struct CaptureSession {
    captures: CaptureSnapshot,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `signature` as the capture for `key`, replacing any earlier one.
    ///
    /// A raster with no visible pixel is an untouched pad and is refused with
    /// [`FormStampError::EmptyCapture`]; the mapping is left as it was.
    pub fn confirm(&mut self, key: &str, signature: CapturedSignature) -> Result<(), FormStampError> {
        let blank = signature.is_blank().map_err(|e| FormStampError::ImageCodec {
            key: key.to_string(),
            detail: e.to_string(),
        })?;
        if blank {
            return Err(FormStampError::EmptyCapture {
                key: key.to_string(),
            });
        }
        Arc::make_mut(&mut self.captures.0).insert(key.to_string(), signature);
        debug!("Capture confirmed for '{}' ({} total)", key, self.captures.len());
        Ok(())
    }

    /// Drop the capture for `key`. Returns whether one was present; clearing
    /// an absent key is not an error.
    pub fn clear(&mut self, key: &str) -> bool {
        if !self.captures.contains(key) {
            return false;
        }
        Arc::make_mut(&mut self.captures.0).remove(key);
        debug!("Capture cleared for '{}'", key);
        true
    }

    /// Drop every capture.
    pub fn reset(&mut self) {
        self.captures = CaptureSnapshot::default();
    }

    /// Immutable copy of the current mapping.
    pub fn snapshot(&self) -> CaptureSnapshot {
        self.captures.clone()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.captures.contains(key)
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureSurface;
    use image::{Rgba, RgbaImage};

    fn drawn(w: u32, h: u32) -> CapturedSignature {
        let mut s = CaptureSurface::new(w, h, 2.0);
        s.begin_stroke(1.0, 1.0);
        s.line_to(w as f32 - 2.0, h as f32 - 2.0);
        CapturedSignature::from_surface(&s).unwrap()
    }

    #[test]
    fn blank_capture_is_refused_and_not_stored() {
        let mut session = CaptureSession::new();
        let blank = CapturedSignature::from_surface(&CaptureSurface::new(440, 120, 2.0)).unwrap();
        let err = session.confirm("sign", blank).unwrap_err();
        assert!(matches!(err, FormStampError::EmptyCapture { ref key } if key == "sign"));
        assert!(!session.contains("sign"));
        assert!(session.is_empty());
    }

    #[test]
    fn zero_sized_capture_is_refused() {
        assert!(matches!(
            CapturedSignature::from_image(&RgbaImage::new(0, 0)),
            Err(image::ImageError::Parameter(_))
        ));
        assert!(CapturedSignature::from_image(&RgbaImage::new(12, 0)).is_err());

        let mut session = CaptureSession::new();
        let untouched = CapturedSignature::from_image(&RgbaImage::new(1, 1)).unwrap();
        let err = session.confirm("name", untouched).unwrap_err();
        assert!(matches!(err, FormStampError::EmptyCapture { ref key } if key == "name"));
        assert!(session.is_empty());
    }

    #[test]
    fn confirm_overwrites_previous_capture() {
        let mut session = CaptureSession::new();
        session.confirm("sign", drawn(10, 10)).unwrap();
        session.confirm("sign", drawn(20, 8)).unwrap();
        assert_eq!(session.len(), 1);
        assert_eq!(session.snapshot().get("sign").map(|s| s.width()), Some(20));
    }

    #[test]
    fn clear_missing_key_is_a_noop() {
        let mut session = CaptureSession::new();
        assert!(!session.clear("nonexistent"));
        assert!(session.is_empty());
    }

    #[test]
    fn clear_removes_entry() {
        let mut session = CaptureSession::new();
        session.confirm("name", drawn(12, 12)).unwrap();
        assert!(session.clear("name"));
        assert!(!session.contains("name"));
    }

    #[test]
    fn snapshot_is_isolated_from_later_edits() {
        let mut session = CaptureSession::new();
        session.confirm("name", drawn(12, 12)).unwrap();
        let snap = session.snapshot();

        session.confirm("sign", drawn(16, 16)).unwrap();
        session.clear("name");

        assert_eq!(snap.keys().collect::<Vec<_>>(), vec!["name"]);
        assert_eq!(session.snapshot().keys().collect::<Vec<_>>(), vec!["sign"]);
    }

    #[test]
    fn translucent_ink_is_not_blank() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]));
        img.put_pixel(2, 2, Rgba([0, 0, 0, 1]));
        let mut session = CaptureSession::new();
        session
            .confirm("consent", CapturedSignature::from_image(&img).unwrap())
            .unwrap();
        assert!(session.contains("consent"));
    }
}
