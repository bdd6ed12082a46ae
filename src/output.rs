//! Values produced by the pipeline: rendered pages, stamped documents and
//! upload receipts.

use crate::fields::{Field, PixelRect};
use crate::pipeline::encode;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// One rasterised page together with the geometry needed to map fields onto it.
///
/// A render pass produces a whole `Vec<RenderedPage>` at a single `scale`;
/// pages from different passes are never mixed.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    /// 1-based page number.
    pub page: usize,
    /// The raster, opaque background.
    pub image: RgbaImage,
    /// Page width in points.
    pub w_pt: f32,
    /// Page height in points.
    pub h_pt: f32,
    /// Pixels per point used for `image`.
    pub scale: f32,
}

impl RenderedPage {
    pub fn img_w(&self) -> u32 {
        self.image.width()
    }

    pub fn img_h(&self) -> u32 {
        self.image.height()
    }

    /// Where `field` lands on this raster.
    pub fn field_rect(&self, field: &Field) -> PixelRect {
        field.pixel_rect(self.h_pt, self.scale)
    }

    /// Geometry without pixels.
    pub fn info(&self) -> PageInfo {
        PageInfo {
            page: self.page,
            img_w: self.img_w(),
            img_h: self.img_h(),
            w_pt: self.w_pt,
            h_pt: self.h_pt,
            scale: self.scale,
        }
    }

    /// PNG bytes of the raster.
    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        encode::encode_png(&self.image)
    }
}

/// Serializable geometry of a rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: usize,
    pub img_w: u32,
    pub img_h: u32,
    pub w_pt: f32,
    pub h_pt: f32,
    pub scale: f32,
}

/// Final document bytes with every captured signature embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampedDocument {
    pub bytes: Vec<u8>,
    /// Keys that were actually stamped, in registry order.
    pub stamped_keys: Vec<String>,
}

/// What Drive reports back after an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub web_content_link: Option<String>,
}

/// Result of stamping and uploading in one step.
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    pub document: StampedDocument,
    pub receipt: UploadReceipt,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_parses_drive_payload() {
        let json = r#"{
            "id": "1xYz",
            "name": "form_stamped.pdf",
            "parents": ["folder9"],
            "webViewLink": "https://drive.google.com/file/d/1xYz/view"
        }"#;
        let r: UploadReceipt = serde_json::from_str(json).unwrap();
        assert_eq!(r.id, "1xYz");
        assert_eq!(r.parents, vec!["folder9".to_string()]);
        assert!(r.web_view_link.is_some());
        assert!(r.web_content_link.is_none());
    }

    #[test]
    fn receipt_without_optional_fields() {
        let r: UploadReceipt = serde_json::from_str(r#"{"id":"a","name":"b.pdf"}"#).unwrap();
        assert!(r.parents.is_empty());
    }

    #[test]
    fn page_info_mirrors_image() {
        let page = RenderedPage {
            page: 1,
            image: RgbaImage::new(1190, 1684),
            w_pt: 595.0,
            h_pt: 842.0,
            scale: 2.0,
        };
        let info = page.info();
        assert_eq!((info.img_w, info.img_h), (1190, 1684));
        assert_eq!(info.h_pt, 842.0);
    }
}
