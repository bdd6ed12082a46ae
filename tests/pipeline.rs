//! Integration tests for the render → capture → preview → stamp pipeline.
//!
//! These need a pdfium shared library. When none can be bound the tests
//! print SKIP and return, so the suite stays green on machines without it.
//!
//! Run with:
//!   PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test --test pipeline -- --nocapture

use async_trait::async_trait;
use formstamp::pipeline::{render, stamp};
use formstamp::{
    engine, save_atomic, BundledFile, CaptureSnapshot, CaptureSurface, CapturedSignature, Field,
    FieldRegistry, FormSession, FormStampError, RemoteUploader, StampConfig, UploadReceipt,
    UploadedBytes,
};
use image::RgbaImage;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Skip this test when pdfium cannot be bound.
macro_rules! skip_unless_pdfium {
    () => {
        if !engine::is_available() {
            println!("SKIP: pdfium library not found (set PDFIUM_LIB_PATH)");
            return;
        }
    };
}

fn session_with(registry: FieldRegistry) -> FormSession {
    FormSession::new(Arc::new(registry), StampConfig::default())
}

fn scribble(width: u32, height: u32) -> CaptureSurface {
    let mut s = CaptureSurface::new(width, height, 4.0);
    s.begin_stroke(4.0, height as f32 / 2.0);
    s.line_to(width as f32 - 4.0, height as f32 / 2.0);
    s.line_to(width as f32 / 2.0, 4.0);
    s.end_stroke();
    s
}

fn is_dark(img: &RgbaImage, x: u32, y: u32) -> bool {
    let p = img.get_pixel(x, y).0;
    p[0] < 96 && p[1] < 96 && p[2] < 96
}

fn dark_pixels_in(img: &RgbaImage, x0: i64, y0: i64, w: u32, h: u32) -> usize {
    let mut n = 0;
    for y in y0.max(0) as u32..(y0 + h as i64).min(img.height() as i64) as u32 {
        for x in x0.max(0) as u32..(x0 + w as i64).min(img.width() as i64) as u32 {
            if is_dark(img, x, y) {
                n += 1;
            }
        }
    }
    n
}

/// Records every upload instead of sending it anywhere.
#[derive(Default)]
struct RecordingUploader {
    calls: Mutex<Vec<(usize, String, Option<String>)>>,
}

#[async_trait]
impl RemoteUploader for RecordingUploader {
    async fn upload(
        &self,
        bytes: &[u8],
        filename: &str,
        folder_id: Option<&str>,
    ) -> Result<UploadReceipt, FormStampError> {
        self.calls.lock().unwrap().push((
            bytes.len(),
            filename.to_string(),
            folder_id.map(str::to_string),
        ));
        Ok(UploadReceipt {
            id: "1Recorded".into(),
            name: filename.to_string(),
            parents: folder_id.map(|f| vec![f.to_string()]).unwrap_or_default(),
            web_view_link: None,
            web_content_link: None,
        })
    }
}

struct FailingUploader;

#[async_trait]
impl RemoteUploader for FailingUploader {
    async fn upload(
        &self,
        _bytes: &[u8],
        filename: &str,
        _folder_id: Option<&str>,
    ) -> Result<UploadReceipt, FormStampError> {
        Err(FormStampError::UploadFailed {
            filename: filename.to_string(),
            reason: "HTTP 500".into(),
        })
    }
}

// ── Render ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn renders_a4_at_default_zoom() {
    skip_unless_pdfium!();
    let mut s = session_with(FieldRegistry::default_form());
    s.load(&BundledFile::new(fixture("form.pdf"))).await.unwrap();

    assert_eq!(s.pages().len(), 1);
    let page = &s.pages()[0];
    assert_eq!((page.w_pt, page.h_pt), (595.0, 842.0));
    assert_eq!(page.scale, 2.0);
    assert_eq!((page.img_w(), page.img_h()), (1190, 1684));

    let name = s.registry().get("name").unwrap();
    let r = page.field_rect(name);
    assert_eq!((r.x, r.y, r.width, r.height), (964, 644, 118, 82));
}

#[tokio::test]
async fn every_page_shares_one_scale() {
    skip_unless_pdfium!();
    let bytes: Arc<[u8]> = std::fs::read(fixture("two_pages.pdf")).unwrap().into();
    let pages = render::render_pages(bytes.clone(), 1.5).await.unwrap();
    assert_eq!(pages.len(), 2);
    assert!(pages.iter().all(|p| p.scale == 1.5));
    assert_eq!((pages[1].w_pt, pages[1].h_pt), (612.0, 792.0));
    assert_eq!(render::page_count(bytes).await.unwrap(), 2);
}

#[tokio::test]
async fn corrupt_upload_is_rejected() {
    skip_unless_pdfium!();
    let mut s = session_with(FieldRegistry::default_form());
    let truncated = UploadedBytes::new("broken.pdf", b"%PDF-1.4\n1 0 obj\n<<".to_vec());
    let err = s.load(&truncated).await.unwrap_err();
    assert!(matches!(err, FormStampError::CorruptPdf { .. }), "got {err:?}");
    assert!(!s.is_loaded());
}

#[tokio::test]
async fn rerender_keeps_captures_and_changes_scale() {
    skip_unless_pdfium!();
    let mut s = session_with(FieldRegistry::default_form());
    s.load(&BundledFile::new(fixture("form.pdf"))).await.unwrap();
    let pad = scribble(440, 120);
    s.confirm_surface("sign", &pad).unwrap();

    s.rerender(1.0).await.unwrap();
    assert_eq!(s.pages()[0].img_w(), 595);
    assert!(s.snapshot().contains("sign"));
    assert_eq!(s.surface_for("sign").unwrap().width(), 220);
}

// ── Preview ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn preview_without_captures_is_the_plain_render() {
    skip_unless_pdfium!();
    let mut s = session_with(FieldRegistry::default_form());
    s.load(&BundledFile::new(fixture("form.pdf"))).await.unwrap();
    let preview = s.preview().unwrap();
    assert_eq!(preview[0], s.pages()[0].image);
}

#[tokio::test]
async fn preview_draws_inside_the_field_only() {
    skip_unless_pdfium!();
    let mut s = session_with(FieldRegistry::default_form());
    s.load(&BundledFile::new(fixture("form.pdf"))).await.unwrap();
    let before = s.pages()[0].image.clone();

    let surface = s.surface_for("sign").unwrap();
    let pad = scribble(surface.width(), surface.height());
    s.confirm_surface("sign", &pad).unwrap();
    let after = &s.preview().unwrap()[0];

    let field = s.registry().get("sign").unwrap();
    let r = s.pages()[0].field_rect(field);
    assert!(dark_pixels_in(after, r.x, r.y, r.width, r.height) > dark_pixels_in(&before, r.x, r.y, r.width, r.height));

    // Pixels well outside the rectangle are untouched.
    for (x, y) in [(10u32, 10u32), (1180, 1670), ((r.x as u32).saturating_sub(20), r.y as u32 + 5)] {
        assert_eq!(after.get_pixel(x, y), before.get_pixel(x, y));
    }
}

#[tokio::test]
async fn preview_is_repeatable() {
    skip_unless_pdfium!();
    let mut s = session_with(FieldRegistry::default_form());
    s.load(&BundledFile::new(fixture("form.pdf"))).await.unwrap();
    s.confirm_surface("name", &scribble(120, 82)).unwrap();
    assert_eq!(s.preview().unwrap(), s.preview().unwrap());
}

// ── Stamp ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn stamp_embeds_ink_at_the_field() {
    skip_unless_pdfium!();
    let mut s = session_with(FieldRegistry::default_form());
    s.load(&BundledFile::new(fixture("form.pdf"))).await.unwrap();
    let original = s.document().unwrap().to_vec();
    s.confirm_surface("sign", &scribble(440, 120)).unwrap();

    let stamped = s.stamp().await.unwrap();
    assert!(stamped.bytes.starts_with(b"%PDF"));
    assert_eq!(stamped.stamped_keys, vec!["sign".to_string()]);
    // The loaded document itself is never modified.
    assert_eq!(s.document().unwrap(), original.as_slice());

    let pages = render::render_pages(stamped.bytes.clone().into(), 2.0).await.unwrap();
    assert_eq!(pages.len(), 1);
    let field = s.registry().get("sign").unwrap();
    let r = pages[0].field_rect(field);
    let plain = &s.pages()[0].image;
    assert!(
        dark_pixels_in(&pages[0].image, r.x, r.y, r.width, r.height)
            > dark_pixels_in(plain, r.x, r.y, r.width, r.height)
    );
}

#[tokio::test]
async fn stamp_is_deterministic_for_the_same_inputs() {
    skip_unless_pdfium!();
    let mut s = session_with(FieldRegistry::default_form());
    s.load(&BundledFile::new(fixture("form.pdf"))).await.unwrap();
    s.confirm_surface("sign", &scribble(440, 120)).unwrap();
    s.confirm_surface("name", &scribble(120, 82)).unwrap();

    let a = s.stamp().await.unwrap();
    let b = s.stamp().await.unwrap();
    assert_eq!(a.stamped_keys, b.stamped_keys);
    let ra = render::render_pages(a.bytes.into(), 1.0).await.unwrap();
    let rb = render::render_pages(b.bytes.into(), 1.0).await.unwrap();
    assert_eq!(ra[0].image, rb[0].image);
}

#[tokio::test]
async fn stamp_without_captures_is_refused() {
    skip_unless_pdfium!();
    let mut s = session_with(FieldRegistry::default_form());
    s.load(&BundledFile::new(fixture("form.pdf"))).await.unwrap();
    assert!(matches!(s.stamp().await.unwrap_err(), FormStampError::NoCaptures));
}

#[tokio::test]
async fn stamping_nothing_leaves_pages_unchanged() {
    skip_unless_pdfium!();
    let pdf: Arc<[u8]> = std::fs::read(fixture("form.pdf")).unwrap().into();
    let registry = Arc::new(FieldRegistry::default_form());

    let out = stamp::stamp_document(Arc::clone(&pdf), registry, CaptureSnapshot::default())
        .await
        .unwrap();
    assert!(out.stamped_keys.is_empty());

    let before = render::render_pages(pdf, 1.0).await.unwrap();
    let after = render::render_pages(out.bytes.into(), 1.0).await.unwrap();
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(&after) {
        assert_eq!(b.image, a.image, "page {} changed", b.page);
    }
}

#[tokio::test]
async fn captures_for_unregistered_keys_are_ignored() {
    skip_unless_pdfium!();
    let pdf: Arc<[u8]> = std::fs::read(fixture("form.pdf")).unwrap().into();
    let ghost = CapturedSignature::from_surface(&scribble(200, 60)).unwrap();
    let captures: CaptureSnapshot = [("ghost".to_string(), ghost)].into_iter().collect();

    let out = stamp::stamp_document(pdf, Arc::new(FieldRegistry::default_form()), captures)
        .await
        .unwrap();
    assert!(out.stamped_keys.is_empty());
    assert!(out.bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn field_past_last_page_fails_whole_stamp() {
    skip_unless_pdfium!();
    let registry = FieldRegistry::new(vec![
        Field::new("first", "First", 1, 100.0, 100.0, 100.0, 40.0),
        Field::new("third", "Third", 3, 100.0, 100.0, 100.0, 40.0),
    ])
    .unwrap();
    let mut s = session_with(registry);
    s.load(&BundledFile::new(fixture("two_pages.pdf"))).await.unwrap();
    s.confirm_surface("first", &scribble(200, 80)).unwrap();
    s.confirm_surface("third", &scribble(200, 80)).unwrap();

    let err = s.stamp().await.unwrap_err();
    assert!(
        matches!(err, FormStampError::PageOutOfRange { page: 3, total: 2 }),
        "got {err:?}"
    );
    assert_eq!(s.snapshot().len(), 2);
}

#[tokio::test]
async fn captured_png_from_disk_stamps_like_a_surface() {
    skip_unless_pdfium!();
    let mut s = session_with(FieldRegistry::default_form());
    s.load(&BundledFile::new(fixture("form.pdf"))).await.unwrap();
    let png = CapturedSignature::from_surface(&scribble(240, 80))
        .unwrap()
        .png()
        .to_vec();
    s.confirm("userid", CapturedSignature::from_png(png).unwrap()).unwrap();
    let stamped = s.stamp().await.unwrap();
    assert_eq!(stamped.stamped_keys, vec!["userid".to_string()]);
}

#[tokio::test]
async fn loading_a_new_document_resets_captures() {
    skip_unless_pdfium!();
    let mut s = session_with(FieldRegistry::default_form());
    s.load(&BundledFile::new(fixture("form.pdf"))).await.unwrap();
    s.confirm_surface("sign", &scribble(440, 120)).unwrap();

    let bytes = std::fs::read(fixture("two_pages.pdf")).unwrap();
    s.load(&UploadedBytes::new("two_pages.pdf", bytes)).await.unwrap();
    assert!(s.snapshot().is_empty());
    assert_eq!(s.pages().len(), 2);
}

// ── Finalize ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn finalize_uploads_stamped_bytes_with_defaults() {
    skip_unless_pdfium!();
    let config = StampConfig::builder().folder_id("CfgFolder").build().unwrap();
    let mut s = FormSession::new(Arc::new(FieldRegistry::default_form()), config);
    s.load(&BundledFile::new(fixture("form.pdf"))).await.unwrap();
    s.confirm_surface("sign", &scribble(440, 120)).unwrap();

    let uploader = RecordingUploader::default();
    let outcome = s.finalize(&uploader, None, None).await.unwrap();
    assert_eq!(outcome.receipt.name, "form_stamped.pdf");
    assert_eq!(outcome.receipt.parents, vec!["CfgFolder".to_string()]);

    let outcome = s.finalize(&uploader, Some("mine.pdf"), Some("Other")).await.unwrap();
    assert_eq!(outcome.receipt.parents, vec!["Other".to_string()]);

    let calls = uploader.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, outcome.document.bytes.len());
    assert_eq!(calls[1].1, "mine.pdf");
}

#[tokio::test]
async fn finalize_surfaces_upload_failure() {
    skip_unless_pdfium!();
    let mut s = session_with(FieldRegistry::default_form());
    s.load(&BundledFile::new(fixture("form.pdf"))).await.unwrap();
    s.confirm_surface("sign", &scribble(440, 120)).unwrap();

    let err = s.finalize(&FailingUploader, None, None).await.unwrap_err();
    assert!(matches!(err, FormStampError::UploadFailed { .. }));
    assert!(s.snapshot().contains("sign"));
}

#[tokio::test]
async fn explicit_blank_folder_uploads_to_root() {
    skip_unless_pdfium!();
    let config = StampConfig::builder().folder_id("CfgFolder").build().unwrap();
    let mut s = FormSession::new(Arc::new(FieldRegistry::default_form()), config);
    s.load(&BundledFile::new(fixture("form.pdf"))).await.unwrap();
    s.confirm_surface("sign", &scribble(440, 120)).unwrap();

    let uploader = RecordingUploader::default();
    let outcome = s.finalize(&uploader, None, Some("  ")).await.unwrap();
    assert!(outcome.receipt.parents.is_empty());
    assert_eq!(uploader.calls.lock().unwrap()[0].2, None);
}

#[tokio::test]
async fn local_copy_survives_upload_failure() {
    skip_unless_pdfium!();
    let mut s = session_with(FieldRegistry::default_form());
    s.load(&BundledFile::new(fixture("form.pdf"))).await.unwrap();
    s.confirm_surface("sign", &scribble(440, 120)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("signed.pdf");
    let err = s
        .finalize_with_copy(&FailingUploader, None, None, &local)
        .await
        .unwrap_err();
    assert!(matches!(err, FormStampError::UploadFailed { .. }));
    let saved = std::fs::read(&local).unwrap();
    assert!(saved.starts_with(b"%PDF"));
}

#[tokio::test]
async fn local_copy_matches_uploaded_bytes() {
    skip_unless_pdfium!();
    let mut s = session_with(FieldRegistry::default_form());
    s.load(&BundledFile::new(fixture("form.pdf"))).await.unwrap();
    s.confirm_surface("sign", &scribble(440, 120)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("signed.pdf");
    let uploader = RecordingUploader::default();
    let outcome = s
        .finalize_with_copy(&uploader, Some("remote.pdf"), None, &local)
        .await
        .unwrap();
    assert_eq!(std::fs::read(&local).unwrap(), outcome.document.bytes);
    let calls = uploader.calls.lock().unwrap();
    assert_eq!(calls[0].0, outcome.document.bytes.len());
    assert_eq!(calls[0].1, "remote.pdf");
}

#[tokio::test]
async fn stamped_document_saves_and_reloads() {
    skip_unless_pdfium!();
    let mut s = session_with(FieldRegistry::default_form());
    s.load(&BundledFile::new(fixture("form.pdf"))).await.unwrap();
    s.confirm_surface("consent", &scribble(240, 80)).unwrap();
    let stamped = s.stamp().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("form_stamped.pdf");
    save_atomic(&path, &stamped.bytes).unwrap();

    let mut reloaded = session_with(FieldRegistry::default_form());
    reloaded.load(&BundledFile::new(&path)).await.unwrap();
    assert_eq!(reloaded.pages().len(), 1);
}
