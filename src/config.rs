//! Configuration types for form stamping.
//!
//! All behaviour that is not the field table itself is controlled through
//! [`StampConfig`], built via its [`StampConfigBuilder`]. The field table is
//! deliberately kept out of here: it lives in [`crate::fields::FieldRegistry`]
//! and is injected separately so tests can swap it without touching the
//! rest of the configuration.

use crate::error::FormStampError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default preview zoom (`px = pt * zoom`).
pub const DEFAULT_ZOOM: f32 = 2.0;

/// Default name for the stamped output document.
pub const OUTPUT_PDF_NAME: &str = "form_stamped.pdf";

/// Environment variable holding the service-account JSON blob.
pub const CREDENTIALS_ENV: &str = "GOOGLE_CREDENTIALS_JSON";

/// Environment variable holding the default upload folder.
pub const FOLDER_ENV: &str = "DRIVE_FOLDER_ID";

/// Zoom bounds accepted by the builder.
pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 3.0;

/// Configuration for a form-stamping session.
///
/// Built via [`StampConfig::builder()`] or using [`StampConfig::default()`].
///
/// # Example
/// ```rust
/// use formstamp::StampConfig;
///
/// let config = StampConfig::builder()
///     .zoom(1.5)
///     .output_filename("contract_signed.pdf")
///     .build()
///     .unwrap();
/// assert_eq!(config.zoom, 1.5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StampConfig {
    /// Rasterisation scale for previews. Range: 1.0–3.0. Default: 2.0.
    ///
    /// One render pass uses exactly one zoom; overlays are computed with the
    /// zoom recorded on each rendered page, never with this field directly.
    pub zoom: f32,

    /// Location of the document bundled with the application. Default: `form.pdf`.
    pub bundled_path: PathBuf,

    /// Filename used for downloads and uploads. Default: `form_stamped.pdf`.
    pub output_filename: String,

    /// Default Drive folder for uploads. `None` means the top level of the
    /// service account's drive.
    pub folder_id: Option<String>,

    /// Name of the environment variable with the service-account JSON.
    pub credentials_env: String,

    /// Drive API base URLs.
    pub endpoints: DriveEndpoints,

    /// Transport timeout for Drive calls in seconds. Default: 120.
    pub http_timeout_secs: u64,

    /// Minimum capture-surface width in pixels. Default: 120.
    pub min_surface_width: u32,

    /// Minimum capture-surface height in pixels. Default: 40.
    pub min_surface_height: u32,

    /// Pen width on capture surfaces, in pixels. Default: 2.0.
    pub stroke_width: f32,
}

impl Default for StampConfig {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            bundled_path: PathBuf::from("form.pdf"),
            output_filename: OUTPUT_PDF_NAME.to_string(),
            folder_id: None,
            credentials_env: CREDENTIALS_ENV.to_string(),
            endpoints: DriveEndpoints::default(),
            http_timeout_secs: 120,
            min_surface_width: 120,
            min_surface_height: 40,
            stroke_width: 2.0,
        }
    }
}

impl StampConfig {
    /// Create a new builder for `StampConfig`.
    pub fn builder() -> StampConfigBuilder {
        StampConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`StampConfig`].
#[derive(Debug)]
pub struct StampConfigBuilder {
    config: StampConfig,
}

impl StampConfigBuilder {
    pub fn zoom(mut self, zoom: f32) -> Self {
        self.config.zoom = if zoom.is_finite() {
            zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            zoom
        };
        self
    }

    pub fn bundled_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.bundled_path = path.into();
        self
    }

    pub fn output_filename(mut self, name: impl Into<String>) -> Self {
        self.config.output_filename = name.into();
        self
    }

    /// Blank or whitespace-only ids select the top-level location.
    pub fn folder_id(mut self, id: impl AsRef<str>) -> Self {
        self.config.folder_id = normalise_folder_id(id.as_ref());
        self
    }

    pub fn credentials_env(mut self, var: impl Into<String>) -> Self {
        self.config.credentials_env = var.into();
        self
    }

    pub fn endpoints(mut self, endpoints: DriveEndpoints) -> Self {
        self.config.endpoints = endpoints;
        self
    }

    pub fn http_timeout_secs(mut self, secs: u64) -> Self {
        self.config.http_timeout_secs = secs.max(1);
        self
    }

    pub fn min_surface_size(mut self, width: u32, height: u32) -> Self {
        self.config.min_surface_width = width;
        self.config.min_surface_height = height;
        self
    }

    pub fn stroke_width(mut self, width: f32) -> Self {
        self.config.stroke_width = width;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<StampConfig, FormStampError> {
        let c = &self.config;
        if !c.zoom.is_finite() || c.zoom <= 0.0 {
            return Err(FormStampError::InvalidConfig(format!(
                "zoom must be a positive number, got {}",
                c.zoom
            )));
        }
        if c.output_filename.trim().is_empty() {
            return Err(FormStampError::InvalidConfig(
                "output filename must not be empty".into(),
            ));
        }
        if !c.stroke_width.is_finite() || c.stroke_width <= 0.0 {
            return Err(FormStampError::InvalidConfig(format!(
                "stroke width must be positive, got {}",
                c.stroke_width
            )));
        }
        if c.credentials_env.is_empty() {
            return Err(FormStampError::InvalidConfig(
                "credentials variable name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Base URLs of the Google Drive v3 API.
///
/// Production values are the default; tests point these at a local mock
/// server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveEndpoints {
    /// Metadata/media endpoint, e.g. `https://www.googleapis.com/drive/v3`.
    pub api_base: String,
    /// Upload endpoint, e.g. `https://www.googleapis.com/upload/drive/v3`.
    pub upload_base: String,
}

impl Default for DriveEndpoints {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com/drive/v3".to_string(),
            upload_base: "https://www.googleapis.com/upload/drive/v3".to_string(),
        }
    }
}

impl DriveEndpoints {
    /// Point both endpoints at one server root (used with mock servers).
    pub fn with_root(root: &str) -> Self {
        let root = root.trim_end_matches('/');
        Self {
            api_base: format!("{root}/drive/v3"),
            upload_base: format!("{root}/upload/drive/v3"),
        }
    }
}

/// Reduce a folder id or a `…/folders/<id>` share link to the bare id.
/// Blank input means "no folder".
pub fn normalise_folder_id(id: &str) -> Option<String> {
    let mut id = id.trim();
    if let Some((_, rest)) = id.split_once("/folders/") {
        id = rest.split(['/', '?', '#']).next().unwrap_or_default();
    }
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}
