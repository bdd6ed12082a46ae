//! Google Drive v3 client: media download and multipart upload.

use super::credentials::{AccessTokenProvider, ServiceAccountKey, ServiceAccountTokens};
use super::{RemoteUploader, SCOPE_FILE, SCOPE_READONLY};
use crate::config::{DriveEndpoints, StampConfig};
use crate::error::FormStampError;
use crate::output::UploadReceipt;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Boundary for `multipart/related` upload bodies.
const BOUNDARY_BASE: &str = "formstamp_part_boundary_5c1e9a";

/// Fields requested back from Drive after an upload.
const UPLOAD_FIELDS: &str = "id,name,parents,webViewLink,webContentLink";

static RE_FILE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Authenticated Drive API client.
#[derive(Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    tokens: Arc<dyn AccessTokenProvider>,
    endpoints: DriveEndpoints,
}

impl DriveClient {
    /// Build a client from service-account credentials in the environment
    /// variable named by `config.credentials_env`.
    pub fn from_config(config: &StampConfig) -> Result<Self, FormStampError> {
        let key = ServiceAccountKey::from_env(&config.credentials_env)?;
        let http = build_http(config.http_timeout_secs)?;
        info!("Drive client for service account {}", key.client_email);
        let tokens = Arc::new(ServiceAccountTokens::new(key, http.clone()));
        Ok(Self {
            http,
            tokens,
            endpoints: config.endpoints.clone(),
        })
    }

    /// Build a client around an existing token provider.
    pub fn with_tokens(
        tokens: Arc<dyn AccessTokenProvider>,
        endpoints: DriveEndpoints,
        timeout_secs: u64,
    ) -> Result<Self, FormStampError> {
        Ok(Self {
            http: build_http(timeout_secs)?,
            tokens,
            endpoints,
        })
    }

    /// Download the content of file `file_id`.
    pub async fn download(&self, file_id: &str) -> Result<Vec<u8>, FormStampError> {
        validate_file_id(file_id)?;
        let token = self.tokens.access_token(SCOPE_READONLY).await?;
        let url = format!("{}/files/{}", self.endpoints.api_base, file_id);

        let response = self
            .http
            .get(&url)
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| FormStampError::DownloadFailed {
                file_id: file_id.to_string(),
                reason: transport_reason(&e),
            })?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(FormStampError::DriveFileNotFound {
                    file_id: file_id.to_string(),
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(FormStampError::AuthFailed {
                    detail: format!("HTTP {} fetching '{}'", response.status(), file_id),
                })
            }
            s => {
                return Err(FormStampError::DownloadFailed {
                    file_id: file_id.to_string(),
                    reason: format!("HTTP {s}"),
                })
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FormStampError::DownloadFailed {
                file_id: file_id.to_string(),
                reason: transport_reason(&e),
            })?;
        info!("Downloaded Drive file {} ({} bytes)", file_id, bytes.len());
        Ok(bytes.to_vec())
    }

    /// Create a new PDF file named `filename`, optionally inside `folder_id`.
    pub async fn upload_pdf(
        &self,
        bytes: &[u8],
        filename: &str,
        folder_id: Option<&str>,
    ) -> Result<UploadReceipt, FormStampError> {
        let folder_id = folder_id.map(str::trim).filter(|f| !f.is_empty());
        if let Some(folder) = folder_id {
            validate_file_id(folder)?;
        }
        let token = self.tokens.access_token(SCOPE_FILE).await?;
        let (boundary, body) = multipart_related_body(&upload_metadata(filename, folder_id), bytes);
        let url = format!("{}/files", self.endpoints.upload_base);
        debug!("Uploading '{}' ({} bytes) to {:?}", filename, bytes.len(), folder_id);

        let upload_failed = |reason: String| FormStampError::UploadFailed {
            filename: filename.to_string(),
            reason,
        };

        let response = self
            .http
            .post(&url)
            .query(&[
                ("uploadType", "multipart"),
                ("supportsAllDrives", "true"),
                ("fields", UPLOAD_FIELDS),
            ])
            .bearer_auth(token)
            .header(CONTENT_TYPE, format!("multipart/related; boundary={boundary}"))
            .body(body)
            .send()
            .await
            .map_err(|e| upload_failed(transport_reason(&e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(FormStampError::AuthFailed {
                detail: format!("HTTP {status} uploading '{filename}': {}", body.trim()),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upload_failed(format!("HTTP {status}: {}", body.trim())));
        }

        let receipt: UploadReceipt = response
            .json()
            .await
            .map_err(|e| upload_failed(format!("malformed response: {e}")))?;
        info!("Uploaded '{}' as Drive file {}", receipt.name, receipt.id);
        Ok(receipt)
    }
}

#[async_trait]
impl RemoteUploader for DriveClient {
    async fn upload(
        &self,
        bytes: &[u8],
        filename: &str,
        folder_id: Option<&str>,
    ) -> Result<UploadReceipt, FormStampError> {
        self.upload_pdf(bytes, filename, folder_id).await
    }
}

fn build_http(timeout_secs: u64) -> Result<reqwest::Client, FormStampError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| FormStampError::Internal(format!("HTTP client: {e}")))
}

fn transport_reason(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out: {e}")
    } else {
        e.to_string()
    }
}

/// Drive identifiers are URL-safe base64-ish tokens.
pub fn validate_file_id(id: &str) -> Result<(), FormStampError> {
    if RE_FILE_ID.is_match(id) {
        Ok(())
    } else {
        Err(FormStampError::InvalidInput {
            input: id.to_string(),
            reason: "Drive identifiers contain only letters, digits, '-' and '_'".into(),
        })
    }
}

fn upload_metadata(filename: &str, folder_id: Option<&str>) -> serde_json::Value {
    let mut meta = serde_json::json!({
        "name": filename,
        "mimeType": "application/pdf",
    });
    if let Some(folder) = folder_id {
        meta["parents"] = serde_json::json!([folder]);
    }
    meta
}

/// Assemble a two-part `multipart/related` body: JSON metadata, then the PDF.
/// A boundary that occurs nowhere in `pdf`.
fn pick_boundary(pdf: &[u8]) -> String {
    let contains = |b: &str| pdf.windows(b.len()).any(|w| w == b.as_bytes());
    let mut boundary = BOUNDARY_BASE.to_string();
    let mut n = 0u32;
    while contains(&boundary) {
        n += 1;
        boundary = format!("{BOUNDARY_BASE}_{n}");
    }
    boundary
}

/// Build the two-part body and return it with its boundary.
fn multipart_related_body(metadata: &serde_json::Value, pdf: &[u8]) -> (String, Vec<u8>) {
    let boundary = pick_boundary(pdf);
    let meta = metadata.to_string();
    let mut body = Vec::with_capacity(pdf.len() + meta.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(meta.as_bytes());
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
    body.extend_from_slice(pdf);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (boundary, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_id_validation() {
        assert!(validate_file_id("1AbC-d_9").is_ok());
        assert!(validate_file_id("../etc/passwd").is_err());
        assert!(validate_file_id("a b").is_err());
        assert!(validate_file_id("").is_err());
    }

    #[test]
    fn metadata_includes_parents_only_with_folder() {
        let m = upload_metadata("out.pdf", None);
        assert!(m.get("parents").is_none());
        let m = upload_metadata("out.pdf", Some("F1"));
        assert_eq!(m["parents"], serde_json::json!(["F1"]));
        assert_eq!(m["name"], "out.pdf");
    }

    #[test]
    fn multipart_body_layout() {
        let (boundary, body) =
            multipart_related_body(&serde_json::json!({"name": "x.pdf"}), b"%PDF-1.7");
        assert_eq!(boundary, BOUNDARY_BASE);
        let text = String::from_utf8_lossy(&body);
        assert!(text.starts_with(&format!("--{boundary}\r\n")));
        assert!(text.contains(r#"{"name":"x.pdf"}"#));
        assert!(text.contains("Content-Type: application/pdf\r\n\r\n%PDF-1.7\r\n"));
        assert!(text.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn boundary_avoids_bytes_already_in_the_pdf() {
        let pdf = format!(
            "%PDF-1.7\n% {BOUNDARY_BASE} {BOUNDARY_BASE}_1\n%%EOF\n"
        );
        let (boundary, body) =
            multipart_related_body(&serde_json::json!({"name": "x.pdf"}), pdf.as_bytes());
        assert_eq!(boundary, format!("{BOUNDARY_BASE}_2"));
        assert!(!pdf.contains(&boundary));
        let delimiter = format!("--{boundary}");
        assert_eq!(String::from_utf8_lossy(&body).matches(&delimiter).count(), 3);
    }
}
