//! Google Drive integration: fetch source documents and upload stamped ones.
//!
//! Authentication uses a service account whose key-file JSON is supplied
//! through an environment variable (see
//! [`crate::config::StampConfig::credentials_env`]). The variable is read
//! each time a client is built and never written.

pub mod client;
pub mod credentials;

pub use client::{validate_file_id, DriveClient};
pub use credentials::{AccessTokenProvider, ServiceAccountKey, ServiceAccountTokens, StaticToken};

use crate::error::FormStampError;
use crate::output::UploadReceipt;
use async_trait::async_trait;

/// Scope used to fetch documents.
pub const SCOPE_READONLY: &str = "https://www.googleapis.com/auth/drive.readonly";

/// Scope used to create files.
pub const SCOPE_FILE: &str = "https://www.googleapis.com/auth/drive.file";

/// Pushes finished documents to remote storage.
///
/// Not idempotent: every call creates a new remote file.
#[async_trait]
pub trait RemoteUploader: Send + Sync {
    async fn upload(
        &self,
        bytes: &[u8],
        filename: &str,
        folder_id: Option<&str>,
    ) -> Result<UploadReceipt, FormStampError>;
}
