//! Document sources: where the PDF bytes come from.
//!
//! Three interchangeable providers implement [`DocumentSource`]:
//!
//! * [`BundledFile`]: a file shipped next to the application (`form.pdf`)
//! * [`UploadedBytes`]: bytes the user handed over (upload widget, stdin)
//! * [`DriveFile`]: a Google Drive file fetched by identifier
//!
//! Every provider checks the `%PDF` magic before returning so callers get a
//! meaningful error rather than a pdfium parse failure.

use crate::drive::DriveClient;
use crate::error::FormStampError;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};

/// Anything that can produce PDF bytes.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Human-readable origin, used in logs and error messages.
    fn describe(&self) -> String;

    /// Produce the document bytes.
    async fn fetch(&self) -> Result<Vec<u8>, FormStampError>;
}

/// A PDF file on local disk.
#[derive(Debug, Clone)]
pub struct BundledFile {
    pub path: PathBuf,
}

impl BundledFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DocumentSource for BundledFile {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<Vec<u8>, FormStampError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => FormStampError::PermissionDenied {
                path: self.path.clone(),
            },
            _ => FormStampError::FileNotFound {
                path: self.path.clone(),
            },
        })?;
        check_pdf_magic(&bytes, &self.describe())?;
        debug!("Read bundled PDF: {} ({} bytes)", self.path.display(), bytes.len());
        Ok(bytes)
    }
}

/// Bytes supplied directly by the user.
#[derive(Debug, Clone)]
pub struct UploadedBytes {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedBytes {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Drain an upload stream into memory.
    pub async fn read_from<R>(name: impl Into<String>, mut reader: R) -> Result<Self, FormStampError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let name = name.into();
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| FormStampError::InvalidInput {
                input: name.clone(),
                reason: format!("failed to read upload: {e}"),
            })?;
        Ok(Self { name, bytes })
    }
}

#[async_trait]
impl DocumentSource for UploadedBytes {
    fn describe(&self) -> String {
        format!("upload '{}'", self.name)
    }

    async fn fetch(&self) -> Result<Vec<u8>, FormStampError> {
        check_pdf_magic(&self.bytes, &self.describe())?;
        Ok(self.bytes.clone())
    }
}

/// A Google Drive file, fetched with service-account credentials.
pub struct DriveFile {
    pub file_id: String,
    client: DriveClient,
}

impl DriveFile {
    pub fn new(file_id: impl Into<String>, client: DriveClient) -> Self {
        Self {
            file_id: file_id.into().trim().to_string(),
            client,
        }
    }
}

#[async_trait]
impl DocumentSource for DriveFile {
    fn describe(&self) -> String {
        format!("drive:{}", self.file_id)
    }

    async fn fetch(&self) -> Result<Vec<u8>, FormStampError> {
        info!("Fetching PDF from Drive: {}", self.file_id);
        let bytes = self.client.download(&self.file_id).await?;
        check_pdf_magic(&bytes, &self.describe())?;
        Ok(bytes)
    }
}

/// How a command-line input string names a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// A local path.
    Bundled(PathBuf),
    /// `-`: read from standard input.
    Stdin,
    /// `drive:<FILE_ID>`.
    Drive(String),
}

impl SourceSpec {
    pub fn parse(input: &str) -> Result<Self, FormStampError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(FormStampError::InvalidInput {
                input: input.to_string(),
                reason: "empty input".into(),
            });
        }
        if input == "-" {
            return Ok(Self::Stdin);
        }
        if let Some(id) = input.strip_prefix("drive:") {
            let id = id.trim();
            if id.is_empty() {
                return Err(FormStampError::InvalidInput {
                    input: input.to_string(),
                    reason: "a Drive file id is required after 'drive:'".into(),
                });
            }
            return Ok(Self::Drive(id.to_string()));
        }
        Ok(Self::Bundled(PathBuf::from(input)))
    }
}

/// Reject bytes that do not start with `%PDF`.
pub fn check_pdf_magic(bytes: &[u8], origin: &str) -> Result<(), FormStampError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        return Err(FormStampError::NotAPdf {
            origin: origin.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_source_specs() {
        assert_eq!(SourceSpec::parse("-").unwrap(), SourceSpec::Stdin);
        assert_eq!(
            SourceSpec::parse("drive:1AbCdef").unwrap(),
            SourceSpec::Drive("1AbCdef".into())
        );
        assert_eq!(
            SourceSpec::parse("form.pdf").unwrap(),
            SourceSpec::Bundled(PathBuf::from("form.pdf"))
        );
        assert!(SourceSpec::parse("drive:  ").is_err());
        assert!(SourceSpec::parse("").is_err());
    }

    #[test]
    fn magic_check() {
        assert!(check_pdf_magic(b"%PDF-1.7\n", "x").is_ok());
        let err = check_pdf_magic(b"PK\x03\x04zip", "x").unwrap_err();
        assert!(matches!(err, FormStampError::NotAPdf { ref magic, .. } if magic == b"PK\x03\x04"));
        assert!(check_pdf_magic(b"", "x").is_err());
    }

    #[tokio::test]
    async fn bundled_file_missing_is_not_found() {
        let err = BundledFile::new("/definitely/not/here/form.pdf")
            .fetch()
            .await
            .unwrap_err();
        assert!(matches!(err, FormStampError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn bundled_file_reads_pdf() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.4\n%%EOF\n").unwrap();
        let bytes = BundledFile::new(tmp.path()).fetch().await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn upload_rejects_non_pdf() {
        let src = UploadedBytes::new("notes.txt", b"hello".to_vec());
        assert!(matches!(
            src.fetch().await.unwrap_err(),
            FormStampError::NotAPdf { .. }
        ));
    }

    #[tokio::test]
    async fn upload_reads_from_stream() {
        let reader: &[u8] = b"%PDF-1.5 rest";
        let src = UploadedBytes::read_from("stdin", reader).await.unwrap();
        assert_eq!(src.fetch().await.unwrap(), b"%PDF-1.5 rest".to_vec());
        assert_eq!(src.describe(), "upload 'stdin'");
    }
}
