//! Image storage back ends.
//!
//! Two stores are involved: Supabase Storage (objects addressed by bucket and
//! key) and the public FTP host (files addressed by a dated directory and a
//! filename). Both sit behind traits so the relocation flow can be exercised
//! without either service.

pub mod ftp;
pub mod paths;
pub mod relocation;
pub mod supabase;

use async_trait::async_trait;
use thiserror::Error;

pub use ftp::FtpFileHost;
pub use paths::{dated_remote_path, validate_segment, RemotePath};
pub use relocation::{
    RelocationError, RelocationOutcome, RelocationRequest, Relocator, ResumeReport,
};
pub use supabase::SupabaseStorage;

/// Errors from either storage back end.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid {field}: {reason}")]
    InvalidName { field: &'static str, reason: String },

    #[error("Storage request failed ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Storage connection failed: {0}")]
    Connection(String),

    #[error("FTP error: {0}")]
    Ftp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Object key inside a Supabase Storage bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPath {
    pub bucket: String,
    pub key: String,
}

impl ObjectPath {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into().trim_start_matches('/').to_string(),
        }
    }
}

impl std::fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Object storage (Supabase Storage in production).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn download(&self, path: &ObjectPath) -> Result<Vec<u8>, StorageError>;

    async fn upload(
        &self,
        path: &ObjectPath,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    async fn delete(&self, path: &ObjectPath) -> Result<(), StorageError>;

    fn public_url(&self, path: &ObjectPath) -> String;
}

/// Public file host (FTP in production).
#[async_trait]
pub trait FileHost: Send + Sync {
    /// Upload bytes, creating the directory chain if needed.
    async fn upload(&self, remote: &RemotePath, bytes: Vec<u8>) -> Result<(), StorageError>;

    fn public_url(&self, remote: &RemotePath) -> String;
}

/// Decode an image payload that may be a `data:` URL or bare base64.
///
/// Returns the bytes and the MIME type declared by the data URL, if any.
pub fn decode_image_payload(payload: &str) -> Result<(Vec<u8>, Option<String>), StorageError> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    let payload = payload.trim();
    let (mime, encoded) = match payload.strip_prefix("data:") {
        Some(rest) => match rest.split_once(',') {
            Some((meta, data)) => {
                let mime = meta.trim_end_matches(";base64").to_string();
                (Some(mime).filter(|m| !m.is_empty()), data)
            }
            None => {
                return Err(StorageError::InvalidName {
                    field: "imageData",
                    reason: "malformed data URL".to_string(),
                })
            }
        },
        None => (None, payload),
    };

    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| StorageError::InvalidName {
            field: "imageData",
            reason: format!("invalid base64: {}", e),
        })?;

    if bytes.is_empty() {
        return Err(StorageError::InvalidName {
            field: "imageData",
            reason: "empty payload".to_string(),
        });
    }

    Ok((bytes, mime))
}

/// Best guess at a content type: declared, then sniffed, then by extension.
pub fn detect_content_type(bytes: &[u8], declared: Option<&str>, filename: &str) -> String {
    if let Some(declared) = declared.filter(|d| !d.is_empty()) {
        return declared.to_string();
    }
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
