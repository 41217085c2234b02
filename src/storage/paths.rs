//! Dated directory layout on the public file host.

use chrono::{DateTime, Datelike, Utc};

use super::StorageError;

/// Root directory for generated images on the file host.
pub const GENERATED_ROOT: &str = "/generated";

/// Web path the file host's FTP root is served under.
pub const PUBLIC_PREFIX: &str = "/user_pics";

/// A file location on the public host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    /// Absolute directory, e.g. `/generated/alice/2025/03`.
    pub dir: String,
    pub filename: String,
}

impl RemotePath {
    /// Full FTP path of the file.
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.dir, self.filename)
    }

    /// Public URL under the given base.
    pub fn public_url(&self, base_url: &str) -> String {
        format!(
            "{}{}{}",
            base_url.trim_end_matches('/'),
            PUBLIC_PREFIX,
            self.full_path()
        )
    }

    /// Directory segments, for creating the chain one level at a time.
    pub fn dir_segments(&self) -> impl Iterator<Item = &str> {
        self.dir.split('/').filter(|s| !s.is_empty())
    }
}

/// Reject names that could escape the user's directory.
pub fn validate_segment(field: &'static str, value: &str) -> Result<(), StorageError> {
    let reason = if value.trim().is_empty() {
        Some("must not be empty")
    } else if value.contains('/') || value.contains('\\') {
        Some("must not contain path separators")
    } else if value.contains("..") {
        Some("must not contain '..'")
    } else if value.chars().any(|c| c.is_control()) {
        Some("must not contain control characters")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StorageError::InvalidName {
            field,
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// `/generated/{username}/{YYYY}/{MM}/{filename}` for the given instant (UTC).
pub fn dated_remote_path(
    username: &str,
    filename: &str,
    now: DateTime<Utc>,
) -> Result<RemotePath, StorageError> {
    validate_segment("username", username)?;
    validate_segment("filename", filename)?;

    Ok(RemotePath {
        dir: format!(
            "{}/{}/{}/{:02}",
            GENERATED_ROOT,
            username,
            now.year(),
            now.month()
        ),
        filename: filename.to_string(),
    })
}
