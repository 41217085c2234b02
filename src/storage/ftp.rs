//! Public image host reached over FTP.
//!
//! suppaftp's blocking client runs on the blocking pool; each upload opens its
//! own session and closes it before returning.

use std::io::Cursor;

use async_trait::async_trait;
use suppaftp::types::FileType;
use suppaftp::FtpStream;
use tracing::{debug, info, warn};

use super::{FileHost, RemotePath, StorageError};
use crate::config::FtpCredentials;

#[derive(Clone)]
pub struct FtpFileHost {
    credentials: FtpCredentials,
}

impl FtpFileHost {
    pub fn new(credentials: FtpCredentials) -> Self {
        Self { credentials }
    }
}

fn ftp_err(context: &str, e: suppaftp::FtpError) -> StorageError {
    StorageError::Ftp(format!("{}: {}", context, e))
}

/// Change into each directory segment from the root, creating missing ones.
fn ensure_dir(ftp: &mut FtpStream, remote: &RemotePath) -> Result<(), StorageError> {
    ftp.cwd("/").map_err(|e| ftp_err("cwd /", e))?;
    for segment in remote.dir_segments() {
        if ftp.cwd(segment).is_err() {
            debug!("Creating remote directory segment {}", segment);
            ftp.mkdir(segment)
                .map_err(|e| ftp_err(&format!("mkdir {}", segment), e))?;
            ftp.cwd(segment)
                .map_err(|e| ftp_err(&format!("cwd {}", segment), e))?;
        }
    }
    Ok(())
}

fn upload_blocking(
    credentials: &FtpCredentials,
    remote: &RemotePath,
    bytes: Vec<u8>,
) -> Result<u64, StorageError> {
    let addr = format!("{}:{}", credentials.host, credentials.port);
    let mut ftp = FtpStream::connect(addr.as_str()).map_err(|e| ftp_err("connect", e))?;

    let result = (|| {
        ftp.login(credentials.user.as_str(), credentials.password.as_str())
            .map_err(|e| ftp_err("login", e))?;
        ftp.transfer_type(FileType::Binary)
            .map_err(|e| ftp_err("binary mode", e))?;
        ensure_dir(&mut ftp, remote)?;
        let mut reader = Cursor::new(bytes);
        ftp.put_file(remote.filename.as_str(), &mut reader)
            .map_err(|e| ftp_err("upload", e))
    })();

    // The session is closed whether or not the upload went through.
    if let Err(e) = ftp.quit() {
        warn!("FTP quit failed: {}", e);
    }

    result
}

#[async_trait]
impl FileHost for FtpFileHost {
    async fn upload(&self, remote: &RemotePath, bytes: Vec<u8>) -> Result<(), StorageError> {
        let credentials = self.credentials.clone();
        let target = remote.clone();
        let size = bytes.len();

        let written = tokio::task::spawn_blocking(move || upload_blocking(&credentials, &target, bytes))
            .await
            .map_err(|e| StorageError::Ftp(format!("upload task failed: {}", e)))??;

        info!(
            "Uploaded {} bytes ({} written) to {}",
            size,
            written,
            remote.full_path()
        );
        Ok(())
    }

    fn public_url(&self, remote: &RemotePath) -> String {
        remote.public_url(&self.credentials.base_url)
    }
}
