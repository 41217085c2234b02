//! Storage -> FTP relocation as a resumable saga.
//!
//! Each move is written to the intent log before any bytes move:
//!
//! 1. `pending`: intent recorded
//! 2. download from the object store
//! 3. upload to the file host, then `uploaded`
//! 4. delete the original, then `completed`
//!
//! A failed download or upload marks the intent `failed` and leaves the
//! original alone. A failed delete leaves the intent `uploaded`; the move still
//! counts as done because the public copy exists. `resume` finishes both kinds
//! of leftovers.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{dated_remote_path, FileHost, ObjectPath, ObjectStore, RemotePath, StorageError};
use crate::models::{IntentState, RelocationIntent};
use crate::repository::{DieselError, DieselRelocationRepository};

#[derive(Debug, Error)]
pub enum RelocationError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Intent log error: {0}")]
    Database(#[from] DieselError),
}

/// One move request.
#[derive(Debug, Clone)]
pub struct RelocationRequest {
    pub bucket: String,
    pub key: String,
    pub username: String,
    pub filename: String,
}

/// Result of a successful move.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelocationOutcome {
    pub intent_id: String,
    pub url: String,
    pub path: String,
    pub source_deleted: bool,
}

/// Counters from a resume pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResumeReport {
    pub examined: usize,
    pub completed: usize,
    pub still_uploaded: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct Relocator {
    source: Arc<dyn ObjectStore>,
    host: Arc<dyn FileHost>,
    intents: DieselRelocationRepository,
}

impl Relocator {
    pub fn new(
        source: Arc<dyn ObjectStore>,
        host: Arc<dyn FileHost>,
        intents: DieselRelocationRepository,
    ) -> Self {
        Self {
            source,
            host,
            intents,
        }
    }

    /// Move one object, dating the remote directory by `now`.
    pub async fn relocate(
        &self,
        request: &RelocationRequest,
        now: DateTime<Utc>,
    ) -> Result<RelocationOutcome, RelocationError> {
        let remote = dated_remote_path(&request.username, &request.filename, now)?;
        let intent = RelocationIntent::new(
            &request.bucket,
            &request.key,
            &request.username,
            &request.filename,
            &remote.dir,
            &self.host.public_url(&remote),
        );
        self.intents.create(&intent).await?;
        debug!("Recorded relocation intent {}", intent.id);

        self.run(&intent, &remote).await
    }

    /// Steps 2-4 for a recorded intent.
    async fn run(
        &self,
        intent: &RelocationIntent,
        remote: &RemotePath,
    ) -> Result<RelocationOutcome, RelocationError> {
        let source = ObjectPath::new(&intent.source_bucket, &intent.source_key);
        self.intents.begin_attempt(&intent.id).await?;

        let bytes = match self.source.download(&source).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.fail(intent, &e).await?;
                return Err(e.into());
            }
        };

        if let Err(e) = self.host.upload(remote, bytes).await {
            self.fail(intent, &e).await?;
            return Err(e.into());
        }
        self.intents
            .set_state(&intent.id, IntentState::Uploaded, None)
            .await?;
        info!("Relocated {} to {}", source, remote.full_path());

        let source_deleted = self.delete_source(intent, &source).await?;

        Ok(RelocationOutcome {
            intent_id: intent.id.clone(),
            url: intent.public_url.clone(),
            path: remote.full_path(),
            source_deleted,
        })
    }

    async fn fail(&self, intent: &RelocationIntent, e: &StorageError) -> Result<(), DieselError> {
        warn!("Relocation {} failed: {}", intent.id, e);
        self.intents
            .set_state(&intent.id, IntentState::Failed, Some(&e.to_string()))
            .await
    }

    /// Best-effort delete of the original. Returns whether it is gone.
    async fn delete_source(
        &self,
        intent: &RelocationIntent,
        source: &ObjectPath,
    ) -> Result<bool, DieselError> {
        match self.source.delete(source).await {
            Ok(()) | Err(StorageError::NotFound(_)) => {
                self.intents
                    .set_state(&intent.id, IntentState::Completed, None)
                    .await?;
                Ok(true)
            }
            Err(e) => {
                warn!(
                    "Could not delete {} after relocation (intent {}): {}",
                    source, intent.id, e
                );
                self.intents
                    .set_state(&intent.id, IntentState::Uploaded, Some(&e.to_string()))
                    .await?;
                Ok(false)
            }
        }
    }

    /// Finish leftovers: retry deletes for `uploaded` intents and re-run
    /// `pending` intents idle for longer than `grace`.
    pub async fn resume(&self, grace: Duration) -> Result<ResumeReport, RelocationError> {
        let cutoff = Utc::now() - grace;
        let leftovers = self.intents.unfinished(cutoff).await?;
        let mut report = ResumeReport {
            examined: leftovers.len(),
            ..Default::default()
        };

        for intent in leftovers {
            let source = ObjectPath::new(&intent.source_bucket, &intent.source_key);
            let deleted = match intent.state {
                IntentState::Uploaded => {
                    self.intents.begin_attempt(&intent.id).await?;
                    self.delete_source(&intent, &source).await?
                }
                IntentState::Pending => {
                    let remote = RemotePath {
                        dir: intent.remote_dir.clone(),
                        filename: intent.filename.clone(),
                    };
                    match self.run(&intent, &remote).await {
                        Ok(outcome) => outcome.source_deleted,
                        Err(RelocationError::Storage(_)) => {
                            report.failed += 1;
                            continue;
                        }
                        Err(e) => return Err(e),
                    }
                }
                IntentState::Completed | IntentState::Failed => continue,
            };

            if deleted {
                report.completed += 1;
            } else {
                report.still_uploaded += 1;
            }
        }

        info!(
            "Resume: {} examined, {} completed, {} still uploaded, {} failed",
            report.examined, report.completed, report.still_uploaded, report.failed
        );
        Ok(report)
    }
}

/// In-memory stores for exercising the relocation flow.
#[cfg(test)]
pub(crate) mod fakes {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    pub struct MemoryObjectStore {
        pub objects: Mutex<HashMap<String, Vec<u8>>>,
        pub fail_delete: AtomicBool,
        pub deletes: AtomicUsize,
    }

    impl MemoryObjectStore {
        pub fn with_object(path: &ObjectPath, bytes: &[u8]) -> Self {
            let store = Self::default();
            store
                .objects
                .lock()
                .unwrap()
                .insert(path.to_string(), bytes.to_vec());
            store
        }

        pub fn contains(&self, path: &ObjectPath) -> bool {
            self.objects.lock().unwrap().contains_key(&path.to_string())
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryObjectStore {
        async fn download(&self, path: &ObjectPath) -> Result<Vec<u8>, StorageError> {
            self.objects
                .lock()
                .unwrap()
                .get(&path.to_string())
                .cloned()
                .ok_or_else(|| StorageError::NotFound(path.to_string()))
        }

        async fn upload(
            &self,
            path: &ObjectPath,
            bytes: Vec<u8>,
            _content_type: &str,
        ) -> Result<(), StorageError> {
            self.objects
                .lock()
                .unwrap()
                .insert(path.to_string(), bytes);
            Ok(())
        }

        async fn delete(&self, path: &ObjectPath) -> Result<(), StorageError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(StorageError::Upstream {
                    status: 503,
                    message: "unavailable".into(),
                });
            }
            self.objects.lock().unwrap().remove(&path.to_string());
            Ok(())
        }

        fn public_url(&self, path: &ObjectPath) -> String {
            format!("https://storage.test/{}", path)
        }
    }

    #[derive(Default)]
    pub struct MemoryFileHost {
        pub files: Mutex<HashMap<String, Vec<u8>>>,
        pub fail_upload: AtomicBool,
    }

    #[async_trait]
    impl FileHost for MemoryFileHost {
        async fn upload(&self, remote: &RemotePath, bytes: Vec<u8>) -> Result<(), StorageError> {
            if self.fail_upload.load(Ordering::SeqCst) {
                return Err(StorageError::Ftp("550 permission denied".into()));
            }
            self.files
                .lock()
                .unwrap()
                .insert(remote.full_path(), bytes);
            Ok(())
        }

        fn public_url(&self, remote: &RemotePath) -> String {
            remote.public_url("https://img.test")
        }
    }
}
