//! Queue document repositories.
//!
//! `JsonQueueRepository` stores the queue as one pretty-printed JSON document
//! replaced atomically on every save. `MemoryQueueRepository` keeps it in
//! memory for tests and throwaway sessions.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use readcast_core::{QUEUE_DOCUMENT_VERSION, QueueDocument, QueueRepository, RepositoryError};
use tracing::{debug, warn};

/// Suffix given to an unreadable document before it is replaced.
const CORRUPT_SUFFIX: &str = "corrupt";

/// File-backed queue repository (`queue.json`).
#[derive(Debug, Clone)]
pub struct JsonQueueRepository {
    path: PathBuf,
}

impl JsonQueueRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move an unparseable document aside so the next save does not
    /// destroy it.
    async fn quarantine(&self) {
        let target = self.path.with_extension(CORRUPT_SUFFIX);
        if let Err(e) = tokio::fs::rename(&self.path, &target).await {
            warn!(path = %self.path.display(), error = %e, "Failed to move corrupt queue document aside");
        } else {
            warn!(path = %target.display(), "Moved corrupt queue document aside");
        }
    }
}

/// Parse a stored document, checking the schema version first so a newer
/// layout is reported as such rather than as corruption.
fn parse_document(bytes: &[u8]) -> Result<QueueDocument, RepositoryError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| RepositoryError::Corrupt(e.to_string()))?;

    let found = value
        .get("version")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| RepositoryError::Corrupt("missing version".to_string()))?;
    let found = u32::try_from(found).map_err(|_| RepositoryError::UnsupportedVersion {
        found: u32::MAX,
        expected: QUEUE_DOCUMENT_VERSION,
    })?;
    if found != QUEUE_DOCUMENT_VERSION {
        return Err(RepositoryError::UnsupportedVersion {
            found,
            expected: QUEUE_DOCUMENT_VERSION,
        });
    }

    serde_json::from_value(value).map_err(|e| RepositoryError::Corrupt(e.to_string()))
}

#[async_trait]
impl QueueRepository for JsonQueueRepository {
    async fn load(&self) -> Result<Option<QueueDocument>, RepositoryError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RepositoryError::Read(e.to_string())),
        };

        match parse_document(&bytes) {
            Ok(doc) => {
                debug!(items = doc.items.len(), path = %self.path.display(), "Loaded queue document");
                Ok(Some(doc))
            }
            Err(e @ RepositoryError::Corrupt(_)) => {
                self.quarantine().await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn save(&self, document: &QueueDocument) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|e| RepositoryError::Write(e.to_string()))?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || readcast_core::atomic_write(&path, &bytes))
            .await
            .map_err(|e| RepositoryError::Write(format!("write task failed: {e}")))?
            .map_err(|e| RepositoryError::Write(e.to_string()))?;

        debug!(items = document.items.len(), path = %self.path.display(), "Saved queue document");
        Ok(())
    }
}

/// In-memory queue repository.
#[derive(Debug, Default)]
pub struct MemoryQueueRepository {
    document: Mutex<Option<QueueDocument>>,
    saves: Mutex<usize>,
    fail_writes: Mutex<bool>,
}

impl MemoryQueueRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document.
    #[must_use]
    pub fn with_document(document: QueueDocument) -> Self {
        Self {
            document: Mutex::new(Some(document)),
            ..Self::default()
        }
    }

    /// The last saved document.
    pub fn document(&self) -> Option<QueueDocument> {
        self.document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap_or_else(PoisonError::into_inner) = fail;
    }
}

#[async_trait]
impl QueueRepository for MemoryQueueRepository {
    async fn load(&self) -> Result<Option<QueueDocument>, RepositoryError> {
        Ok(self.document())
    }

    async fn save(&self, document: &QueueDocument) -> Result<(), RepositoryError> {
        if *self.fail_writes.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(RepositoryError::Write("simulated write failure".to_string()));
        }
        *self.document.lock().unwrap_or_else(PoisonError::into_inner) = Some(document.clone());
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}
