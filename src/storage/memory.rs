use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::storage::client::{BlobStore, Expectation, RevisionTag, StoredBlob};

/// One accepted write, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub path: String,
    pub message: String,
    pub revision: RevisionTag,
}

#[derive(Default)]
struct Inner {
    objects: HashMap<String, StoredBlob>,
    history: Vec<CommitRecord>,
}

/// In-process [`BlobStore`] with the same revision semantics as the remote one.
///
/// Revision tags are content hashes salted with a per-store sequence number, so
/// rewriting identical bytes still advances the revision.
#[derive(Default)]
pub struct MemoryBlobStore {
    inner: Mutex<Inner>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every accepted commit, oldest first.
    pub fn history(&self) -> Vec<CommitRecord> {
        self.lock().history.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Every update is a single insert/push, so a poisoned map is still consistent.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn revision_for(sequence: usize, path: &str, content: &str) -> RevisionTag {
    let mut hasher = Sha256::new();
    hasher.update(sequence.to_le_bytes());
    hasher.update(path.as_bytes());
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(20).map(|b| format!("{b:02x}")).collect();
    RevisionTag(hex)
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn fetch(&self, path: &str) -> Result<Option<StoredBlob>, AppError> {
        Ok(self.lock().objects.get(path).cloned())
    }

    async fn commit(
        &self,
        path: &str,
        content: String,
        expected: Expectation,
        message: &str,
    ) -> Result<RevisionTag, AppError> {
        let mut inner = self.lock();

        let current = inner.objects.get(path).map(|blob| &blob.revision);
        let accepted = match &expected {
            Expectation::Any => true,
            Expectation::Absent => current.is_none(),
            Expectation::Revision(tag) => current == Some(tag),
        };
        if !accepted {
            return Err(AppError::Conflict {
                path: path.to_string(),
                expected: expected.to_string(),
            });
        }

        let revision = revision_for(inner.history.len(), path, &content);
        inner.objects.insert(
            path.to_string(),
            StoredBlob {
                content,
                revision: revision.clone(),
            },
        );
        inner.history.push(CommitRecord {
            path: path.to_string(),
            message: message.to_string(),
            revision: revision.clone(),
        });

        Ok(revision)
    }
}
