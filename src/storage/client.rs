use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Opaque token identifying one revision of a stored path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionTag(pub String);

impl RevisionTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }
}

impl fmt::Display for RevisionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a path must hold for a commit to be accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// Create or overwrite, whatever is stored.
    Any,
    /// Create only. Rejected if the path already exists.
    Absent,
    /// Replace exactly this revision.
    Revision(RevisionTag),
}

impl Expectation {
    /// Whether the commit is rejected when the stored revision does not match.
    pub fn is_checked(&self) -> bool {
        !matches!(self, Expectation::Any)
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Any => f.write_str("any"),
            Expectation::Absent => f.write_str("none (create only)"),
            Expectation::Revision(tag) => write!(f, "{tag}"),
        }
    }
}

/// Current content of a path together with the revision it was read at.
///
/// `content` is still in the store's transport encoding (base64).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub content: String,
    pub revision: RevisionTag,
}

/// Path-addressed, revisioned remote store.
///
/// Abstracted as a trait so tests can run against an in-process store or a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the current content of `path`. Returns `None` if the path was never written.
    async fn fetch(&self, path: &str) -> Result<Option<StoredBlob>, AppError>;

    /// Write transport-encoded `content` to `path`.
    ///
    /// The write is rejected with [`AppError::Conflict`] when the path does not
    /// satisfy `expected`. Returns the new revision.
    async fn commit(
        &self,
        path: &str,
        content: String,
        expected: crate::storage::client::Expectation,
        message: &str,
    ) -> Result<RevisionTag, AppError>;
}
