use std::sync::Arc;

use async_trait::async_trait;

use crate::codec::document;
use crate::error::AppError;
use crate::models::block::{self, Block, BlockInput, Visibility};
use crate::storage::client::{BlobStore, Expectation, RevisionTag};

/// A short-lived copy of the collection and the revision it was read at.
///
/// Each mutation is applied to a snapshot and committed against its revision;
/// nothing is cached between calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub blocks: Vec<Block>,
    /// `None` when the document has never been written.
    pub revision: Option<RevisionTag>,
}

/// Whether document commits are guarded by the snapshot's revision tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitMode {
    /// Reject the commit with [`AppError::Conflict`] if the document moved on.
    #[default]
    RevisionChecked,
    /// Overwrite whatever is stored with this snapshot's version of the collection.
    Unconditional,
}

/// Repository trait for block operations.
///
/// Every mutation is one read-modify-write of the whole document. Conflicts are
/// returned to the caller and never retried here.
#[async_trait]
pub trait BlockRepository: Send + Sync {
    /// All blocks. An uninitialised store yields an empty collection.
    async fn list(&self) -> Result<Vec<Block>, AppError>;

    /// Create a block, or replace the one with the same id. Returns the written collection.
    async fn upsert(&self, input: BlockInput) -> Result<Vec<Block>, AppError>;

    /// Remove the block with `id`. Returns the written collection.
    async fn delete(&self, id: &str) -> Result<Vec<Block>, AppError>;

    /// Set the visibility of the block with `id`. Returns the written collection.
    async fn set_visibility(&self, id: &str, visibility: Visibility)
        -> Result<Vec<Block>, AppError>;

    /// Flip the visibility of the block with `id`. Returns the written collection.
    async fn toggle_visibility(&self, id: &str) -> Result<Vec<Block>, AppError>;
}

/// [`BlockRepository`] backed by a single JSON document in a [`BlobStore`].
pub struct RemoteBlockRepository {
    store: Arc<dyn BlobStore>,
    document_path: String,
    mode: CommitMode,
}

impl RemoteBlockRepository {
    pub fn new(store: Arc<dyn BlobStore>, document_path: impl Into<String>) -> Self {
        Self {
            store,
            document_path: document_path.into(),
            mode: CommitMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: CommitMode) -> Self {
        self.mode = mode;
        self
    }

    /// Read the document and the revision it is at.
    pub async fn snapshot(&self) -> Result<Snapshot, AppError> {
        match self.store.fetch(&self.document_path).await? {
            Some(blob) => Ok(Snapshot {
                blocks: document::decode(&blob.content)?,
                revision: Some(blob.revision),
            }),
            None => {
                tracing::debug!(path = %self.document_path, "document not found, starting empty");
                Ok(Snapshot {
                    blocks: Vec::new(),
                    revision: None,
                })
            }
        }
    }

    /// [`BlockRepository::upsert`] against a snapshot the caller already holds.
    pub async fn upsert_at(
        &self,
        snapshot: Snapshot,
        input: BlockInput,
    ) -> Result<Vec<Block>, AppError> {
        input.validate()?;

        let Snapshot {
            mut blocks,
            revision,
        } = snapshot;

        let position = input
            .id
            .as_deref()
            .and_then(|id| blocks.iter().position(|b| b.id == id));
        let record = input.into_block(position.map(|i| &blocks[i]), block::now());
        let id = record.id.clone();

        let message = match position {
            Some(i) => {
                blocks[i] = record;
                format!("Update block {id}")
            }
            None => {
                blocks.push(record);
                "Add new block".to_string()
            }
        };

        self.write(blocks, revision, &message).await
    }

    /// [`BlockRepository::delete`] against a snapshot the caller already holds.
    pub async fn delete_at(&self, snapshot: Snapshot, id: &str) -> Result<Vec<Block>, AppError> {
        let Snapshot {
            mut blocks,
            revision,
        } = snapshot;

        let before = blocks.len();
        blocks.retain(|b| b.id != id);
        if blocks.len() == before {
            return Err(AppError::NotFound(format!("Block '{id}' not found")));
        }

        self.write(blocks, revision, &format!("Delete block {id}"))
            .await
    }

    /// [`BlockRepository::set_visibility`] against a snapshot the caller already holds.
    pub async fn set_visibility_at(
        &self,
        snapshot: Snapshot,
        id: &str,
        visibility: Visibility,
    ) -> Result<Vec<Block>, AppError> {
        self.update_visibility(snapshot, id, |_| visibility).await
    }

    async fn update_visibility(
        &self,
        snapshot: Snapshot,
        id: &str,
        next: impl FnOnce(Visibility) -> Visibility + Send,
    ) -> Result<Vec<Block>, AppError> {
        let Snapshot {
            mut blocks,
            revision,
        } = snapshot;

        let target = blocks
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Block '{id}' not found")))?;
        target.visibility = next(target.visibility);
        target.touch(block::now());

        self.write(blocks, revision, &format!("Toggle visibility for block {id}"))
            .await
    }

    async fn write(
        &self,
        blocks: Vec<Block>,
        revision: Option<RevisionTag>,
        message: &str,
    ) -> Result<Vec<Block>, AppError> {
        let content = document::encode(&blocks)?;
        let expected = match (self.mode, revision) {
            (CommitMode::Unconditional, _) => Expectation::Any,
            (CommitMode::RevisionChecked, Some(tag)) => Expectation::Revision(tag),
            // Read as missing, so only the first writer may create it.
            (CommitMode::RevisionChecked, None) => Expectation::Absent,
        };

        match self
            .store
            .commit(&self.document_path, content, expected, message)
            .await
        {
            Ok(new_revision) => {
                tracing::info!(
                    path = %self.document_path,
                    revision = %new_revision,
                    blocks = blocks.len(),
                    "{message}"
                );
                Ok(blocks)
            }
            Err(e) => {
                if e.is_conflict() {
                    tracing::warn!(path = %self.document_path, "commit rejected: {e}");
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl BlockRepository for RemoteBlockRepository {
    async fn list(&self) -> Result<Vec<Block>, AppError> {
        Ok(self.snapshot().await?.blocks)
    }

    async fn upsert(&self, input: BlockInput) -> Result<Vec<Block>, AppError> {
        input.validate()?;
        let snapshot = self.snapshot().await?;
        self.upsert_at(snapshot, input).await
    }

    async fn delete(&self, id: &str) -> Result<Vec<Block>, AppError> {
        let snapshot = self.snapshot().await?;
        self.delete_at(snapshot, id).await
    }

    async fn set_visibility(
        &self,
        id: &str,
        visibility: Visibility,
    ) -> Result<Vec<Block>, AppError> {
        let snapshot = self.snapshot().await?;
        self.set_visibility_at(snapshot, id, visibility).await
    }

    async fn toggle_visibility(&self, id: &str) -> Result<Vec<Block>, AppError> {
        let snapshot = self.snapshot().await?;
        self.update_visibility(snapshot, id, Visibility::toggled)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::client::{MockBlobStore, StoredBlob};
    use mockall::predicate::{always, eq};

    const PATH: &str = "data/airdrop/data.json";

    fn input(title: &str) -> BlockInput {
        BlockInput {
            title: title.to_string(),
            ..Default::default()
        }
    }

    fn stored(blocks: &[Block], revision: &str) -> StoredBlob {
        StoredBlob {
            content: document::encode(blocks).unwrap(),
            revision: RevisionTag::new(revision),
        }
    }

    fn existing_block(id: &str) -> Block {
        BlockInput {
            id: Some(id.to_string()),
            title: "Existing".to_string(),
            ..Default::default()
        }
        .into_block(None, block::now())
    }

    #[tokio::test]
    async fn test_invalid_title_never_reaches_store() {
        let mut store = MockBlobStore::new();
        store.expect_fetch().times(0);
        store.expect_commit().times(0);

        let repo = RemoteBlockRepository::new(Arc::new(store), PATH);
        match repo.upsert(input("   ")).await {
            Err(AppError::InvalidInput(msg)) => assert!(msg.contains("Title")),
            other => panic!("Expected InvalidInput, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_on_missing_document_is_empty() {
        let mut store = MockBlobStore::new();
        store
            .expect_fetch()
            .with(eq(PATH))
            .times(1)
            .returning(|_| Ok(None));

        let repo = RemoteBlockRepository::new(Arc::new(store), PATH);
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_propagates_store_unavailable() {
        let mut store = MockBlobStore::new();
        store
            .expect_fetch()
            .returning(|_| Err(AppError::StoreUnavailable("HTTP 502".into())));

        let repo = RemoteBlockRepository::new(Arc::new(store), PATH);
        assert!(matches!(
            repo.list().await,
            Err(AppError::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_document_aborts_without_commit() {
        let mut store = MockBlobStore::new();
        store.expect_fetch().returning(|_| {
            Ok(Some(StoredBlob {
                content: document::transport_encode(b"{ not json"),
                revision: RevisionTag::new("r1"),
            }))
        });
        store.expect_commit().times(0);

        let repo = RemoteBlockRepository::new(Arc::new(store), PATH);
        assert!(matches!(
            repo.upsert(input("New")).await,
            Err(AppError::MalformedDocument(_))
        ));
    }

    #[tokio::test]
    async fn test_upsert_commits_with_fetched_revision() {
        let current = vec![existing_block("a")];
        let blob = stored(&current, "r1");

        let mut store = MockBlobStore::new();
        store
            .expect_fetch()
            .times(1)
            .returning(move |_| Ok(Some(blob.clone())));
        store
            .expect_commit()
            .with(eq(PATH), always(), eq(Expectation::Revision(RevisionTag::new("r1"))), eq("Add new block"))
            .times(1)
            .returning(|_, _, _, _| Ok(RevisionTag::new("r2")));

        let repo = RemoteBlockRepository::new(Arc::new(store), PATH);
        let blocks = repo.upsert(input("Second")).await.unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].id, "a");
        assert_eq!(blocks[1].title, "Second");
    }

    #[tokio::test]
    async fn test_first_write_to_missing_document_is_create_only() {
        let mut store = MockBlobStore::new();
        store.expect_fetch().times(1).returning(|_| Ok(None));
        store
            .expect_commit()
            .with(eq(PATH), always(), eq(Expectation::Absent), eq("Add new block"))
            .times(1)
            .returning(|_, _, _, _| Ok(RevisionTag::new("r1")));

        let repo = RemoteBlockRepository::new(Arc::new(store), PATH);
        let blocks = repo.upsert(input("First")).await.unwrap();
        assert_eq!(blocks.len(), 1);
    }

    #[tokio::test]
    async fn test_unconditional_mode_omits_revision() {
        let blob = stored(&[existing_block("a")], "r1");

        let mut store = MockBlobStore::new();
        store
            .expect_fetch()
            .returning(move |_| Ok(Some(blob.clone())));
        store
            .expect_commit()
            .with(eq(PATH), always(), eq(Expectation::Any), eq("Update block a"))
            .times(1)
            .returning(|_, _, _, _| Ok(RevisionTag::new("r2")));

        let repo = RemoteBlockRepository::new(Arc::new(store), PATH)
            .with_mode(CommitMode::Unconditional);
        let mut edit = input("Renamed");
        edit.id = Some("a".to_string());
        let blocks = repo.upsert(edit).await.unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].title, "Renamed");
    }

    #[tokio::test]
    async fn test_conflict_is_not_retried() {
        let blob = stored(&[existing_block("a")], "r1");

        let mut store = MockBlobStore::new();
        store
            .expect_fetch()
            .times(1)
            .returning(move |_| Ok(Some(blob.clone())));
        store.expect_commit().times(1).returning(|path, _, expected, _| {
            Err(AppError::Conflict {
                path: path.to_string(),
                expected: expected.to_string(),
            })
        });

        let repo = RemoteBlockRepository::new(Arc::new(store), PATH);
        let err = repo.delete("a").await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_delete_unknown_id_does_not_commit() {
        let blob = stored(&[existing_block("a")], "r1");

        let mut store = MockBlobStore::new();
        store
            .expect_fetch()
            .returning(move |_| Ok(Some(blob.clone())));
        store.expect_commit().times(0);

        let repo = RemoteBlockRepository::new(Arc::new(store), PATH);
        assert!(matches!(
            repo.delete("missing").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            repo.set_visibility("missing", Visibility::Hide).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_toggle_visibility_message() {
        let blob = stored(&[existing_block("a")], "r1");

        let mut store = MockBlobStore::new();
        store
            .expect_fetch()
            .returning(move |_| Ok(Some(blob.clone())));
        store
            .expect_commit()
            .with(
                eq(PATH),
                always(),
                eq(Expectation::Revision(RevisionTag::new("r1"))),
                eq("Toggle visibility for block a"),
            )
            .times(1)
            .returning(|_, _, _, _| Ok(RevisionTag::new("r2")));

        let repo = RemoteBlockRepository::new(Arc::new(store), PATH);
        let blocks = repo.toggle_visibility("a").await.unwrap();
        assert_eq!(blocks[0].visibility, Visibility::Hide);
    }
}
