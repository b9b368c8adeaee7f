use crate::codec::document;
use crate::error::AppError;
use crate::storage::client::BlobStore;

/// The externally maintained list of allowed tags. Read-only here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagVocabulary {
    tags: Vec<String>,
}

impl TagVocabulary {
    /// Load the vocabulary stored at `path`. A missing document is an empty vocabulary.
    pub async fn load(store: &dyn BlobStore, path: &str) -> Result<Self, AppError> {
        let tags = match store.fetch(path).await? {
            Some(blob) => document::decode_tags(&blob.content)?,
            None => Vec::new(),
        };
        tracing::debug!(path, count = tags.len(), "loaded tag vocabulary");
        Ok(Self { tags })
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// The entries of `tags` that are not part of the vocabulary, in input order.
    pub fn unknown<'a>(&self, tags: &'a [String]) -> Vec<&'a str> {
        tags.iter()
            .map(String::as_str)
            .filter(|tag| !self.contains(tag))
            .collect()
    }
}
