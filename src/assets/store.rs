use std::sync::Arc;

use crate::codec::document::transport_encode;
use crate::error::AppError;
use crate::settings::StoreConfig;
use crate::storage::client::{BlobStore, Expectation};

/// Turn an uploaded file name into a path segment: lower-cased, every run of
/// whitespace collapsed to one hyphen. Path separators become hyphens so the
/// result always stays directly under the assets prefix.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for ch in name.trim().chars() {
        if ch.is_whitespace() {
            pending_hyphen = true;
            continue;
        }
        if pending_hyphen {
            slug.push('-');
            pending_hyphen = false;
        }
        match ch {
            '/' | '\\' => slug.push('-'),
            c => slug.extend(c.to_lowercase()),
        }
    }

    slug
}

/// Store for binary attachments.
///
/// Writes are unconditional: two uploads with the same slug overwrite each other.
pub struct AssetStore {
    store: Arc<dyn BlobStore>,
    config: StoreConfig,
}

impl AssetStore {
    pub fn new(store: Arc<dyn BlobStore>, config: StoreConfig) -> Self {
        Self { store, config }
    }

    /// Store path an upload named `name` ends up at.
    pub fn path_for(&self, name: &str) -> Result<String, AppError> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(AppError::InvalidInput("Asset name cannot be empty".into()));
        }
        Ok(format!(
            "{}/{}",
            self.config.assets_prefix.trim_end_matches('/'),
            slug
        ))
    }

    /// Upload `bytes` and return the store path it was written to.
    pub async fn store(&self, bytes: &[u8], name: &str) -> Result<String, AppError> {
        let path = self.path_for(name)?;

        self.store
            .commit(
                &path,
                transport_encode(bytes),
                Expectation::Any,
                &format!("Upload image {name}"),
            )
            .await?;

        tracing::info!(path = %path, size = bytes.len(), "stored asset");
        Ok(path)
    }

    /// Public URL of a stored asset.
    pub fn public_url(&self, path: &str) -> String {
        self.config.public_url(path)
    }

    /// Display URL for an entry of [`Block::images`](crate::models::block::Block::images).
    ///
    /// Store paths under the assets prefix resolve to their public URL; absolute
    /// URLs and anything else are returned unchanged.
    pub fn resolve_image_url(&self, image: &str) -> String {
        if url::Url::parse(image).is_ok() {
            return image.to_string();
        }
        let prefix = format!("{}/", self.config.assets_prefix.trim_end_matches('/'));
        if image.trim_start_matches('/').starts_with(&prefix) {
            self.public_url(image)
        } else {
            image.to_string()
        }
    }
}
