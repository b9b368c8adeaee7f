use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::codec::document::transport_encode;
use crate::error::AppError;
use crate::settings::StoreConfig;
use crate::storage::client::{BlobStore, Expectation, RevisionTag, StoredBlob};

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
const GITHUB_ACCEPT_RAW: &str = "application/vnd.github.raw";

/// Subset of the contents API `GET` response we rely on.
#[derive(Debug, Deserialize)]
struct ContentEntry {
    sha: String,
    #[serde(default)]
    encoding: String,
    #[serde(default)]
    content: String,
}

impl ContentEntry {
    /// Files over 1 MB come back without inline content.
    fn is_inline(&self) -> bool {
        self.encoding != "none"
    }
}

#[derive(Debug, Serialize)]
struct PutContentRequest<'a> {
    message: &'a str,
    content: &'a str,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutContentResponse {
    content: PutContentEntry,
}

#[derive(Debug, Deserialize)]
struct PutContentEntry {
    sha: String,
}

/// GitHub contents API implementation of [`BlobStore`].
///
/// Every read and write is pinned to the configured branch. The blob `sha`
/// returned by the API is used as the revision tag.
pub struct GitHubBlobStore {
    http: reqwest::Client,
    api_base: String,
    owner: String,
    repo: String,
    branch: String,
    token: String,
}

impl GitHubBlobStore {
    pub fn new(config: &StoreConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("block-editor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::StoreUnavailable(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            token: config.token.clone(),
        })
    }

    fn contents_url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .trim_start_matches('/')
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base,
            self.owner,
            self.repo,
            encoded.join("/")
        )
    }

    fn auth_header(&self) -> String {
        format!("token {}", self.token)
    }

    async fn fetch_entry(&self, path: &str) -> Result<Option<ContentEntry>, AppError> {
        let response = self
            .http
            .get(self.contents_url(path))
            .query(&[("ref", self.branch.as_str())])
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, GITHUB_ACCEPT)
            .send()
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("Failed to fetch '{path}': {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let entry = response.json::<ContentEntry>().await.map_err(|e| {
                    AppError::StoreUnavailable(format!("Unexpected response for '{path}': {e}"))
                })?;
                Ok(Some(entry))
            }
            status => Err(AppError::StoreUnavailable(format!(
                "Failed to fetch '{path}': HTTP {status}"
            ))),
        }
    }

    /// Download the raw bytes of `path` and return them in transport encoding.
    async fn fetch_raw(&self, path: &str) -> Result<String, AppError> {
        let response = self
            .http
            .get(self.contents_url(path))
            .query(&[("ref", self.branch.as_str())])
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, GITHUB_ACCEPT_RAW)
            .send()
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("Failed to fetch '{path}': {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::StoreUnavailable(format!(
                "Failed to fetch raw content of '{path}': HTTP {status}"
            )));
        }
        let bytes = response.bytes().await.map_err(|e| {
            AppError::StoreUnavailable(format!("Failed to read raw content of '{path}': {e}"))
        })?;
        Ok(transport_encode(&bytes))
    }
}

#[async_trait]
impl BlobStore for GitHubBlobStore {
    async fn fetch(&self, path: &str) -> Result<Option<StoredBlob>, AppError> {
        tracing::debug!(path, branch = %self.branch, "fetching content");

        let Some(entry) = self.fetch_entry(path).await? else {
            return Ok(None);
        };
        let content = if entry.is_inline() {
            entry.content
        } else {
            tracing::debug!(path, "content not inlined, fetching raw");
            self.fetch_raw(path).await?
        };

        Ok(Some(StoredBlob {
            content,
            revision: RevisionTag(entry.sha),
        }))
    }

    async fn commit(
        &self,
        path: &str,
        content: String,
        expected: Expectation,
        message: &str,
    ) -> Result<RevisionTag, AppError> {
        let checked = expected.is_checked();
        let wanted = expected.to_string();

        // The API refuses to overwrite without a sha, so an unconditional write
        // bases itself on whatever revision is current right now. A create-only
        // write sends no sha and the API rejects it if the file exists.
        let base = match expected {
            Expectation::Any => self.fetch_entry(path).await?.map(|entry| entry.sha),
            Expectation::Absent => None,
            Expectation::Revision(tag) => Some(tag.0),
        };

        tracing::debug!(path, checked, base = ?base, "committing content");

        let body = PutContentRequest {
            message,
            content: &content,
            branch: &self.branch,
            sha: base.as_deref(),
        };

        let response = self
            .http
            .put(self.contents_url(path))
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, GITHUB_ACCEPT)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("Failed to commit '{path}': {e}")))?;

        match response.status() {
            status if status.is_success() => {
                let created = response.json::<PutContentResponse>().await.map_err(|e| {
                    AppError::StoreUnavailable(format!("Unexpected response for '{path}': {e}"))
                })?;
                Ok(RevisionTag(created.content.sha))
            }
            StatusCode::CONFLICT => Err(AppError::Conflict {
                path: path.to_string(),
                expected: wanted,
            }),
            StatusCode::UNPROCESSABLE_ENTITY if checked => Err(AppError::Conflict {
                path: path.to_string(),
                expected: wanted,
            }),
            status => Err(AppError::StoreUnavailable(format!(
                "Failed to commit '{path}': HTTP {status}"
            ))),
        }
    }
}
