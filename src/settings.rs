use std::path::Path;

use serde::Deserialize;

use crate::error::AppError;

fn default_branch() -> String {
    "main".to_string()
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_document_path() -> String {
    "data/airdrop/data.json".to_string()
}

fn default_tags_path() -> String {
    "data/tags/tags.json".to_string()
}

fn default_assets_prefix() -> String {
    "data/images".to_string()
}

fn default_revision_check() -> bool {
    true
}

/// Remote store identity and the well-known paths inside it.
///
/// Loaded from an optional TOML file overlaid with `GITHUB_*` environment
/// variables (`GITHUB_OWNER`, `GITHUB_REPO`, `GITHUB_BRANCH`, `GITHUB_TOKEN`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Repository owner (user or organisation).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Branch every read and commit is pinned to.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Opaque API credential.
    pub token: String,
    /// Base URL of the contents API (overridable for GitHub Enterprise or tests).
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Path of the JSON document holding every block.
    #[serde(default = "default_document_path")]
    pub document_path: String,
    /// Path of the JSON array of allowed tags.
    #[serde(default = "default_tags_path")]
    pub tags_path: String,
    /// Directory-like prefix for uploaded binaries.
    #[serde(default = "default_assets_prefix")]
    pub assets_prefix: String,
    /// Whether document commits carry the revision tag they were based on.
    #[serde(default = "default_revision_check")]
    pub revision_check: bool,
}

impl StoreConfig {
    /// Build with explicit values and default paths (useful for testing).
    pub fn new(owner: &str, repo: &str, token: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: default_branch(),
            token: token.to_string(),
            api_base: default_api_base(),
            document_path: default_document_path(),
            tags_path: default_tags_path(),
            assets_prefix: default_assets_prefix(),
            revision_check: default_revision_check(),
        }
    }

    /// Load the configuration, layering environment variables over `file` when given.
    pub fn load(file: Option<&Path>) -> Result<Self, AppError> {
        Self::load_with_env(file, ::config::Environment::with_prefix("GITHUB"))
    }

    fn load_with_env(file: Option<&Path>, env: ::config::Environment) -> Result<Self, AppError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        let settings = builder.add_source(env).build()?;

        let cfg: StoreConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), AppError> {
        for (name, value) in [
            ("owner", &self.owner),
            ("repo", &self.repo),
            ("token", &self.token),
            ("branch", &self.branch),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Config(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// Public raw-content URL of a store path on the configured branch.
    pub fn public_url(&self, path: &str) -> String {
        format!(
            "https://raw.githubusercontent.com/{}/{}/{}/{}",
            self.owner,
            self.repo,
            self.branch,
            path.trim_start_matches('/')
        )
    }
}
