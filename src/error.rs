use thiserror::Error;

/// Errors surfaced by the block repository, the asset store and the blob store clients.
#[derive(Debug, Error)]
pub enum AppError {
    /// Local validation failure. Never reaches the store.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stored bytes could not be transport-decoded or parsed.
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// The store's current revision of `path` is not the one the write was based on.
    #[error("Conflict on '{path}': expected revision {expected}")]
    Conflict { path: String, expected: String },

    /// Transport, authentication or server failure.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// `true` when the caller may recover by re-reading the document and redoing its change.
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict { .. })
    }
}

/// Helper conversion from anyhow::Error
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
