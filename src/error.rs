//! Error types shared by the store, transport and synchronizer

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Remote sync requested without usable WebDAV settings
    #[error("WebDAV is not configured")]
    NotConfigured,

    /// The record store was used before `init`
    #[error("record store is not initialized")]
    StoreUnavailable,

    #[error("sync upload failed: {0}")]
    SyncUploadFailed(String),

    #[error("sync download failed: {0}")]
    SyncDownloadFailed(String),

    #[error("{0}")]
    Validation(String),

    #[error("malformed remote document: {0}")]
    MalformedRemoteDocument(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn task_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "task",
            id: id.to_string(),
        }
    }

    pub fn list_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "list",
            id: id.to_string(),
        }
    }
}
