use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AegisError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Failed to read source {path}: {source}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt artifact: {0}")]
    CorruptArtifact(String),

    #[error("Corpus directory does not exist: {}", .0.display())]
    MissingCorpus(PathBuf),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Persist: {0}")]
    Persist(#[from] tempfile::PersistError),
}

impl AegisError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameters(msg.into())
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptArtifact(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AegisError>;
